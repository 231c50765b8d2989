//! Web server for searching slides in the browser.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::web::{self, AppState};
use std::sync::Arc;

/// Run the web server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState::from_orchestrator(&orchestrator)?);
    let records = orchestrator.vector_store().record_count().await?;

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("slidesearch web server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Indexed slides", &records.to_string());
    Output::kv("Login user", &orchestrator.settings().server.username);
    println!();
    println!("Endpoints:");
    Output::kv("Login", "GET  /");
    Output::kv("Search page", "GET  /index");
    Output::kv("Search", "POST /search");
    Output::kv("Ask", "POST /ask");
    Output::kv("Images", "GET  /IMG_DIR/<deck>/<slide>");
    Output::kv("Download", "GET  /download/<deck>/<slide>");
    Output::kv("Health", "GET  /health");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    if records == 0 {
        Output::warning("The index is empty. Run 'slidesearch ingest' first.");
    }

    web::serve(listener, state).await?;

    Ok(())
}
