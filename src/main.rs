//! slidesearch CLI entry point.

use anyhow::Result;
use clap::Parser;
use slidesearch::cli::{commands, Cli, Commands};
use slidesearch::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first so SLIDES_DEBUG can raise the log level
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    let log_level = match cli.verbose {
        0 if settings.general.debug => "debug",
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("slidesearch={},tower_http={}", log_level, log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Convert { force } => {
            commands::run_convert(*force, settings).await?;
        }

        Commands::Describe { force } => {
            commands::run_describe(*force, settings).await?;
        }

        Commands::Upload { force } => {
            commands::run_upload(*force, settings).await?;
        }

        Commands::Ingest { force } => {
            commands::run_ingest(*force, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            min_score,
        } => {
            commands::run_search(query, *limit, *min_score, settings).await?;
        }

        Commands::Ask { question, limit } => {
            commands::run_ask(question, *limit, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
