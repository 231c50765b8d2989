//! Ingest command implementation: convert, describe and upload in one go.

use super::upload::print_upload_report;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let pb = Output::progress_bar(0, "");
    let result = orchestrator.ingest(force, &pb).await;
    pb.finish_and_clear();

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            Output::info("Slides and descriptions written so far are kept; run ingest again to resume.");
            return Err(e.into());
        }
    };

    Output::header("Ingestion complete");
    Output::kv(
        "Converted",
        &format!(
            "{} presentations, {} slides",
            report.convert.decks_converted, report.convert.slides_written
        ),
    );
    Output::kv(
        "Described",
        &format!(
            "{} slides ({} already described)",
            report.describe.described, report.describe.skipped
        ),
    );
    println!();
    print_upload_report(&report.upload);

    Ok(())
}
