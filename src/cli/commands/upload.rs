//! Upload command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, UploadReport};
use anyhow::Result;

pub(super) fn print_upload_report(report: &UploadReport) {
    Output::success(&format!(
        "Indexed {} slides from {} decks ({} decks unchanged)",
        report.slides_indexed, report.decks_uploaded, report.decks_skipped
    ));
    if report.missing_descriptions > 0 {
        Output::warning(&format!(
            "{} slides have no description and were left out. Run 'slidesearch describe' first.",
            report.missing_descriptions
        ));
    }
}

/// Run the upload command.
pub async fn run_upload(force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Upload, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let pb = Output::progress_bar(0, "");
    let result = orchestrator.upload_all(force, &pb).await;
    pb.finish_and_clear();

    print_upload_report(&result?);
    Ok(())
}
