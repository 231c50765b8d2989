//! Describe command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the describe command.
pub async fn run_describe(force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Describe, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    Output::info(&format!(
        "Describing slides with {}",
        orchestrator.describer().model()
    ));

    let pb = Output::progress_bar(0, "");
    let result = orchestrator.describe_all(force, &pb).await;
    pb.finish_and_clear();

    let report = result?;
    Output::success(&format!(
        "Described {} slides ({} already described)",
        report.described, report.skipped
    ));

    Ok(())
}
