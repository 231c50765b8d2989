//! Convert command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::convert::Converter;
use anyhow::Result;

/// Run the convert command.
pub async fn run_convert(force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Convert, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    Output::info(&format!(
        "Converting presentations from {}",
        settings.pptx_dir().display()
    ));

    let converter = Converter::from_settings(&settings);
    let pb = Output::progress_bar(0, "");
    let result = converter.convert_all(force, &pb).await;
    pb.finish_and_clear();

    let report = result?;
    Output::success(&format!(
        "Converted {} presentations into {} slides ({} already converted)",
        report.decks_converted, report.slides_written, report.decks_skipped
    ));
    if report.decks_skipped > 0 && !force {
        Output::info("Use --force to convert existing decks again.");
    }

    Ok(())
}
