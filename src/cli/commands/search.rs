//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::search::SlideSearcher;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;

    let mut searcher = SlideSearcher::from_settings(
        orchestrator.vector_store(),
        orchestrator.embedder(),
        &settings.search,
    )
    .with_limit(limit.unwrap_or(settings.search.n_results));
    if let Some(min_score) = min_score {
        searcher = searcher.with_min_score(min_score);
    }

    let spinner = Output::spinner("Searching...");
    let results = searcher.search(query).await;
    spinner.finish_and_clear();

    match results {
        Ok(slides) => {
            if slides.is_empty() {
                Output::warning("No slides found matching your query.");
            } else {
                Output::success(&format!("Found {} slides", slides.len()));

                let img_dir = settings.img_dir();
                for slide in &slides {
                    let label = match slide.slide_index {
                        Some(i) => format!("{} #{}", slide.deck, i),
                        None => slide.id.clone(),
                    };
                    Output::search_result(
                        &label,
                        slide.score,
                        &slide.description,
                        &img_dir.join(&slide.id).display().to_string(),
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
