//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::search::{AnswerEngine, SlideSearcher};
use anyhow::Result;

/// Run the ask command: search with the question, then answer from the slides found.
pub async fn run_ask(question: &str, limit: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'slidesearch doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;

    let searcher = SlideSearcher::from_settings(
        orchestrator.vector_store(),
        orchestrator.embedder(),
        &settings.search,
    )
    .with_limit(limit.unwrap_or(settings.search.n_results));

    let engine = AnswerEngine::new(orchestrator.vector_store(), &settings.answer)?
        .with_prompts(orchestrator.prompts().clone());

    let spinner = Output::spinner("Searching slides...");
    let slides = match searcher.search(question).await {
        Ok(slides) => slides,
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if slides.is_empty() {
        spinner.finish_and_clear();
        Output::warning("No slides found for this question.");
        return Ok(());
    }

    spinner.set_message(format!("Asking {}...", engine.model()));
    let ids: Vec<String> = slides.iter().map(|s| s.id.clone()).collect();

    match engine.answer(question, &ids).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            println!("\n{}\n", answer.answer);

            Output::header("Sources");
            for slide in slides.iter().filter(|s| answer.sources.contains(&s.id)) {
                Output::list_item(&format!("{} (score: {:.2})", slide.id, slide.score));
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
