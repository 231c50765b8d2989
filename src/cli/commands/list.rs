//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::{SqliteVectorStore, VectorStore};
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let store = SqliteVectorStore::open(&settings.db_path(), &settings.vector_store.collection)?;

    match store.list_decks().await {
        Ok(decks) => {
            if decks.is_empty() {
                Output::info("No slides indexed yet. Use 'slidesearch ingest' to add presentations.");
            } else {
                Output::header(&format!("Indexed Decks ({})", decks.len()));
                println!();

                for deck in &decks {
                    let name = if deck.deck.is_empty() { "(root)" } else { &deck.deck };
                    Output::deck_info(
                        name,
                        deck.slide_count,
                        &deck.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
                    );
                }

                let total_slides: u32 = decks.iter().map(|d| d.slide_count).sum();
                println!();
                Output::kv("Collection", store.collection());
                Output::kv("Total decks", &decks.len().to_string());
                Output::kv("Total slides", &total_slides.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list decks: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
