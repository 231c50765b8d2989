//! Vector store abstraction for slidesearch.
//!
//! Provides a trait-based interface for different vector database backends.
//! A store is bound to one named collection; every operation is scoped to it.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One slide stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Image path relative to the image root. Re-ingesting the same image replaces the record.
    pub id: String,
    /// Deck (presentation) the slide belongs to.
    pub deck: String,
    /// 1-based slide number, when known.
    pub slide_index: Option<u32>,
    /// Vision model description of the slide.
    pub description: String,
    /// Path of the image on disk at ingestion time.
    pub image_path: String,
    /// Embedding of the description.
    pub embedding: Vec<f32>,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl SlideRecord {
    /// Create a new record stamped with the current time.
    pub fn new(
        id: String,
        deck: String,
        slide_index: Option<u32>,
        description: String,
        image_path: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id,
            deck,
            slide_index,
            description,
            image_path,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Human-readable slide label, e.g. "q3_review #4".
    pub fn label(&self) -> String {
        match self.slide_index {
            Some(i) => format!("{} #{}", self.deck, i),
            None => self.id.clone(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched record.
    pub record: SlideRecord,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about an indexed deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDeck {
    pub deck: String,
    /// Number of indexed slides.
    pub slide_count: u32,
    /// Most recent indexing time of any slide in the deck.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the collection this store operates on.
    fn collection(&self) -> &str;

    /// Insert or replace a record by id.
    async fn upsert(&self, record: &SlideRecord) -> Result<()>;

    /// Bulk upsert records.
    async fn upsert_batch(&self, records: &[SlideRecord]) -> Result<usize>;

    /// Search for similar records.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> Result<Option<SlideRecord>>;

    /// Fetch several records, in the order of `ids`. Unknown ids are skipped.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<SlideRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get(id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Delete all records of a deck.
    async fn delete_by_deck(&self, deck: &str) -> Result<usize>;

    /// Replace all records of a deck with `records` atomically.
    async fn replace_deck(&self, deck: &str, records: &[SlideRecord]) -> Result<usize>;

    /// List all indexed decks.
    async fn list_decks(&self) -> Result<Vec<IndexedDeck>>;

    /// Get a specific deck's summary.
    async fn get_deck(&self, deck: &str) -> Result<Option<IndexedDeck>>;

    /// Get all records of a deck in slide order.
    async fn get_by_deck(&self, deck: &str) -> Result<Vec<SlideRecord>>;

    /// Get total record count.
    async fn record_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, filter, order and truncate candidate records.
pub(crate) fn rank(
    records: impl IntoIterator<Item = SlideRecord>,
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = records
        .into_iter()
        .map(|record| {
            let score = cosine_similarity(query_embedding, &record.embedding);
            SearchResult { record, score }
        })
        .filter(|r| r.score >= min_score)
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    results.truncate(limit);
    results
}
