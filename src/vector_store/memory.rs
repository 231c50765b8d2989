//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank, IndexedDeck, SearchResult, SlideRecord, VectorStore};
use crate::error::{Result, SlideSearchError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    collection: String,
    records: RwLock<HashMap<String, SlideRecord>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, SlideRecord>>> {
        self.records
            .read()
            .map_err(|e| SlideSearchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, SlideRecord>>> {
        self.records
            .write()
            .map_err(|e| SlideSearchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new("all_files")
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, record: &SlideRecord) -> Result<()> {
        self.write()?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn upsert_batch(&self, records: &[SlideRecord]) -> Result<usize> {
        let mut store = self.write()?;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, f32::MIN).await
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let records = self.read()?;
        Ok(rank(records.values().cloned(), query_embedding, limit, min_score))
    }

    async fn get(&self, id: &str) -> Result<Option<SlideRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn delete_by_deck(&self, deck: &str) -> Result<usize> {
        let mut records = self.write()?;
        let initial_len = records.len();
        records.retain(|_, r| r.deck != deck);
        Ok(initial_len - records.len())
    }

    async fn replace_deck(&self, deck: &str, records: &[SlideRecord]) -> Result<usize> {
        let mut store = self.write()?;
        store.retain(|_, r| r.deck != deck);
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn list_decks(&self) -> Result<Vec<IndexedDeck>> {
        let records = self.read()?;

        let mut decks: BTreeMap<String, IndexedDeck> = BTreeMap::new();
        for record in records.values() {
            let entry = decks.entry(record.deck.clone()).or_insert_with(|| IndexedDeck {
                deck: record.deck.clone(),
                slide_count: 0,
                indexed_at: record.indexed_at,
            });

            entry.slide_count += 1;
            if record.indexed_at > entry.indexed_at {
                entry.indexed_at = record.indexed_at;
            }
        }

        Ok(decks.into_values().collect())
    }

    async fn get_deck(&self, deck: &str) -> Result<Option<IndexedDeck>> {
        let decks = self.list_decks().await?;
        Ok(decks.into_iter().find(|d| d.deck == deck))
    }

    async fn get_by_deck(&self, deck: &str) -> Result<Vec<SlideRecord>> {
        let records = self.read()?;
        let mut result: Vec<SlideRecord> = records
            .values()
            .filter(|r| r.deck == deck)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.slide_index.cmp(&b.slide_index).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::default();

        let slide1 = SlideRecord::new(
            "deck/slide_1.png".to_string(),
            "deck".to_string(),
            Some(1),
            "Quarterly revenue".to_string(),
            "/img/deck/slide_1.png".to_string(),
            vec![1.0, 0.0, 0.0],
        );
        let slide2 = SlideRecord::new(
            "deck/slide_2.png".to_string(),
            "deck".to_string(),
            Some(2),
            "Hiring plan".to_string(),
            "/img/deck/slide_2.png".to_string(),
            vec![0.0, 1.0, 0.0],
        );

        store.upsert_batch(&[slide1.clone(), slide2]).await.unwrap();
        store.upsert(&slide1).await.unwrap();
        assert_eq!(store.record_count().await.unwrap(), 2);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].record.id, "deck/slide_1.png");

        let decks = store.list_decks().await.unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].slide_count, 2);

        assert_eq!(store.delete_by_deck("deck").await.unwrap(), 2);
        assert_eq!(store.record_count().await.unwrap(), 0);
    }
}
