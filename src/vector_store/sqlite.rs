//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian `f32` blobs and ranked by cosine
//! similarity in Rust. A slide collection is a few thousand rows at most, so a
//! full scan per query is fine.

use super::{rank, IndexedDeck, SearchResult, SlideRecord, VectorStore};
use crate::error::{Result, SlideSearchError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS slides (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        deck TEXT NOT NULL,
        slide_index INTEGER,
        description TEXT NOT NULL,
        image_path TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_slides_deck ON slides(collection, deck);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, deck, slide_index, description, image_path, embedding, indexed_at FROM slides";

const UPSERT: &str = r#"
    INSERT OR REPLACE INTO slides
    (collection, id, deck, slide_index, description, image_path, embedding, indexed_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path` and bind it to `collection`.
    #[instrument(skip_all, fields(collection = %collection))]
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(collection: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SlideSearchError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SlideRecord> {
        let embedding_bytes: Vec<u8> = row.get(5)?;
        let indexed_at: String = row.get(6)?;

        Ok(SlideRecord {
            id: row.get(0)?,
            deck: row.get(1)?,
            slide_index: row.get(2)?,
            description: row.get(3)?,
            image_path: row.get(4)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: Self::parse_time(&indexed_at),
        })
    }

    fn row_to_deck(row: &Row<'_>) -> rusqlite::Result<IndexedDeck> {
        let indexed_at: String = row.get(2)?;
        Ok(IndexedDeck {
            deck: row.get(0)?,
            slide_count: row.get(1)?,
            indexed_at: Self::parse_time(&indexed_at),
        })
    }

    fn insert(&self, conn: &Connection, record: &SlideRecord) -> Result<()> {
        conn.execute(
            UPSERT,
            params![
                self.collection,
                record.id,
                record.deck,
                record.slide_index,
                record.description,
                record.image_path,
                Self::embedding_to_bytes(&record.embedding),
                record.indexed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn upsert(&self, record: &SlideRecord) -> Result<()> {
        let conn = self.lock()?;
        self.insert(&conn, record)?;
        debug!("Upserted record {}", record.id);
        Ok(())
    }

    #[instrument(skip(self, records))]
    async fn upsert_batch(&self, records: &[SlideRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for record in records {
            self.insert(&tx, record)?;
        }

        tx.commit()?;
        info!("Batch upserted {} records", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, f32::MIN).await
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!("{} WHERE collection = ?1", SELECT_COLUMNS))?;
        let records = stmt
            .query_map(params![self.collection], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let results = rank(records, query_embedding, limit, min_score);
        debug!("Found {} matching records", results.len());
        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<SlideRecord>> {
        let conn = self.lock()?;

        let record = conn.query_row(
            &format!("{} WHERE collection = ?1 AND id = ?2", SELECT_COLUMNS),
            params![self.collection, id],
            Self::row_to_record,
        );

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete_by_deck(&self, deck: &str) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM slides WHERE collection = ?1 AND deck = ?2",
            params![self.collection, deck],
        )?;

        info!("Deleted {} records for deck {}", deleted, deck);
        Ok(deleted)
    }

    #[instrument(skip(self, records))]
    async fn replace_deck(&self, deck: &str, records: &[SlideRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let deleted = tx.execute(
            "DELETE FROM slides WHERE collection = ?1 AND deck = ?2",
            params![self.collection, deck],
        )?;
        for record in records {
            self.insert(&tx, record)?;
        }

        tx.commit()?;
        info!("Replaced {} records of deck {} with {}", deleted, deck, records.len());
        Ok(records.len())
    }

    #[instrument(skip(self))]
    async fn list_decks(&self) -> Result<Vec<IndexedDeck>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT deck, COUNT(*) AS slide_count, MAX(indexed_at) AS indexed_at
            FROM slides
            WHERE collection = ?1
            GROUP BY deck
            ORDER BY deck
            "#,
        )?;

        let decks = stmt
            .query_map(params![self.collection], Self::row_to_deck)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(decks)
    }

    async fn get_deck(&self, deck: &str) -> Result<Option<IndexedDeck>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            r#"
            SELECT deck, COUNT(*) AS slide_count, MAX(indexed_at) AS indexed_at
            FROM slides
            WHERE collection = ?1 AND deck = ?2
            GROUP BY deck
            "#,
            params![self.collection, deck],
            Self::row_to_deck,
        );

        match result {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn get_by_deck(&self, deck: &str) -> Result<Vec<SlideRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE collection = ?1 AND deck = ?2 ORDER BY slide_index, id",
            SELECT_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![self.collection, deck], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Found {} records for deck {}", records.len(), deck);
        Ok(records)
    }

    async fn record_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM slides WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, deck: &str, index: u32, embedding: Vec<f32>) -> SlideRecord {
        SlideRecord::new(
            id.to_string(),
            deck.to_string(),
            Some(index),
            format!("description of {}", id),
            format!("/img/{}", id),
            embedding,
        )
    }

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory("all_files").unwrap();

        store
            .upsert(&record("intro/slide_1.png", "intro", 1, vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let decks = store.list_decks().await.unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].deck, "intro");
        assert_eq!(decks[0].slide_count, 1);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].record.slide_index, Some(1));
        assert_eq!(results[0].record.embedding, vec![1.0, 0.0, 0.0]);

        let deleted = store.delete_by_deck("intro").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.list_decks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = SqliteVectorStore::in_memory("all_files").unwrap();
        let mut first = record("intro/slide_1.png", "intro", 1, vec![1.0, 0.0]);
        store.upsert(&first).await.unwrap();

        first.description = "updated".to_string();
        store.upsert_batch(&[first]).await.unwrap();

        assert_eq!(store.record_count().await.unwrap(), 1);
        let stored = store.get("intro/slide_1.png").await.unwrap().unwrap();
        assert_eq!(stored.description, "updated");
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("slides.db");

        let a = SqliteVectorStore::open(&path, "a").unwrap();
        a.upsert(&record("x/slide_1.png", "x", 1, vec![1.0])).await.unwrap();
        drop(a);

        let b = SqliteVectorStore::open(&path, "b").unwrap();
        assert_eq!(b.record_count().await.unwrap(), 0);
        assert!(b.get("x/slide_1.png").await.unwrap().is_none());

        let a = SqliteVectorStore::open(&path, "a").unwrap();
        assert_eq!(a.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_by_deck_in_slide_order() {
        let store = SqliteVectorStore::in_memory("all_files").unwrap();
        store
            .upsert_batch(&[
                record("d/slide_10.png", "d", 10, vec![1.0]),
                record("d/slide_2.png", "d", 2, vec![1.0]),
                record("e/slide_1.png", "e", 1, vec![1.0]),
            ])
            .await
            .unwrap();

        let slides = store.get_by_deck("d").await.unwrap();
        let indexes: Vec<_> = slides.iter().map(|s| s.slide_index).collect();
        assert_eq!(indexes, vec![Some(2), Some(10)]);

        let deck = store.get_deck("d").await.unwrap().unwrap();
        assert_eq!(deck.slide_count, 2);
        assert!(store.get_deck("missing").await.unwrap().is_none());

        let many = store
            .get_many(&["e/slide_1.png".to_string(), "nope".to_string(), "d/slide_2.png".to_string()])
            .await
            .unwrap();
        let ids: Vec<&str> = many.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["e/slide_1.png", "d/slide_2.png"]);
    }

    #[tokio::test]
    async fn test_replace_deck_swaps_records() {
        let store = SqliteVectorStore::in_memory("all_files").unwrap();
        store
            .upsert_batch(&[
                record("d/slide_1.png", "d", 1, vec![1.0]),
                record("d/slide_2.png", "d", 2, vec![1.0]),
                record("e/slide_1.png", "e", 1, vec![1.0]),
            ])
            .await
            .unwrap();

        let replaced = store
            .replace_deck("d", &[record("d/slide_1.png", "d", 1, vec![0.5])])
            .await
            .unwrap();
        assert_eq!(replaced, 1);

        let slides = store.get_by_deck("d").await.unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].embedding, vec![0.5]);
        assert_eq!(store.get_by_deck("e").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_old_records() {
        let store = SqliteVectorStore::in_memory("all_files").unwrap();
        store.upsert(&record("d/slide_1.png", "d", 1, vec![1.0])).await.unwrap();

        // Make every insert fail after the delete has run inside the transaction
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_inserts BEFORE INSERT ON slides \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store
            .replace_deck("d", &[record("d/slide_2.png", "d", 2, vec![1.0])])
            .await;
        assert!(result.is_err());

        let slides = store.get_by_deck("d").await.unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].id, "d/slide_1.png");
    }
}
