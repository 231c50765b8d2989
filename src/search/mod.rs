//! Slide retrieval and question answering over retrieved slides.

mod answer;

pub use answer::{format_descriptions, Answer, AnswerEngine, NO_SEARCH_ANSWER};

use crate::config::SearchSettings;
use crate::embedding::Embedder;
use crate::error::{Result, SlideSearchError};
use crate::vector_store::{SearchResult, VectorStore};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};
use url::Url;

/// URL path segment under which slide images are served.
pub const IMAGE_ROUTE: &str = "IMG_DIR";

/// A slide returned for a query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideMatch {
    /// Record id, the image path relative to the image root.
    pub id: String,
    /// Browser path of the image, e.g. `/IMG_DIR/deck/slide_1.png`.
    pub image_url: String,
    pub deck: String,
    pub slide_index: Option<u32>,
    pub description: String,
    pub score: f32,
}

impl From<SearchResult> for SlideMatch {
    fn from(result: SearchResult) -> Self {
        Self {
            image_url: image_url(&result.record.id),
            id: result.record.id,
            deck: result.record.deck,
            slide_index: result.record.slide_index,
            description: result.record.description,
            score: result.score,
        }
    }
}

/// `/IMG_DIR/<id>` with every path segment percent-encoded.
pub fn image_url(id: &str) -> String {
    static BASE: OnceLock<Url> = OnceLock::new();
    let mut url = BASE
        .get_or_init(|| Url::parse("http://localhost/").expect("valid base URL"))
        .clone();

    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .clear()
            .push(IMAGE_ROUTE)
            .extend(id.split('/').filter(|s| !s.is_empty()));
    }
    url.path().to_string()
}

/// Embeds queries and looks up the nearest slides.
pub struct SlideSearcher {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    limit: usize,
    min_score: Option<f32>,
}

impl SlideSearcher {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        let defaults = SearchSettings::default();
        Self {
            vector_store,
            embedder,
            limit: defaults.n_results,
            min_score: defaults.min_score,
        }
    }

    pub fn from_settings(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        settings: &SearchSettings,
    ) -> Self {
        let searcher = Self::new(vector_store, embedder).with_limit(settings.n_results);
        match settings.min_score {
            Some(min_score) => searcher.with_min_score(min_score),
            None => searcher,
        }
    }

    /// Set the maximum number of returned slides.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slides most similar to `query`, best first.
    #[instrument(skip(self), fields(limit = self.limit))]
    pub async fn search(&self, query: &str) -> Result<Vec<SlideMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SlideSearchError::InvalidInput("Query is empty".to_string()));
        }

        let query_embedding = self.embedder.embed(query).await?;
        let results = match self.min_score {
            Some(min_score) => {
                self.vector_store
                    .search_with_threshold(&query_embedding, self.limit, min_score)
                    .await?
            }
            None => self.vector_store.search(&query_embedding, self.limit).await?,
        };

        debug!("{} slides matched", results.len());
        Ok(results.into_iter().map(SlideMatch::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{described_tree, BagOfWordsEmbedder, VOCABULARY};
    use crate::orchestrator::Orchestrator;
    use crate::config::{Prompts, Settings};
    use crate::vector_store::{MemoryVectorStore, SlideRecord};
    use async_trait::async_trait;
    use indicatif::ProgressBar;
    use std::path::Path;

    #[test]
    fn test_image_url_encodes_segments() {
        assert_eq!(image_url("intro/slide_1.png"), "/IMG_DIR/intro/slide_1.png");
        assert_eq!(
            image_url("Q3 review/slide_#2.png"),
            "/IMG_DIR/Q3%20review/slide_%232.png"
        );
    }

    #[test]
    fn test_slide_match_serializes_camel_case() {
        let m = SlideMatch {
            id: "intro/slide_1.png".to_string(),
            image_url: "/IMG_DIR/intro/slide_1.png".to_string(),
            deck: "intro".to_string(),
            slide_index: Some(1),
            description: "Title slide".to_string(),
            score: 0.5,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["imageUrl"], "/IMG_DIR/intro/slide_1.png");
        assert_eq!(json["slideIndex"], 1);
    }

    struct NoDescriber;

    #[async_trait]
    impl crate::describe::Describer for NoDescriber {
        async fn describe(&self, _image: &Path, _prompt: &str) -> Result<String> {
            Err(SlideSearchError::Describe("not available".to_string()))
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    async fn indexed_searcher(root: &Path) -> SlideSearcher {
        described_tree(root);
        let mut settings = Settings::default();
        settings.paths.img_dir = root.to_string_lossy().into_owned();

        let embedder = Arc::new(BagOfWordsEmbedder::new(VOCABULARY));
        let store = Arc::new(MemoryVectorStore::default());
        let orch = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(NoDescriber),
            embedder.clone(),
            store.clone(),
        );
        orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();

        SlideSearcher::new(store, embedder)
    }

    #[tokio::test]
    async fn test_search_ranks_matching_slides_first() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = indexed_searcher(dir.path()).await;

        let matches = searcher.search("revenue numbers").await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids[..2], ["finance/slide_2.png", "finance/slide_1.png"]);
        assert_eq!(matches[0].image_url, "/IMG_DIR/finance/slide_2.png");
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn test_search_limit_and_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = indexed_searcher(dir.path()).await.with_min_score(0.5);
        let matches = searcher.search("security").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "people/slide_2.png");

        let searcher = indexed_searcher(dir.path()).await.with_limit(1);
        assert_eq!(searcher.search("revenue").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nearest_slides_returned_without_threshold() {
        let store = Arc::new(MemoryVectorStore::default());
        store
            .upsert(&SlideRecord::new(
                "deck/slide_1.png".to_string(),
                "deck".to_string(),
                Some(1),
                "Opposite of revenue".to_string(),
                "/img/deck/slide_1.png".to_string(),
                vec![-1.0, 0.0],
            ))
            .await
            .unwrap();
        let embedder = Arc::new(BagOfWordsEmbedder::new(&["revenue", "growth"]));

        let searcher = SlideSearcher::from_settings(store.clone(), embedder.clone(), &SearchSettings::default());
        let matches = searcher.search("revenue").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score < 0.0);

        let searcher = SlideSearcher::new(store, embedder).with_min_score(0.0);
        assert!(searcher.search("revenue").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = indexed_searcher(dir.path()).await;
        let err = searcher.search("   ").await.unwrap_err();
        assert!(matches!(err, SlideSearchError::InvalidInput(_)));
    }
}
