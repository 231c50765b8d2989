//! Pipeline orchestrator for slidesearch.
//!
//! Coordinates the offline steps: presentation conversion, slide description
//! and uploading the described slides into the vector store.

use crate::config::{Prompts, Settings};
use crate::convert::{ConvertReport, Converter};
use crate::describe::{describe_images, DescribeReport, Describer, OpenAIDescriber};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SlideSearchError};
use crate::slides::{find_images, read_description, SlideImage};
use crate::vector_store::{SlideRecord, SqliteVectorStore, VectorStore};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The main orchestrator for the slidesearch pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    converter: Converter,
    describer: Arc<dyn Describer>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    img_dir: PathBuf,
}

impl Orchestrator {
    /// Create a new orchestrator from configuration.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        info!(
            "Using vision model {} and embedding model {}",
            settings.vision.model, settings.embedding.model
        );

        let describer: Arc<dyn Describer> = Arc::new(OpenAIDescriber::from_settings(&settings.vision)?);
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        let vector_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::open(
            &settings.db_path(),
            &settings.vector_store.collection,
        )?);

        Ok(Self::with_components(settings, prompts, describer, embedder, vector_store))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        describer: Arc<dyn Describer>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        let converter = Converter::from_settings(&settings);
        let img_dir = settings.img_dir();

        Self {
            settings,
            prompts,
            converter,
            describer,
            embedder,
            vector_store,
            img_dir,
        }
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn describer(&self) -> Arc<dyn Describer> {
        self.describer.clone()
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Convert every presentation into slide images.
    pub async fn convert_all(&self, force: bool, progress: &ProgressBar) -> Result<ConvertReport> {
        self.converter.convert_all(force, progress).await
    }

    /// Describe every slide image that has no sidecar yet.
    pub async fn describe_all(&self, force: bool, progress: &ProgressBar) -> Result<DescribeReport> {
        let prompt = self.prompts.describe_prompt();
        describe_images(&self.img_dir, self.describer.as_ref(), &prompt, force, progress).await
    }

    /// Embed described slides and store them, one deck at a time.
    #[instrument(skip(self, progress))]
    pub async fn upload_all(&self, force: bool, progress: &ProgressBar) -> Result<UploadReport> {
        if !self.img_dir.is_dir() {
            return Err(SlideSearchError::Config(format!(
                "Image directory {} does not exist",
                self.img_dir.display()
            )));
        }

        let mut decks: BTreeMap<String, Vec<SlideImage>> = BTreeMap::new();
        for image in find_images(&self.img_dir)? {
            decks.entry(image.deck.clone()).or_default().push(image);
        }
        info!("Uploading {} decks to collection {}", decks.len(), self.vector_store.collection());

        progress.set_length(decks.len() as u64);
        let mut report = UploadReport::default();

        for (deck, images) in decks {
            progress.set_message(deck.clone());

            let mut described = Vec::with_capacity(images.len());
            for image in images {
                match read_description(&image.path)? {
                    Some(description) => described.push((image, description)),
                    None => {
                        warn!("{} has no description, run `describe` first", image.relative);
                        report.missing_descriptions += 1;
                    }
                }
            }

            if described.is_empty() {
                debug!("Deck {:?} has no described slides", deck);
                progress.inc(1);
                continue;
            }

            if !force && self.is_unchanged(&deck, &described).await? {
                debug!("Deck {:?} already indexed with the same descriptions", deck);
                report.decks_skipped += 1;
                progress.inc(1);
                continue;
            }

            report.slides_indexed += self.index_deck(&deck, described).await?;
            report.decks_uploaded += 1;
            progress.inc(1);
        }

        Ok(report)
    }

    /// Whether the stored records of a deck match the described slides exactly.
    async fn is_unchanged(&self, deck: &str, described: &[(SlideImage, String)]) -> Result<bool> {
        let indexed = self.vector_store.get_by_deck(deck).await?;
        if indexed.len() != described.len() {
            return Ok(false);
        }

        let stored: HashMap<&str, &str> = indexed
            .iter()
            .map(|r| (r.id.as_str(), r.description.as_str()))
            .collect();
        Ok(described
            .iter()
            .all(|(image, description)| stored.get(image.relative.as_str()) == Some(&description.as_str())))
    }

    /// Replace a deck's records with freshly embedded ones.
    async fn index_deck(&self, deck: &str, described: Vec<(SlideImage, String)>) -> Result<usize> {
        let texts: Vec<String> = described.iter().map(|(_, d)| d.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != texts.len() {
            return Err(SlideSearchError::Embedding(format!(
                "Expected {} embeddings for deck {:?}, got {}",
                texts.len(),
                deck,
                embeddings.len()
            )));
        }

        let records: Vec<SlideRecord> = described
            .into_iter()
            .zip(embeddings)
            .map(|((image, description), embedding)| {
                SlideRecord::new(
                    image.relative,
                    deck.to_string(),
                    image.index,
                    description,
                    image.path.to_string_lossy().into_owned(),
                    embedding,
                )
            })
            .collect();

        self.vector_store.replace_deck(deck, &records).await
    }

    /// Run convert, describe and upload in order.
    #[instrument(skip(self, progress))]
    pub async fn ingest(&self, force: bool, progress: &ProgressBar) -> Result<IngestReport> {
        progress.set_prefix("convert");
        let convert = self.convert_all(force, progress).await?;

        progress.set_position(0);
        progress.set_prefix("describe");
        let describe = self.describe_all(force, progress).await?;

        progress.set_position(0);
        progress.set_prefix("upload");
        let upload = self.upload_all(force, progress).await?;

        Ok(IngestReport {
            convert,
            describe,
            upload,
        })
    }
}

/// Summary of an upload run.
#[derive(Debug, Default, Clone)]
pub struct UploadReport {
    pub decks_uploaded: usize,
    /// Decks already indexed with the same descriptions.
    pub decks_skipped: usize,
    pub slides_indexed: usize,
    /// Images without a usable sidecar.
    pub missing_descriptions: usize,
}

/// Summary of a full ingest.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub convert: ConvertReport,
    pub describe: DescribeReport,
    pub upload: UploadReport,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::slides::write_description;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: one dimension per vocabulary word, counting occurrences.
    pub(crate) struct BagOfWordsEmbedder {
        vocabulary: Vec<&'static str>,
        pub(crate) batches: AtomicUsize,
    }

    impl BagOfWordsEmbedder {
        pub(crate) fn new(vocabulary: &[&'static str]) -> Self {
            Self {
                vocabulary: vocabulary.to_vec(),
                batches: AtomicUsize::new(0),
            }
        }

        fn vectorize(&self, text: &str) -> Vec<f32> {
            let words: Vec<String> = text
                .split(|c: char| !c.is_alphanumeric())
                .map(|w| w.to_lowercase())
                .collect();
            self.vocabulary
                .iter()
                .map(|v| words.iter().filter(|w| w == v).count() as f32)
                .collect()
        }
    }

    #[async_trait]
    impl Embedder for BagOfWordsEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.vectorize(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.vectorize(t)).collect())
        }

        fn dimensions(&self) -> Option<usize> {
            Some(self.vocabulary.len())
        }
    }

    struct UnusedDescriber;

    #[async_trait]
    impl Describer for UnusedDescriber {
        async fn describe(&self, image: &Path, _prompt: &str) -> Result<String> {
            Err(SlideSearchError::Describe(format!("unexpected call for {}", image.display())))
        }

        fn model(&self) -> &str {
            "unused"
        }
    }

    pub(crate) const VOCABULARY: &[&str] = &["revenue", "growth", "hiring", "roadmap", "security"];

    /// Image tree with two decks, every slide described.
    pub(crate) fn described_tree(root: &Path) {
        let slides = [
            ("finance", 1, "Revenue growth by quarter"),
            ("finance", 2, "Revenue forecast"),
            ("people", 1, "Hiring plan for engineering"),
            ("people", 2, "Security training roadmap"),
        ];
        for (deck, index, description) in slides {
            let dir = root.join(deck);
            std::fs::create_dir_all(&dir).unwrap();
            let image = dir.join(format!("slide_{}.png", index));
            std::fs::write(&image, b"png").unwrap();
            write_description(&image, description).unwrap();
        }
    }

    fn orchestrator(img_dir: &Path, embedder: Arc<BagOfWordsEmbedder>) -> Orchestrator {
        let mut settings = Settings::default();
        settings.paths.img_dir = img_dir.to_string_lossy().into_owned();
        Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(UnusedDescriber),
            embedder,
            Arc::new(MemoryVectorStore::default()),
        )
    }

    #[tokio::test]
    async fn test_upload_indexes_one_record_per_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        described_tree(dir.path());
        // Not described yet
        std::fs::write(dir.path().join("people").join("slide_3.png"), b"png").unwrap();

        let embedder = Arc::new(BagOfWordsEmbedder::new(VOCABULARY));
        let orch = orchestrator(dir.path(), embedder.clone());
        let report = orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.decks_uploaded, 2);
        assert_eq!(report.slides_indexed, 4);
        assert_eq!(report.missing_descriptions, 1);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);

        let store = orch.vector_store();
        assert_eq!(store.record_count().await.unwrap(), 4);
        let record = store.get("finance/slide_2.png").await.unwrap().unwrap();
        assert_eq!(record.deck, "finance");
        assert_eq!(record.slide_index, Some(2));
        assert_eq!(record.description, "Revenue forecast");
    }

    #[tokio::test]
    async fn test_reupload_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        described_tree(dir.path());

        let embedder = Arc::new(BagOfWordsEmbedder::new(VOCABULARY));
        let orch = orchestrator(dir.path(), embedder.clone());
        orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();

        let report = orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(report.decks_skipped, 2);
        assert_eq!(report.slides_indexed, 0);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);

        let report = orch.upload_all(true, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(report.decks_uploaded, 2);
        assert_eq!(orch.vector_store().record_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_edited_sidecar_is_reindexed_without_force() {
        let dir = tempfile::tempdir().unwrap();
        described_tree(dir.path());

        let embedder = Arc::new(BagOfWordsEmbedder::new(VOCABULARY));
        let orch = orchestrator(dir.path(), embedder.clone());
        orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();

        let image = dir.path().join("finance").join("slide_1.png");
        write_description(&image, "Security roadmap").unwrap();
        let report = orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(report.decks_uploaded, 1);
        assert_eq!(report.decks_skipped, 1);
        assert_eq!(report.slides_indexed, 2);

        let store = orch.vector_store();
        assert_eq!(store.record_count().await.unwrap(), 4);
        let record = store.get("finance/slide_1.png").await.unwrap().unwrap();
        assert_eq!(record.description, "Security roadmap");
    }

    #[tokio::test]
    async fn test_query_finds_matching_slide() {
        let dir = tempfile::tempdir().unwrap();
        described_tree(dir.path());

        let embedder = Arc::new(BagOfWordsEmbedder::new(VOCABULARY));
        let orch = orchestrator(dir.path(), embedder.clone());
        orch.upload_all(false, &ProgressBar::hidden()).await.unwrap();

        let query = embedder.embed("who are we hiring").await.unwrap();
        let results = orch.vector_store().search(&query, 3).await.unwrap();
        assert_eq!(results[0].record.id, "people/slide_1.png");
    }

    #[tokio::test]
    async fn test_describe_all_without_images_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        described_tree(dir.path());

        let orch = orchestrator(dir.path(), Arc::new(BagOfWordsEmbedder::new(VOCABULARY)));
        let report = orch.describe_all(false, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(report.described, 0);
        assert_eq!(report.skipped, 4);
    }

    #[tokio::test]
    async fn test_upload_requires_image_dir() {
        let orch = orchestrator(
            Path::new("/definitely/not/here"),
            Arc::new(BagOfWordsEmbedder::new(VOCABULARY)),
        );
        let err = orch.upload_all(false, &ProgressBar::hidden()).await.unwrap_err();
        assert!(matches!(err, SlideSearchError::Config(_)));
    }
}
