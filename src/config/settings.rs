//! Configuration settings for slidesearch.

use crate::error::{Result, SlideSearchError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Prefix shared by all environment overrides.
pub const ENV_PREFIX: &str = "SLIDES_";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub paths: PathSettings,
    pub convert: ConvertSettings,
    pub vision: VisionSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub search: SearchSettings,
    pub answer: AnswerSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log at debug level.
    pub debug: bool,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "warn".to_string(),
        }
    }
}

/// Directory layout for the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory containing the presentation files.
    pub pptx_dir: String,
    /// Directory for intermediate PDF files.
    pub pdf_dir: String,
    /// Root directory of the per-deck slide images.
    pub img_dir: String,
    /// Directory holding the vector database.
    pub db_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            pptx_dir: "Files/PPTX_DIR".to_string(),
            pdf_dir: "Files/PDF_DIR".to_string(),
            img_dir: "Files/IMG_DIR".to_string(),
            db_dir: "db".to_string(),
        }
    }
}

/// Presentation rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertSettings {
    /// LibreOffice binary. Platform default when unset.
    pub soffice_path: Option<String>,
    /// Poppler rasterizer binary.
    pub pdftoppm_path: String,
    /// Width in pixels of the rendered slide images. Height keeps the aspect ratio.
    pub width: u32,
    /// Keep the intermediate PDF after rasterizing.
    pub keep_pdf: bool,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            soffice_path: None,
            pdftoppm_path: "pdftoppm".to_string(),
            width: 800,
            keep_pdf: false,
        }
    }
}

impl ConvertSettings {
    /// The LibreOffice binary to invoke on this platform.
    pub fn soffice(&self) -> String {
        match &self.soffice_path {
            Some(path) if !path.is_empty() => path.clone(),
            _ if cfg!(target_os = "macos") => {
                "/Applications/LibreOffice.app/Contents/MacOS/soffice".to_string()
            }
            _ => "soffice".to_string(),
        }
    }
}

/// Vision-language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Model used to describe slide images.
    pub model: String,
    /// OpenAI-compatible API base (e.g. a vLLM server). OpenAI when unset.
    pub base_url: Option<String>,
    /// Maximum tokens in a description.
    pub max_tokens: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_tokens: 1024,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Requested embedding dimensions. Omitted from requests when unset.
    pub dimensions: Option<u32>,
    /// OpenAI-compatible API base. OpenAI when unset.
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: Some(1536),
            base_url: None,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Collection holding the slide records.
    pub collection: String,
    /// Database file name inside `paths.db_dir`.
    pub db_file: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            collection: "all_files".to_string(),
            db_file: "slides.db".to_string(),
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Number of slides returned per query.
    pub n_results: usize,
    /// Minimum cosine similarity of a returned slide. Unset returns the nearest
    /// `n_results` slides whatever their score.
    pub min_score: Option<f32>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            n_results: 16,
            min_score: None,
        }
    }
}

/// Settings for answering questions over search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Chat model used to answer questions.
    pub model: String,
    /// OpenAI-compatible API base. OpenAI when unset.
    pub base_url: Option<String>,
    pub temperature: f32,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: 0.2,
        }
    }
}

/// Web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Login name for the web UI.
    pub username: String,
    /// Login password for the web UI. The server refuses to start without one.
    pub password: Option<String>,
    /// Lifetime of a login session.
    pub session_ttl_minutes: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7680,
            username: "admin".to_string(),
            password: None,
            session_ttl_minutes: 480,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None,
    /// then apply `SLIDES_*` environment overrides.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(&Self::env_vars())?;
        Ok(settings)
    }

    /// Collect `SLIDES_*` variables from the process environment, keyed in upper case.
    pub fn env_vars() -> HashMap<String, String> {
        std::env::vars()
            .filter_map(|(key, value)| {
                let key = key.to_uppercase();
                key.starts_with(ENV_PREFIX).then_some((key, value))
            })
            .collect()
    }

    /// Overlay values from an upper-cased `SLIDES_*` variable map.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        let get = |name: &str| vars.get(&format!("{}{}", ENV_PREFIX, name)).cloned();

        if let Some(v) = get("VISION_MODEL") {
            self.vision.model = v;
        }
        if let Some(v) = get("VISION_BASE_URL") {
            self.vision.base_url = optional(v);
        }
        if let Some(v) = get("SENTENCE_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = get("EMBEDDING_BASE_URL") {
            self.embedding.base_url = optional(v);
        }
        if let Some(v) = get("EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = match optional(v) {
                Some(n) => Some(parse_number("EMBEDDING_DIMENSIONS", &n)?),
                None => None,
            };
        }
        if let Some(v) = get("CHAT_MODEL") {
            self.answer.model = v;
        }
        if let Some(v) = get("PPTX_DIR") {
            self.paths.pptx_dir = v;
        }
        if let Some(v) = get("PDF_DIR") {
            self.paths.pdf_dir = v;
        }
        if let Some(v) = get("IMG_DIR") {
            self.paths.img_dir = v;
        }
        if let Some(v) = get("DB_DIR") {
            self.paths.db_dir = v;
        }
        if let Some(v) = get("N_RESULTS") {
            self.search.n_results = parse_number("N_RESULTS", &v)?;
        }
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("USERNAME") {
            self.server.username = v;
        }
        if let Some(v) = get("PASSWORD") {
            self.server.password = optional(v);
        }
        if let Some(v) = get("DEBUG") {
            self.general.debug = parse_bool("DEBUG", &v)?;
        }

        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SlideSearchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("slidesearch")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn pptx_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.pptx_dir)
    }

    pub fn pdf_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.pdf_dir)
    }

    pub fn img_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.img_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn db_path(&self) -> PathBuf {
        Self::expand_path(&self.paths.db_dir).join(&self.vector_store.db_file)
    }
}

/// `None`, `null` and the empty string unset an optional value.
fn optional(value: String) -> Option<String> {
    match value.trim().to_lowercase().as_str() {
        "" | "none" | "null" => None,
        _ => Some(value),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        SlideSearchError::Config(format!("{}{} must be a number, got '{}'", ENV_PREFIX, name, value))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(SlideSearchError::Config(format!(
            "{}{} must be a boolean, got '{}'",
            ENV_PREFIX, name, value
        ))),
    }
}
