//! slidesearch - semantic search over presentation slides
//!
//! A retrieval-augmented search demo for slide decks.
//!
//! # Overview
//!
//! slidesearch:
//! - Converts `.ppt`/`.pptx`/`.odp` presentations into one image per slide
//! - Describes every slide image with a vision language model
//! - Embeds the descriptions and stores them in a vector database
//! - Serves a login-gated web page to search slides and ask questions about them
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `slides` - Slide image and description sidecar layout on disk
//! - `convert` - Presentation to slide image conversion
//! - `describe` - Slide description with a vision model
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `search` - Slide retrieval and question answering
//! - `orchestrator` - Pipeline coordination
//! - `web` - Web UI and JSON endpoints
//!
//! # Example
//!
//! ```rust,no_run
//! use slidesearch::config::Settings;
//! use slidesearch::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator
//!         .ingest(false, &indicatif::ProgressBar::hidden())
//!         .await?;
//!     println!("Indexed {} slides", report.upload.slides_indexed);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod describe;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod search;
pub mod slides;
pub mod vector_store;
pub mod web;

pub use error::{Result, SlideSearchError};
