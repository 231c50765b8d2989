//! Slide description with a vision language model.
//!
//! Every image below the image root gets a `<image>.desc.txt` sidecar holding
//! the model's description. Later steps only ever read the sidecars.

mod openai;

pub use openai::{image_data_url, OpenAIDescriber};

use crate::error::{Result, SlideSearchError};
use crate::slides::{find_images, has_description, write_description};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Trait for vision models that turn an image into text.
#[async_trait]
pub trait Describer: Send + Sync {
    /// Describe a single image.
    async fn describe(&self, image: &Path, prompt: &str) -> Result<String>;

    /// Model identifier, for logs and `doctor`.
    fn model(&self) -> &str;
}

/// Summary of a describe run.
#[derive(Debug, Default, Clone)]
pub struct DescribeReport {
    pub described: usize,
    pub skipped: usize,
}

/// Describe every image below `root` that has no description yet.
///
/// With `force`, existing sidecars are regenerated.
#[instrument(skip(describer, prompt, progress), fields(root = %root.display(), model = describer.model()))]
pub async fn describe_images(
    root: &Path,
    describer: &dyn Describer,
    prompt: &str,
    force: bool,
    progress: &ProgressBar,
) -> Result<DescribeReport> {
    if !root.is_dir() {
        return Err(SlideSearchError::Config(format!(
            "Image directory {} does not exist",
            root.display()
        )));
    }
    if prompt.trim().is_empty() {
        return Err(SlideSearchError::InvalidInput(
            "Describe prompt is empty".to_string(),
        ));
    }

    let images = find_images(root)?;
    info!("Found {} images below {:?}", images.len(), root);
    progress.set_length(images.len() as u64);

    let mut report = DescribeReport::default();
    for image in images {
        progress.set_message(image.relative.clone());

        if !force && has_description(&image.path) {
            debug!("{} already described", image.relative);
            report.skipped += 1;
            progress.inc(1);
            continue;
        }

        let description = describer.describe(&image.path, prompt).await?;
        write_description(&image.path, &description)?;
        report.described += 1;
        progress.inc(1);
    }

    Ok(report)
}
