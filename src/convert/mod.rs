//! Presentation to slide image conversion.
//!
//! Each presentation `<pptx_dir>/<deck>.pptx` becomes a directory
//! `<img_dir>/<deck>/` holding `slide_1.png`, `slide_2.png`, ...

pub mod tools;

use crate::config::Settings;
use crate::error::{Result, SlideSearchError};
use crate::slides::{parse_slide_index, sidecar_path, slide_file_name};
use indicatif::ProgressBar;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, instrument, warn};

/// Presentation formats LibreOffice can render (matched case-insensitively).
pub const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp"];

/// File name prefix pdftoppm writes pages under before they are renamed.
const PAGE_PREFIX: &str = "page";

/// What happened to a single presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted { deck: String, slides: usize },
    Skipped { deck: String },
}

/// Summary of a conversion run.
#[derive(Debug, Default, Clone)]
pub struct ConvertReport {
    pub decks_converted: usize,
    pub decks_skipped: usize,
    pub slides_written: usize,
}

impl ConvertReport {
    fn record(&mut self, outcome: &ConvertOutcome) {
        match outcome {
            ConvertOutcome::Converted { slides, .. } => {
                self.decks_converted += 1;
                self.slides_written += slides;
            }
            ConvertOutcome::Skipped { .. } => self.decks_skipped += 1,
        }
    }
}

/// Renders presentations into per-deck slide images.
#[derive(Debug, Clone)]
pub struct Converter {
    pptx_dir: PathBuf,
    pdf_dir: PathBuf,
    img_dir: PathBuf,
    soffice: String,
    pdftoppm: String,
    width: u32,
    keep_pdf: bool,
}

impl Converter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pptx_dir: settings.pptx_dir(),
            pdf_dir: settings.pdf_dir(),
            img_dir: settings.img_dir(),
            soffice: settings.convert.soffice(),
            pdftoppm: settings.convert.pdftoppm_path.clone(),
            width: settings.convert.width,
            keep_pdf: settings.convert.keep_pdf,
        }
    }

    /// Convert every presentation in the input directory.
    #[instrument(skip(self, progress))]
    pub async fn convert_all(&self, force: bool, progress: &ProgressBar) -> Result<ConvertReport> {
        if !self.pptx_dir.is_dir() {
            return Err(SlideSearchError::Config(format!(
                "Presentation directory {} does not exist",
                self.pptx_dir.display()
            )));
        }

        let presentations = find_presentations(&self.pptx_dir)?;
        info!("Found {} presentations in {:?}", presentations.len(), self.pptx_dir);

        progress.set_length(presentations.len() as u64);
        let mut report = ConvertReport::default();

        for path in presentations {
            progress.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            let outcome = self.convert_presentation(&path, force).await?;
            report.record(&outcome);
            progress.inc(1);
        }

        Ok(report)
    }

    /// Render one presentation into `<img_dir>/<deck>/slide_<n>.png`.
    #[instrument(skip(self), fields(input = %input.display()))]
    pub async fn convert_presentation(&self, input: &Path, force: bool) -> Result<ConvertOutcome> {
        let deck = deck_name(input)?;
        let deck_dir = self.img_dir.join(&deck);

        if deck_dir.exists() && !deck_dir.is_dir() {
            return Err(SlideSearchError::InvalidInput(format!(
                "Output path {} exists but is not a directory",
                deck_dir.display()
            )));
        }
        std::fs::create_dir_all(&deck_dir)?;

        let existing = existing_slides(&deck_dir)?;
        if !existing.is_empty() && !force {
            debug!("Deck {} already has {} slides, skipping", deck, existing.len());
            return Ok(ConvertOutcome::Skipped { deck });
        }

        info!("Converting {} to PDF", deck);
        let pdf = tools::presentation_to_pdf(&self.soffice, input, &self.pdf_dir).await?;

        // Pages are staged outside the deck so a failed render leaves its slides alone
        let staging = tempfile::Builder::new()
            .prefix(".render-")
            .tempdir_in(&self.img_dir)?;

        info!("Rendering slides of {}", deck);
        let rendered =
            tools::pdf_to_pngs(&self.pdftoppm, &pdf, staging.path(), PAGE_PREFIX, self.width).await;

        if !self.keep_pdf {
            if let Err(e) = std::fs::remove_file(&pdf) {
                warn!("Failed to remove intermediate PDF {:?}: {}", pdf, e);
            }
        }
        rendered?;

        let slides = install_rendered(staging.path(), &deck_dir)
            .map_err(|e| match e {
                SlideSearchError::Conversion(msg) => {
                    SlideSearchError::Conversion(format!("{}: {}", input.display(), msg))
                }
                other => other,
            })?;

        info!("Wrote {} slides for {}", slides.len(), deck);
        Ok(ConvertOutcome::Converted {
            deck,
            slides: slides.len(),
        })
    }
}

/// Whether a file is a supported presentation.
pub fn is_presentation(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PRESENTATION_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Presentations directly inside `dir`, sorted by name.
pub fn find_presentations(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_presentation(&path) {
            found.push(path);
        } else {
            debug!("{:?} is not a supported presentation", path);
        }
    }
    found.sort();
    Ok(found)
}

/// Deck name of a presentation: its file stem.
pub fn deck_name(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SlideSearchError::InvalidInput(format!("{} has no file name", path.display())))
}

/// `slide_<n>.png` files already present in a deck directory.
fn existing_slides(deck_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut slides = Vec::new();
    for entry in std::fs::read_dir(deck_dir)? {
        let path = entry?.path();
        let is_slide = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_slide_index)
            .is_some();
        if is_slide {
            slides.push(path);
        }
    }
    Ok(slides)
}

/// Remove slide images together with their now-stale sidecars.
fn clear_slides(slides: &[PathBuf]) -> Result<()> {
    for slide in slides {
        std::fs::remove_file(slide)?;
        let sidecar = sidecar_path(slide);
        if sidecar.exists() {
            std::fs::remove_file(sidecar)?;
        }
    }
    Ok(())
}

/// Move freshly rendered pages from `staging` into `deck_dir`, replacing the old
/// slides and their sidecars only once the new set is complete.
fn install_rendered(staging: &Path, deck_dir: &Path) -> Result<Vec<PathBuf>> {
    let pages = rename_pages(staging)?;
    if pages.is_empty() {
        return Err(SlideSearchError::Conversion("rendered no slides".to_string()));
    }

    clear_slides(&existing_slides(deck_dir)?)?;

    let mut slides = Vec::with_capacity(pages.len());
    for page in pages {
        let Some(name) = page.file_name() else { continue };
        let slide = deck_dir.join(name);
        std::fs::rename(&page, &slide)?;
        slides.push(slide);
    }
    Ok(slides)
}

/// Rename pdftoppm's `page-<n>.png` output (zero padding varies with page count)
/// to `slide_<n>.png`. Returns the slide paths in slide order.
pub fn rename_pages(deck_dir: &Path) -> Result<Vec<PathBuf>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(&format!(r"^{}-(\d+)\.png$", PAGE_PREFIX)).expect("valid regex")
    });

    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(deck_dir)? {
        let path = entry?.path();
        let number = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| re.captures(n))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        if let Some(n) = number {
            pages.push((n, path));
        }
    }
    pages.sort_by_key(|(n, _)| *n);

    let mut slides = Vec::with_capacity(pages.len());
    for (n, page) in pages {
        let slide = deck_dir.join(slide_file_name(n));
        std::fs::rename(&page, &slide)?;
        slides.push(slide);
    }
    Ok(slides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::{read_description, write_description};

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_find_presentations_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pptx", "a.PPT", "c.odp", "notes.txt", "d.pdf"] {
            touch(&dir.path().join(name));
        }
        std::fs::create_dir(dir.path().join("nested.pptx")).unwrap();

        let found = find_presentations(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PPT", "b.pptx", "c.odp"]);
    }

    #[test]
    fn test_deck_name_is_file_stem() {
        assert_eq!(deck_name(Path::new("/in/Q3 review.v2.pptx")).unwrap(), "Q3 review.v2");
    }

    #[test]
    fn test_rename_pages_handles_padding() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-01.png", "page-02.png", "page-10.png", "other.png"] {
            touch(&dir.path().join(name));
        }

        let slides = rename_pages(dir.path()).unwrap();
        let names: Vec<String> = slides
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["slide_1.png", "slide_2.png", "slide_10.png"]);
        assert!(!dir.path().join("page-01.png").exists());
        assert!(dir.path().join("other.png").exists());
    }

    #[tokio::test]
    async fn test_existing_deck_is_skipped_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let pptx_dir = dir.path().join("pptx");
        std::fs::create_dir_all(&pptx_dir).unwrap();
        touch(&pptx_dir.join("intro.pptx"));
        let deck_dir = dir.path().join("img").join("intro");
        std::fs::create_dir_all(&deck_dir).unwrap();
        touch(&deck_dir.join("slide_1.png"));

        let mut settings = Settings::default();
        settings.paths.pptx_dir = pptx_dir.to_string_lossy().into_owned();
        settings.paths.img_dir = dir.path().join("img").to_string_lossy().into_owned();
        settings.paths.pdf_dir = dir.path().join("pdf").to_string_lossy().into_owned();
        settings.convert.soffice_path = Some("slidesearch-no-such-soffice".to_string());

        let converter = Converter::from_settings(&settings);
        let report = converter
            .convert_all(false, &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(report.decks_skipped, 1);
        assert_eq!(report.decks_converted, 0);

        // A failed forced reconversion keeps the old slides and descriptions
        write_description(&deck_dir.join("slide_1.png"), "Agenda").unwrap();
        let err = converter
            .convert_presentation(&pptx_dir.join("intro.pptx"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SlideSearchError::ToolNotFound(_)));
        assert!(deck_dir.join("slide_1.png").exists());
        assert_eq!(
            read_description(&deck_dir.join("slide_1.png")).unwrap().as_deref(),
            Some("Agenda")
        );
    }

    #[test]
    fn test_install_rendered_replaces_old_slides() {
        let dir = tempfile::tempdir().unwrap();
        let deck_dir = dir.path().join("intro");
        let staging = dir.path().join(".render-intro");
        std::fs::create_dir_all(&deck_dir).unwrap();
        std::fs::create_dir_all(&staging).unwrap();

        for n in 1..=3 {
            let slide = deck_dir.join(slide_file_name(n));
            touch(&slide);
            write_description(&slide, "old").unwrap();
        }
        touch(&staging.join("page-1.png"));
        touch(&staging.join("page-2.png"));

        let slides = install_rendered(&staging, &deck_dir).unwrap();
        assert_eq!(slides, vec![deck_dir.join("slide_1.png"), deck_dir.join("slide_2.png")]);
        assert!(!deck_dir.join("slide_3.png").exists());
        assert!(!sidecar_path(&deck_dir.join("slide_1.png")).exists());
        assert!(!sidecar_path(&deck_dir.join("slide_3.png")).exists());
    }

    #[test]
    fn test_empty_render_keeps_old_slides() {
        let dir = tempfile::tempdir().unwrap();
        let deck_dir = dir.path().join("intro");
        let staging = dir.path().join(".render-intro");
        std::fs::create_dir_all(&deck_dir).unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        touch(&deck_dir.join("slide_1.png"));

        let err = install_rendered(&staging, &deck_dir).unwrap_err();
        assert!(matches!(err, SlideSearchError::Conversion(_)));
        assert!(deck_dir.join("slide_1.png").exists());
    }

    #[tokio::test]
    async fn test_missing_input_dir_is_config_error() {
        let mut settings = Settings::default();
        settings.paths.pptx_dir = "/definitely/not/here".to_string();
        let err = Converter::from_settings(&settings)
            .convert_all(false, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, SlideSearchError::Config(_)));
    }
}
