//! Slide image layout on disk.
//!
//! The converter writes `<img_dir>/<deck>/slide_<n>.png` and the describer puts a
//! `<image>.desc.txt` sidecar next to every image. Everything downstream finds its
//! inputs through the helpers in this module.

use crate::error::{Result, SlideSearchError};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Suffix appended to an image path to name its description sidecar.
pub const DESCRIPTION_SUFFIX: &str = ".desc.txt";

/// Image extensions picked up by the describer (matched case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff"];

/// A rendered slide image under the image root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideImage {
    /// Deck (presentation) name, i.e. the directory below the image root.
    pub deck: String,
    /// 1-based slide number when the file follows the `slide_<n>` naming.
    pub index: Option<u32>,
    /// Full path to the image.
    pub path: PathBuf,
    /// Path relative to the image root, `/`-separated.
    pub relative: String,
}

impl SlideImage {
    /// Identify an image located somewhere below `root`.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            SlideSearchError::InvalidInput(format!(
                "{} is not below the image directory {}",
                path.display(),
                root.display()
            ))
        })?;

        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let file_name = parts.last().cloned().ok_or_else(|| {
            SlideSearchError::InvalidInput(format!("{} has no file name", path.display()))
        })?;

        Ok(Self {
            deck: parts[..parts.len() - 1].join("/"),
            index: parse_slide_index(&file_name),
            path: path.to_path_buf(),
            relative: parts.join("/"),
        })
    }

    /// Stable record id: the image path relative to the image root.
    pub fn id(&self) -> &str {
        &self.relative
    }

    /// Path of the description sidecar for this image.
    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_path(&self.path)
    }
}

/// `<image>` -> `<image>.desc.txt`
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push(DESCRIPTION_SUFFIX);
    PathBuf::from(name)
}

/// File name of the n-th (1-based) slide image.
pub fn slide_file_name(index: u32) -> String {
    format!("slide_{}.png", index)
}

/// Parse `n` out of `slide_<n>.<ext>`.
pub fn parse_slide_index(file_name: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^slide_(\d+)\.[A-Za-z]+$").expect("valid regex"));
    re.captures(file_name)?.get(1)?.as_str().parse().ok()
}

/// Whether the path has one of the supported image extensions.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// MIME type for an image path, by extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Recursively collect all images below `root`, in deck then slide order.
pub fn find_images(root: &Path) -> Result<Vec<SlideImage>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            images.push(SlideImage::from_path(root, entry.path())?);
        }
    }
    sort_slides(&mut images);
    Ok(images)
}

/// Immediate sub-directories of the image root, i.e. one per deck, sorted by name.
pub fn find_decks(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut decks = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            decks.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    decks.sort();
    Ok(decks)
}

/// Sort so that `slide_2` comes before `slide_10`.
pub fn sort_slides(images: &mut [SlideImage]) {
    images.sort_by(|a, b| {
        a.deck
            .cmp(&b.deck)
            .then(a.index.unwrap_or(u32::MAX).cmp(&b.index.unwrap_or(u32::MAX)))
            .then(a.relative.cmp(&b.relative))
    });
}

/// Read an image's description. Missing or blank sidecars yield `None`.
pub fn read_description(image: &Path) -> Result<Option<String>> {
    let path = sidecar_path(image);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // Sidecars written by other tools are not always UTF-8
    let text = String::from_utf8_lossy(&bytes).trim().to_string();
    Ok((!text.is_empty()).then_some(text))
}

/// Whether an image already has a non-empty sidecar.
pub fn has_description(image: &Path) -> bool {
    std::fs::metadata(sidecar_path(image))
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Write an image's description, replacing any previous sidecar atomically.
pub fn write_description(image: &Path, description: &str) -> Result<PathBuf> {
    let target = sidecar_path(image);
    let dir = target.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(description.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&target).map_err(|e| SlideSearchError::Io(e.error))?;

    Ok(target)
}
