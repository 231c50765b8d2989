//! Wrappers around the external rendering tools.
//!
//! LibreOffice turns a presentation into a PDF and poppler's `pdftoppm`
//! rasterizes each PDF page into a PNG.

use crate::error::{Result, SlideSearchError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Run an external program, mapping a missing binary and a failed exit to typed errors.
async fn run_tool<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SlideSearchError::ToolNotFound(program.to_string()));
        }
        Err(e) => {
            return Err(SlideSearchError::ToolFailed(format!("{program} execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SlideSearchError::ToolFailed(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    debug!("{} finished: {}", program, String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}

/// Convert a presentation to PDF with LibreOffice. Returns the PDF path.
#[instrument(skip(soffice, out_dir), fields(input = %input.display()))]
pub async fn presentation_to_pdf(soffice: &str, input: &Path, out_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;

    run_tool(
        soffice,
        [
            OsStr::new("--headless"),
            OsStr::new("--convert-to"),
            OsStr::new("pdf"),
            input.as_os_str(),
            OsStr::new("--outdir"),
            out_dir.as_os_str(),
        ],
    )
    .await?;

    let stem = input.file_stem().ok_or_else(|| {
        SlideSearchError::InvalidInput(format!("{} has no file name", input.display()))
    })?;
    let pdf = out_dir.join(format!("{}.pdf", stem.to_string_lossy()));

    if !pdf.exists() {
        return Err(SlideSearchError::Conversion(format!(
            "{} did not produce {}",
            soffice,
            pdf.display()
        )));
    }

    Ok(pdf)
}

/// Rasterize every PDF page to `<out_dir>/<prefix>-<n>.png`, `width` pixels wide.
#[instrument(skip(pdftoppm, out_dir), fields(pdf = %pdf.display()))]
pub async fn pdf_to_pngs(
    pdftoppm: &str,
    pdf: &Path,
    out_dir: &Path,
    prefix: &str,
    width: u32,
) -> Result<()> {
    let width = width.to_string();
    let target = out_dir.join(prefix);

    run_tool(
        pdftoppm,
        [
            OsStr::new("-png"),
            OsStr::new("-scale-to-x"),
            OsStr::new(&width),
            OsStr::new("-scale-to-y"),
            OsStr::new("-1"),
            pdf.as_os_str(),
            target.as_os_str(),
        ],
    )
    .await
}

/// Check that a tool can be spawned at all.
pub async fn is_available(program: &str, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}
