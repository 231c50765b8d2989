//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, SlideSearchError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Conversion needs LibreOffice and poppler.
    Convert,
    /// Description needs access to the vision model.
    Describe,
    /// Uploading needs access to the embedding model.
    Upload,
    /// All of the above.
    Ingest,
    /// Search embeds the query.
    Search,
    /// Asking also needs the chat model.
    Ask,
    /// The server searches and answers, and needs a login password.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Convert => {
            check_tool(&settings.convert.soffice(), "--version")?;
            check_tool(&settings.convert.pdftoppm_path, "-v")?;
        }
        Operation::Describe => {
            check_api_key(settings.vision.base_url.as_deref())?;
        }
        Operation::Upload | Operation::Search => {
            check_api_key(settings.embedding.base_url.as_deref())?;
        }
        Operation::Ingest => {
            check(Operation::Convert, settings)?;
            check(Operation::Describe, settings)?;
            check(Operation::Upload, settings)?;
        }
        Operation::Ask => {
            check_api_key(settings.embedding.base_url.as_deref())?;
            check_api_key(settings.answer.base_url.as_deref())?;
        }
        Operation::Serve => {
            check_password(settings)?;
            check(Operation::Ask, settings)?;
        }
    }
    Ok(())
}

/// Check that an API key is set. Self-hosted servers (a base URL is configured) may not need one.
fn check_api_key(base_url: Option<&str>) -> Result<()> {
    if base_url.is_some_and(|u| !u.is_empty()) {
        return Ok(());
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SlideSearchError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SlideSearchError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...', \
             or point the model at a compatible server with a base_url"
                .to_string(),
        )),
    }
}

fn check_password(settings: &Settings) -> Result<()> {
    match settings.server.password.as_deref() {
        Some(p) if !p.is_empty() => Ok(()),
        _ => Err(SlideSearchError::Config(
            "No login password configured. Set it with: export SLIDES_PASSWORD='...'".to_string(),
        )),
    }
}

/// Check if an external tool can be started.
fn check_tool(name: &str, version_arg: &str) -> Result<()> {
    // pdftoppm exits non-zero for -v on some poppler versions, so spawning is enough
    match Command::new(name).arg(version_arg).output() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SlideSearchError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(SlideSearchError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_hosted_models_need_no_key() {
        assert!(check_api_key(Some("http://localhost:8000/v1")).is_ok());
    }

    #[test]
    fn test_serve_requires_password() {
        let settings = Settings::default();
        let err = check(Operation::Serve, &settings).unwrap_err();
        assert!(matches!(err, SlideSearchError::Config(msg) if msg.contains("password")));
    }

    #[test]
    fn test_missing_tool() {
        let mut settings = Settings::default();
        settings.convert.soffice_path = Some("slidesearch-no-such-soffice".to_string());
        let err = check(Operation::Convert, &settings).unwrap_err();
        assert!(matches!(err, SlideSearchError::ToolNotFound(_)));
    }
}
