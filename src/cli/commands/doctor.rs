//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::convert::find_presentations;
use crate::slides::{find_images, has_description};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, results: Vec<CheckResult>, checks: &mut Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &results {
        check.print();
    }
    checks.extend(results);
    println!();
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("slidesearch doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    print_section(
        "External Tools",
        vec![
            check_tool("LibreOffice", &settings.convert.soffice(), "--version", install_hint_libreoffice()),
            check_tool("pdftoppm", &settings.convert.pdftoppm_path, "-v", install_hint_poppler()),
        ],
        &mut checks,
    );

    print_section("Models", check_models(settings), &mut checks);
    print_section("Directories", check_directories(settings), &mut checks);
    print_section(
        "Configuration",
        vec![check_config_file(), check_password(settings)],
        &mut checks,
    );

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using slidesearch.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! slidesearch is ready to use.");
    }

    Ok(())
}

/// Check if an external tool can be started.
fn check_tool(name: &str, program: &str, version_arg: &str, hint: &str) -> CheckResult {
    match Command::new(program).arg(version_arg).output() {
        Ok(output) => {
            // pdftoppm prints its version on stderr
            let text = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let version = String::from_utf8_lossy(&text)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else if version.is_empty() {
                "installed".to_string()
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, &format!("{} not found", program), hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Describe one model endpoint, checking the API key when it is OpenAI itself.
fn check_model(role: &str, model: &str, base_url: Option<&str>) -> CheckResult {
    match base_url.filter(|u| !u.is_empty()) {
        Some(url) => CheckResult::ok(role, &format!("{} at {}", model, url)),
        None => match std::env::var("OPENAI_API_KEY") {
            Ok(key) if key.len() > 11 => {
                let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
                CheckResult::ok(role, &format!("{} on OpenAI (key {})", model, masked))
            }
            Ok(key) if key.is_empty() => CheckResult::error(
                role,
                &format!("{} on OpenAI, but OPENAI_API_KEY is empty", model),
                "Set with: export OPENAI_API_KEY='sk-...'",
            ),
            Ok(_) => CheckResult::warning(
                role,
                &format!("{} on OpenAI, OPENAI_API_KEY looks unusual", model),
                "Expected format: sk-... (OpenAI API key)",
            ),
            Err(_) => CheckResult::error(
                role,
                &format!("{} on OpenAI, but OPENAI_API_KEY is not set", model),
                "Set OPENAI_API_KEY, or configure a base_url for a compatible server",
            ),
        },
    }
}

fn check_models(settings: &Settings) -> Vec<CheckResult> {
    vec![
        check_model("Vision model", &settings.vision.model, settings.vision.base_url.as_deref()),
        check_model(
            "Embedding model",
            &settings.embedding.model,
            settings.embedding.base_url.as_deref(),
        ),
        check_model("Chat model", &settings.answer.model, settings.answer.base_url.as_deref()),
    ]
}

fn check_input_dir(name: &str, dir: &Path) -> CheckResult {
    if !dir.is_dir() {
        return CheckResult::warning(
            name,
            &format!("{} (missing)", dir.display()),
            "Create it and put .ppt/.pptx/.odp files in it",
        );
    }
    match find_presentations(dir) {
        Ok(found) => CheckResult::ok(name, &format!("{} ({} presentations)", dir.display(), found.len())),
        Err(e) => CheckResult::error(name, &format!("{}: {}", dir.display(), e), "Check permissions"),
    }
}

fn check_image_dir(dir: &Path) -> CheckResult {
    if !dir.is_dir() {
        return CheckResult::warning(
            "Images",
            &format!("{} (not created yet)", dir.display()),
            "Run: slidesearch convert",
        );
    }
    match find_images(dir) {
        Ok(images) => {
            let described = images.iter().filter(|i| has_description(&i.path)).count();
            let message = format!(
                "{} ({} slides, {} described)",
                dir.display(),
                images.len(),
                described
            );
            if described < images.len() {
                CheckResult::warning("Images", &message, "Run: slidesearch describe")
            } else {
                CheckResult::ok("Images", &message)
            }
        }
        Err(e) => CheckResult::error("Images", &format!("{}: {}", dir.display(), e), "Check permissions"),
    }
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![
        check_input_dir("Presentations", &settings.pptx_dir()),
        check_image_dir(&settings.img_dir()),
    ];

    let db_path = settings.db_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first upload",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: slidesearch config edit",
        )
    }
}

fn check_password(settings: &Settings) -> CheckResult {
    match settings.server.password.as_deref() {
        Some(p) if !p.is_empty() => {
            CheckResult::ok("Web login", &format!("user {}", settings.server.username))
        }
        _ => CheckResult::warning(
            "Web login",
            "no password set, `serve` will refuse to start",
            "Set with: export SLIDES_PASSWORD='...'",
        ),
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn install_hint_libreoffice() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install --cask libreoffice"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install libreoffice-impress (or your package manager)"
    } else {
        "Install from: https://www.libreoffice.org/download/"
    }
}

fn install_hint_poppler() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install poppler"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install poppler-utils (or your package manager)"
    } else {
        "Install from: https://poppler.freedesktop.org/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_self_hosted_model_is_ok() {
        let result = check_model("Vision model", "Qwen/Qwen2.5-VL-3B-Instruct", Some("http://gpu:8000/v1"));
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.message.contains("http://gpu:8000/v1"));
    }

    #[test]
    fn test_missing_tool_is_error() {
        let result = check_tool("LibreOffice", "slidesearch-no-such-soffice", "--version", "install");
        assert_eq!(result.status, CheckStatus::Error);
    }

    #[test]
    fn test_image_dir_counts_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck");
        std::fs::create_dir_all(&deck).unwrap();
        std::fs::write(deck.join("slide_1.png"), b"png").unwrap();
        std::fs::write(deck.join("slide_2.png"), b"png").unwrap();
        std::fs::write(deck.join("slide_1.png.desc.txt"), b"A chart").unwrap();

        let result = check_image_dir(dir.path());
        assert_eq!(result.status, CheckStatus::Warning);
        assert!(result.message.contains("2 slides, 1 described"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
