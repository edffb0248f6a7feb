//! Semantic checks run by `mediagrab check-config` and at startup.

use std::path::PathBuf;

use secrecy::ExposeSecret;

use crate::{env_subst::has_placeholder, schema::MediagrabConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "telegram.token"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a loaded config. External binaries are looked up on `PATH`.
#[must_use]
pub fn validate(config: &MediagrabConfig, config_path: Option<PathBuf>) -> ValidationResult {
    validate_with(config, config_path, |bin| which::which(bin).is_ok())
}

fn validate_with(
    config: &MediagrabConfig,
    config_path: Option<PathBuf>,
    binary_exists: impl Fn(&str) -> bool,
) -> ValidationResult {
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path,
    };

    let token = config.telegram.token.expose_secret();
    if token.trim().is_empty() {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token is empty; set it in the config file or via TOKEN",
        );
    } else if has_placeholder(token) {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token references an unset environment variable",
        );
    } else if !token.contains(':') {
        result.push(
            Severity::Warning,
            "telegram.token",
            "bot token does not look like `<id>:<secret>`",
        );
    }

    if config.transcode.max_size_bytes == 0 {
        result.push(
            Severity::Error,
            "transcode.max_size_bytes",
            "size limit must be greater than zero",
        );
    }

    if let Some(cookies) = &config.fetch.cookies_file
        && !cookies.exists()
    {
        result.push(
            Severity::Warning,
            "fetch.cookies_file",
            format!("{} does not exist and will be ignored", cookies.display()),
        );
    }

    for (path, binary) in [
        ("fetch.binary", &config.fetch.binary),
        ("transcode.binary", &config.transcode.binary),
    ] {
        if !binary_exists(binary) {
            result.push(
                Severity::Warning,
                path,
                format!("`{binary}` was not found on PATH"),
            );
        }
    }

    result
}
