use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    mediagrab_config::{MediagrabConfig, Severity, ValidationResult, validate},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load the config named on the command line, or discover one.
///
/// Returns the config together with the file it came from, if any.
pub fn load(explicit: Option<&Path>) -> Result<(MediagrabConfig, Option<PathBuf>)> {
    match explicit {
        Some(path) => {
            let mut config = mediagrab_config::load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            mediagrab_config::apply_env_overrides(&mut config);
            Ok((config, Some(path.to_path_buf())))
        },
        None => mediagrab_config::discover_and_load(),
    }
}

/// Validate and print diagnostics to stderr. Returns `true` when there are
/// no errors.
pub fn check(config: &MediagrabConfig, path: Option<PathBuf>) -> bool {
    let result = validate(config, path);
    report(&result);
    !result.has_errors()
}

fn report(result: &ValidationResult) {
    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults and environment.\n");
    }

    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if !result.diagnostics.is_empty() {
        eprintln!();
    }
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}
