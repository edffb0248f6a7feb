use std::path::{Path, PathBuf};

use {anyhow::Context, secrecy::Secret, tracing::debug};

use crate::{env_subst::substitute_env, schema::MediagrabConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "mediagrab.toml",
    "mediagrab.yaml",
    "mediagrab.yml",
    "mediagrab.json",
];

/// Env vars that carry the bot token, checked in order.
const TOKEN_ENV_VARS: &[&str] = &["MEDIAGRAB_TELEGRAM_TOKEN", "TOKEN"];

const COOKIES_ENV_VAR: &str = "MEDIAGRAB_COOKIES_FILE";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<MediagrabConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./mediagrab.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/mediagrab/mediagrab.{toml,yaml,yml,json}` (user-global)
///
/// Returns the config together with the file it came from. Defaults are used
/// only when no file exists; a file that exists but cannot be read or parsed
/// is an error. Env overrides are applied in every case.
pub fn discover_and_load() -> anyhow::Result<(MediagrabConfig, Option<PathBuf>)> {
    load_discovered(find_config_file())
}

fn load_discovered(found: Option<PathBuf>) -> anyhow::Result<(MediagrabConfig, Option<PathBuf>)> {
    let mut config = match &found {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path).with_context(|| format!("failed to load {}", path.display()))?
        },
        None => {
            debug!("no config file found, using defaults");
            MediagrabConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    Ok((config, found))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/mediagrab/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mediagrab").map(|d| d.config_dir().to_path_buf())
}

/// Overlay values taken from the process environment.
pub fn apply_env_overrides(config: &mut MediagrabConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut MediagrabConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(token) = TOKEN_ENV_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
    {
        config.telegram.token = Secret::new(token.trim().to_string());
    }
    if let Some(path) = lookup(COOKIES_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.fetch.cookies_file = Some(PathBuf::from(path));
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<MediagrabConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
