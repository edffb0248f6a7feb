//! Configuration loading, validation, and env substitution.
//!
//! Config files: `mediagrab.toml`, `mediagrab.yaml`, or `mediagrab.json`
//! Searched in `./` then `~/.config/mediagrab/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        DEFAULT_MAX_SIZE_BYTES, FetchConfig, MediagrabConfig, SessionConfig, TelegramConfig,
        TranscodeConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
