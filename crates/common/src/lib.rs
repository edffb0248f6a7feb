//! Shared types, error definitions, and utilities used across all mediagrab crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage},
    types::{MediaMode, SessionId},
};
