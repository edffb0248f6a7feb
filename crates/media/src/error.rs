use std::{fmt, path::PathBuf, process::ExitStatus};

use mediagrab_common::FromMessage;

/// General media-crate failures (work directory, payload reads).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{message}")]
    Message { message: String },
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

mediagrab_common::impl_context!();

// ── Fetch ───────────────────────────────────────────────────────────────────

/// Why the fetch engine could not produce a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The link points at something we refuse to fetch (e.g. a playlist).
    Unsupported,
    /// Network trouble or the extractor rejected the page.
    NetworkOrExtractor,
    /// The engine could not be run or produced output we could not read.
    Unknown,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unsupported => "unsupported source",
            Self::NetworkOrExtractor => "network or extractor error",
            Self::Unknown => "unknown fetch error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unsupported, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NetworkOrExtractor, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unknown, message)
    }
}

// ── Resolve ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("fetched file not found: {}", declared.display())]
    NotFound { declared: PathBuf },
}

// ── Transcode ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transcoder exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("transcoder produced no readable output at {}: {source}", path.display())]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transcoder timed out after {secs}s")]
    TimedOut { secs: u64 },
}
