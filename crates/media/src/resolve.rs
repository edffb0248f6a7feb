//! Locates the file the fetch engine actually wrote.
//!
//! Format negotiation can change the container after the engine has already
//! announced an output name, so the declared path is only a hint.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ResolveError;

/// Probe order when the declared path is missing. Video containers first.
pub const CANDIDATE_EXTENSIONS: [&str; 4] = ["webm", "mp4", "m4a", "mp3"];

/// Return `declared` if it exists, else the first `<stem>.<ext>` sibling that does.
pub async fn resolve_output(declared: &Path) -> Result<PathBuf, ResolveError> {
    if is_file(declared).await {
        return Ok(declared.to_path_buf());
    }

    for ext in CANDIDATE_EXTENSIONS {
        let candidate = declared.with_extension(ext);
        if is_file(&candidate).await {
            debug!(
                declared = %declared.display(),
                resolved = %candidate.display(),
                "declared output missing, using sibling"
            );
            return Ok(candidate);
        }
    }

    Err(ResolveError::NotFound {
        declared: declared.to_path_buf(),
    })
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
