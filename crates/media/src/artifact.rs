use std::path::{Path, PathBuf};

use mediagrab_common::MediaMode;

use crate::error::{Context, Result};

/// Longest title (in characters) used for the delivered filename.
pub const MAX_TITLE_CHARS: usize = 50;

const DEFAULT_TITLE: &str = "media";

/// A media file ready for delivery plus the metadata shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub title: String,
    pub duration_seconds: u32,
    pub size_bytes: u64,
    pub mode: MediaMode,
}

impl MediaArtifact {
    /// Name of the file as the user receives it.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.title, self.mode.delivery_extension())
    }

    /// Point the artifact at a replacement file (e.g. a transcoded copy).
    #[must_use]
    pub fn replaced_by(self, path: PathBuf, size_bytes: u64) -> Self {
        Self {
            path,
            size_bytes,
            ..self
        }
    }

    /// Read the whole file into memory for upload.
    pub async fn read_payload(&self) -> Result<Vec<u8>> {
        read_file(&self.path).await
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Title suitable for a filename: defaulted, path separators replaced,
/// control characters dropped, cut to [`MAX_TITLE_CHARS`].
pub fn sanitize_title(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' => '_',
            other => other,
        })
        .take(MAX_TITLE_CHARS)
        .collect();
    let cleaned = cleaned.trim_end().to_string();
    if cleaned.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        cleaned
    }
}
