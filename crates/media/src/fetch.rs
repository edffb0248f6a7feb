//! Fetch engine boundary and its `yt-dlp` implementation.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use {
    async_trait::async_trait,
    serde::Deserialize,
    tracing::{debug, info},
};

use {mediagrab_common::MediaMode, mediagrab_config::FetchConfig};

use crate::error::FetchError;

const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]";
const AUDIO_FORMAT: &str = "bestaudio/best";
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// What the engine reports after a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Where the engine said it would write. May be stale, see `resolve`.
    pub declared_path: PathBuf,
    /// Raw title as reported, not yet sanitized.
    pub title: String,
    pub duration_seconds: u32,
}

/// Downloads one URL into a caller-owned directory.
///
/// Implementations write only under `work_dir` and never retry.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        mode: MediaMode,
        work_dir: &Path,
    ) -> Result<FetchResult, FetchError>;
}

/// Runs the `yt-dlp` executable once per fetch.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    config: FetchConfig,
}

impl YtDlpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    fn cookies_file(&self) -> Option<&Path> {
        self.config
            .cookies_file
            .as_deref()
            .filter(|p| p.is_file())
    }

    fn build_args(&self, url: &str, mode: MediaMode, work_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--dump-json".into(),
            "--no-simulate".into(),
            "--no-playlist".into(),
            "--playlist-items".into(),
            "1".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
            "--restrict-filenames".into(),
            "-o".into(),
            work_dir.join(OUTPUT_TEMPLATE).into_os_string(),
            "--add-header".into(),
            format!("User-Agent:{}", self.config.user_agent).into(),
            "--add-header".into(),
            format!("Accept-Language:{}", self.config.accept_language).into(),
        ];

        if let Some(cookies) = self.cookies_file() {
            args.push("--cookies".into());
            args.push(cookies.as_os_str().to_owned());
        }

        match mode {
            MediaMode::Video => {
                args.push("-f".into());
                args.push(VIDEO_FORMAT.into());
            },
            MediaMode::Audio => {
                args.push("-f".into());
                args.push(AUDIO_FORMAT.into());
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push("mp3".into());
                args.push("--audio-quality".into());
                args.push(self.config.audio_quality.clone().into());
            },
        }

        args.push("--".into());
        args.push(url.into());
        args
    }
}

#[async_trait]
impl FetchEngine for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        mode: MediaMode,
        work_dir: &Path,
    ) -> Result<FetchResult, FetchError> {
        if is_playlist_link(url) {
            debug!(url, "refusing playlist link");
            return Err(FetchError::unsupported("playlists are not supported"));
        }

        let args = self.build_args(url, mode, work_dir);
        debug!(binary = %self.config.binary, url, %mode, "running fetch engine");

        let output = tokio::process::Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                FetchError::unknown(format!("failed to run {}: {e}", self.config.binary))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(classify_failure(&stderr, &output.status.to_string()));
        }

        let result = parse_info(&stdout, &stderr, work_dir)?;
        info!(
            url,
            %mode,
            title = %result.title,
            duration = result.duration_seconds,
            "fetch finished"
        );
        Ok(result)
    }
}

/// A link naming a playlist with no single video picked out of it.
///
/// `watch?v=..&list=..` names a video and is fetched alone (`--no-playlist`).
fn is_playlist_link(url: &str) -> bool {
    let url = url.trim().to_ascii_lowercase();
    let url = url.split('#').next().unwrap_or_default();
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = path.trim_end_matches('/');

    let mut names_list = false;
    let mut names_video = false;
    for key in query.split('&').filter_map(|pair| pair.split('=').next()) {
        match key {
            "list" => names_list = true,
            "v" => names_video = true,
            _ => {},
        }
    }

    path.ends_with("/playlist") || (names_list && !names_video && path.ends_with("/watch"))
}

/// Subset of the info JSON printed by `--dump-json`.
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    #[serde(rename = "_filename")]
    prepared_filename: Option<String>,
    filename: Option<String>,
}

fn parse_info(stdout: &str, stderr: &str, work_dir: &Path) -> Result<FetchResult, FetchError> {
    let mut entries = stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'));

    let Some(first) = entries.next() else {
        return Err(classify_failure(stderr, "no metadata on stdout"));
    };
    if entries.next().is_some() {
        return Err(FetchError::unsupported("link resolves to several entries"));
    }

    let info: InfoJson = serde_json::from_str(first)
        .map_err(|e| FetchError::unknown(format!("unreadable metadata: {e}")))?;

    if info.kind.as_deref() == Some("playlist") {
        return Err(FetchError::unsupported("playlists are not supported"));
    }

    let filename = info
        .prepared_filename
        .or(info.filename)
        .ok_or_else(|| FetchError::unknown("metadata has no output filename"))?;
    let filename = PathBuf::from(filename);
    let declared_path = if filename.is_absolute() {
        filename
    } else {
        work_dir.join(filename)
    };

    Ok(FetchResult {
        declared_path,
        title: info.title.unwrap_or_default(),
        duration_seconds: duration_secs(info.duration),
    })
}

fn duration_secs(raw: Option<f64>) -> u32 {
    match raw {
        Some(d) if d.is_finite() && d > 0.0 => d.round().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

/// Map engine stderr to an error kind. `fallback` is used when stderr is empty.
fn classify_failure(stderr: &str, fallback: &str) -> FetchError {
    let last_error = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().map(str::trim).rfind(|l| !l.is_empty()));

    let Some(line) = last_error else {
        return FetchError::unknown(format!("fetch engine failed: {fallback}"));
    };

    let lower = line.to_ascii_lowercase();
    if lower.contains("playlist") || lower.contains("unsupported url") {
        FetchError::unsupported(line)
    } else if line.starts_with("ERROR:") {
        FetchError::network(line)
    } else {
        FetchError::unknown(line)
    }
}
