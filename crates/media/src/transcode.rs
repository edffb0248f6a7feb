//! Transcoder boundary, its `ffmpeg` implementation, and the size guard that
//! decides when to use it.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use mediagrab_common::MediaMode;

use crate::{artifact::MediaArtifact, error::TranscodeError};

/// Re-encodes a file into a smaller one inside `work_dir`.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        mode: MediaMode,
        work_dir: &Path,
    ) -> Result<PathBuf, TranscodeError>;
}

/// Runs the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

fn output_path(mode: MediaMode, work_dir: &Path) -> PathBuf {
    work_dir.join(format!("compressed.{}", mode.delivery_extension()))
}

fn ffmpeg_args(input: &Path, output: &Path, mode: MediaMode) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
    ];
    let encode: &[&str] = match mode {
        // 640px wide, even height, constrained quality, bounded audio.
        MediaMode::Video => &[
            "-vf",
            "scale=640:-2",
            "-c:v",
            "libx264",
            "-crf",
            "28",
            "-preset",
            "fast",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
        ],
        MediaMode::Audio => &["-b:a", "128k", "-ac", "2"],
    };
    args.extend(encode.iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        mode: MediaMode,
        work_dir: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        let output = output_path(mode, work_dir);
        let args = ffmpeg_args(input, &output, mode);
        debug!(binary = %self.binary, input = %input.display(), %mode, "running transcoder");

        let result = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr)
                .lines()
                .map(str::trim)
                .rfind(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string();
            return Err(TranscodeError::Failed {
                status: result.status,
                stderr,
            });
        }

        Ok(output)
    }
}

/// Outcome of [`SizeGuard::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// At or under the limit, delivered as fetched.
    PassedThrough,
    /// Over the limit and replaced by a transcoded copy.
    Transcoded,
    /// Over the limit, transcoding failed; the original is delivered anyway.
    FellBack { reason: String },
}

/// Keeps artifacts under the delivery limit when it can.
///
/// Transcoding is best effort: a failure never fails the request.
pub struct SizeGuard {
    transcoder: Arc<dyn Transcoder>,
    max_size_bytes: u64,
    timeout: Option<Duration>,
}

impl SizeGuard {
    pub fn new(transcoder: Arc<dyn Transcoder>, max_size_bytes: u64) -> Self {
        Self {
            transcoder,
            max_size_bytes,
            timeout: None,
        }
    }

    /// Bound each transcode call. The process is killed when it expires.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Return the artifact to deliver and what was decided.
    pub async fn apply(
        &self,
        artifact: MediaArtifact,
        work_dir: &Path,
    ) -> (MediaArtifact, GuardDecision) {
        if artifact.size_bytes <= self.max_size_bytes {
            return (artifact, GuardDecision::PassedThrough);
        }

        info!(
            path = %artifact.path.display(),
            size = artifact.size_bytes,
            limit = self.max_size_bytes,
            mode = %artifact.mode,
            "artifact over size limit, transcoding"
        );

        match self.shrink(&artifact, work_dir).await {
            Ok((path, size)) => {
                info!(
                    original = artifact.size_bytes,
                    transcoded = size,
                    "transcode finished"
                );
                (artifact.replaced_by(path, size), GuardDecision::Transcoded)
            },
            Err(e) => {
                warn!(
                    path = %artifact.path.display(),
                    error = %e,
                    "transcode failed, delivering original"
                );
                (artifact, GuardDecision::FellBack {
                    reason: e.to_string(),
                })
            },
        }
    }

    async fn shrink(
        &self,
        artifact: &MediaArtifact,
        work_dir: &Path,
    ) -> Result<(PathBuf, u64), TranscodeError> {
        let call = self
            .transcoder
            .transcode(&artifact.path, artifact.mode, work_dir);
        let path = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TranscodeError::TimedOut {
                    secs: limit.as_secs(),
                })??,
            None => call.await?,
        };
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|source| TranscodeError::MissingOutput {
                path: path.clone(),
                source,
            })?
            .len();
        Ok((path, size))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    const MIB: u64 = 1024 * 1024;

    /// Writes `output_len` bytes to the real output path, or fails.
    struct FakeTranscoder {
        calls: AtomicUsize,
        output_len: Option<usize>,
        delay: Duration,
    }

    impl FakeTranscoder {
        fn ok(output_len: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                output_len: Some(output_len),
                delay: Duration::ZERO,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                output_len: None,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            _input: &Path,
            mode: MediaMode,
            work_dir: &Path,
        ) -> Result<PathBuf, TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.output_len {
                Some(len) => {
                    let out = output_path(mode, work_dir);
                    tokio::fs::write(&out, vec![0u8; len]).await.unwrap();
                    Ok(out)
                },
                None => Err(TranscodeError::TimedOut { secs: 0 }),
            }
        }
    }

    fn artifact(path: PathBuf, size_bytes: u64, mode: MediaMode) -> MediaArtifact {
        MediaArtifact {
            path,
            title: "clip".into(),
            duration_seconds: 10,
            size_bytes,
            mode,
        }
    }

    #[tokio::test]
    async fn under_limit_passes_through_without_transcoding() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTranscoder::ok(10));
        let guard = SizeGuard::new(fake.clone(), 50 * MIB);
        let input = artifact(dir.path().join("clip.mp4"), 40 * MIB, MediaMode::Video);

        let (out, decision) = guard.apply(input.clone(), dir.path()).await;
        assert_eq!(decision, GuardDecision::PassedThrough);
        assert_eq!(out, input);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exactly_at_limit_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTranscoder::ok(10));
        let guard = SizeGuard::new(fake.clone(), 50 * MIB);
        let input = artifact(dir.path().join("a.mp3"), 50 * MIB, MediaMode::Audio);

        let (_, decision) = guard.apply(input, dir.path()).await;
        assert_eq!(decision, GuardDecision::PassedThrough);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn over_limit_is_replaced_by_transcoded_file() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTranscoder::ok(1234));
        let guard = SizeGuard::new(fake.clone(), 50 * MIB);
        let input = artifact(dir.path().join("clip.webm"), 60 * MIB, MediaMode::Video);

        let (out, decision) = guard.apply(input, dir.path()).await;
        assert_eq!(decision, GuardDecision::Transcoded);
        assert_eq!(out.path, dir.path().join("compressed.mp4"));
        assert_eq!(out.size_bytes, 1234);
        assert_eq!(out.title, "clip");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_transcode_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTranscoder::failing());
        let guard = SizeGuard::new(fake.clone(), 50 * MIB);
        let input = artifact(dir.path().join("clip.webm"), 60 * MIB, MediaMode::Video);

        let (out, decision) = guard.apply(input.clone(), dir.path()).await;
        assert!(matches!(decision, GuardDecision::FellBack { .. }));
        assert_eq!(out, input);
        assert_eq!(out.size_bytes, 60 * MIB);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTranscoder {
            delay: Duration::from_secs(3600),
            ..FakeTranscoder::ok(10)
        });
        let guard = SizeGuard::new(fake, MIB).with_timeout(Some(Duration::from_secs(5)));
        let input = artifact(dir.path().join("a.m4a"), 2 * MIB, MediaMode::Audio);

        let (out, decision) = guard.apply(input.clone(), dir.path()).await;
        assert_eq!(out, input);
        match decision {
            GuardDecision::FellBack { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn video_args_scale_and_cap_audio() {
        let args: Vec<String> = ffmpeg_args(
            Path::new("/w/in.webm"),
            Path::new("/w/compressed.mp4"),
            MediaMode::Video,
        )
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-i /w/in.webm"));
        assert!(joined.contains("-vf scale=640:-2"));
        assert!(joined.contains("-c:v libx264 -crf 28 -preset fast"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert_eq!(args.last().unwrap(), "/w/compressed.mp4");
    }

    #[test]
    fn audio_args_downmix_to_stereo() {
        let args: Vec<String> = ffmpeg_args(
            Path::new("/w/in.mp3"),
            Path::new("/w/compressed.mp3"),
            MediaMode::Audio,
        )
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-b:a 128k -ac 2"));
        assert!(!joined.contains("scale"));
    }

    #[test]
    fn output_names_follow_mode() {
        assert_eq!(
            output_path(MediaMode::Video, Path::new("/w")),
            PathBuf::from("/w/compressed.mp4")
        );
        assert_eq!(
            output_path(MediaMode::Audio, Path::new("/w")),
            PathBuf::from("/w/compressed.mp3")
        );
    }
}
