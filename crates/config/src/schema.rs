/// Config schema types (telegram, fetch engine, transcoder).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Files above this size are re-encoded before delivery (Telegram's bot upload cap).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediagrabConfig {
    pub telegram: TelegramConfig,
    pub fetch: FetchConfig,
    pub transcode: TranscodeConfig,
    pub session: SessionConfig,
}

/// Telegram bot account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,

    /// How many times a rate-limited request is retried before giving up.
    pub retry_after_max_retries: usize,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("retry_after_max_retries", &self.retry_after_max_retries)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            retry_after_max_retries: 4,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Settings for the `yt-dlp` fetch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Program name or absolute path.
    pub binary: String,
    /// Netscape cookie jar passed to the engine when the file exists.
    pub cookies_file: Option<PathBuf>,
    pub user_agent: String,
    pub accept_language: String,
    /// `--audio-quality` value used when extracting MP3 audio.
    pub audio_quality: String,
    /// Upper bound for one fetch, 0 disables it.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".into(),
            cookies_file: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".into(),
            accept_language: "en-US,en;q=0.9".into(),
            audio_quality: "192K".into(),
            timeout_secs: 0,
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Settings for the `ffmpeg` size guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub binary: String,
    /// Artifacts strictly larger than this are re-encoded.
    pub max_size_bytes: u64,
    /// Upper bound for one transcode, 0 disables it.
    pub timeout_secs: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".into(),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            timeout_secs: 0,
        }
    }
}

impl TranscodeConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A new link replaces one still waiting for a choice instead of being refused.
    pub replace_pending: bool,
}
