use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Opaque identity of one conversation (a Telegram chat, in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for SessionId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Output form requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    Video,
    Audio,
}

impl MediaMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Extension of the file handed to the user.
    pub fn delivery_extension(self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }
}

impl fmt::Display for MediaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(crate::Error::UnknownMode(other.to_string())),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_callback_data() {
        assert_eq!("video".parse::<MediaMode>().unwrap(), MediaMode::Video);
        assert_eq!("audio".parse::<MediaMode>().unwrap(), MediaMode::Audio);
        assert_eq!(
            "cancel".parse::<MediaMode>(),
            Err(crate::Error::UnknownMode("cancel".into()))
        );
    }

    #[test]
    fn session_id_from_chat_id() {
        assert_eq!(SessionId::from(-100_42).as_str(), "-10042");
    }

    #[test]
    fn mode_serializes_snake_case() {
        let json = serde_json::to_string(&MediaMode::Audio).unwrap();
        assert_eq!(json, "\"audio\"");
    }
}
