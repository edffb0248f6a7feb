//! Outbound boundary to the chat platform.

use {async_trait::async_trait, mediagrab_common::SessionId};

/// Failure reported by a [`MessagingSink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{message}")]
    Message { message: String },
}

impl SinkError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Reference to a message previously sent by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub session_id: SessionId,
    /// Platform message id, opaque to the core.
    pub message_id: String,
}

/// A button on the output-form keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: &'static str,
    /// Sent back verbatim when the button is pressed.
    pub data: &'static str,
}

/// A finished file handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub title: String,
    pub duration_seconds: u32,
}

/// Everything the core needs from the chat transport.
///
/// `present_choice` only renders the options; the pressed option comes back
/// later as an inbound event.
#[async_trait]
pub trait MessagingSink: Send + Sync {
    async fn send_text(&self, session_id: &SessionId, text: &str) -> Result<(), SinkError>;

    async fn send_status(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<MessageHandle, SinkError>;

    async fn edit_status(&self, handle: &MessageHandle, text: &str) -> Result<(), SinkError>;

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), SinkError>;

    async fn send_video(
        &self,
        session_id: &SessionId,
        payload: MediaPayload,
    ) -> Result<(), SinkError>;

    async fn send_audio(
        &self,
        session_id: &SessionId,
        payload: MediaPayload,
    ) -> Result<(), SinkError>;

    async fn present_choice(
        &self,
        session_id: &SessionId,
        text: &str,
        options: &[ChoiceOption],
    ) -> Result<MessageHandle, SinkError>;
}
