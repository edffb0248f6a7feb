use {
    async_trait::async_trait,
    std::{future::Future, time::Duration},
    teloxide::{
        ApiError, RequestError,
        payloads::{SendAudioSetters, SendMessageSetters, SendVideoSetters},
        prelude::*,
        types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId},
    },
    tracing::{debug, info, warn},
};

use {
    mediagrab_common::SessionId,
    mediagrab_pipeline::{ChoiceOption, MediaPayload, MessageHandle, MessagingSink, SinkError},
};

pub const DEFAULT_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Delivers pipeline output through the Bot API.
///
/// Sessions are Telegram chats: the session id is the decimal chat id.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    max_retries: usize,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            max_retries: DEFAULT_RETRY_AFTER_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        chat_id: ChatId,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= self.max_retries {
                        warn!(
                            chat_id = chat_id.0,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        max_retries = self.max_retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

/// Session id for a Telegram chat.
pub fn session_for_chat(chat_id: ChatId) -> SessionId {
    SessionId::from(chat_id.0)
}

fn chat_for_session(session_id: &SessionId) -> Result<ChatId, SinkError> {
    session_id
        .as_str()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| SinkError::message(format!("not a telegram chat id: {session_id}")))
}

fn message_for_handle(handle: &MessageHandle) -> Result<(ChatId, MessageId), SinkError> {
    let chat_id = chat_for_session(&handle.session_id)?;
    let message_id = handle
        .message_id
        .parse::<i32>()
        .map(MessageId)
        .map_err(|_| {
            SinkError::message(format!("not a telegram message id: {}", handle.message_id))
        })?;
    Ok((chat_id, message_id))
}

/// Handle for a message sent to `chat_id`.
pub fn handle_for(chat_id: ChatId, message_id: MessageId) -> MessageHandle {
    MessageHandle {
        session_id: session_for_chat(chat_id),
        message_id: message_id.0.to_string(),
    }
}

/// One row of callback buttons.
pub fn choice_keyboard(options: &[ChoiceOption]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        options
            .iter()
            .map(|o| InlineKeyboardButton::callback(o.label, o.data))
            .collect::<Vec<_>>(),
    ])
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn is_message_not_modified_error(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

fn api_error(operation: &str, error: RequestError) -> SinkError {
    SinkError::external(format!("telegram {operation}"), error)
}

#[async_trait]
impl MessagingSink for TelegramSink {
    async fn send_text(&self, session_id: &SessionId, text: &str) -> Result<(), SinkError> {
        let chat_id = chat_for_session(session_id)?;
        self.run_with_retry(chat_id, "sendMessage", || {
            let req = self.bot.send_message(chat_id, text);
            async move { req.await }
        })
        .await
        .map_err(|e| api_error("sendMessage", e))?;
        Ok(())
    }

    async fn send_status(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<MessageHandle, SinkError> {
        let chat_id = chat_for_session(session_id)?;
        let sent = self
            .run_with_retry(chat_id, "sendMessage", || {
                let req = self.bot.send_message(chat_id, text);
                async move { req.await }
            })
            .await
            .map_err(|e| api_error("sendMessage", e))?;
        Ok(handle_for(chat_id, sent.id))
    }

    async fn edit_status(&self, handle: &MessageHandle, text: &str) -> Result<(), SinkError> {
        let (chat_id, message_id) = message_for_handle(handle)?;
        let result = self
            .run_with_retry(chat_id, "editMessageText", || {
                let req = self.bot.edit_message_text(chat_id, message_id, text);
                async move { req.await }
            })
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified_error(&e) => {
                debug!(chat_id = chat_id.0, "status already shows this text");
                Ok(())
            },
            Err(e) => Err(api_error("editMessageText", e)),
        }
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), SinkError> {
        let (chat_id, message_id) = message_for_handle(handle)?;
        self.run_with_retry(chat_id, "deleteMessage", || {
            let req = self.bot.delete_message(chat_id, message_id);
            async move { req.await }
        })
        .await
        .map_err(|e| api_error("deleteMessage", e))?;
        Ok(())
    }

    async fn send_video(
        &self,
        session_id: &SessionId,
        payload: MediaPayload,
    ) -> Result<(), SinkError> {
        let chat_id = chat_for_session(session_id)?;
        let size = payload.bytes.len();
        self.run_with_retry(chat_id, "sendVideo", || {
            let input =
                InputFile::memory(payload.bytes.clone()).file_name(payload.file_name.clone());
            let req = self
                .bot
                .send_video(chat_id, input)
                .duration(payload.duration_seconds)
                .supports_streaming(true);
            async move { req.await }
        })
        .await
        .map_err(|e| api_error("sendVideo", e))?;
        info!(
            chat_id = chat_id.0,
            file_name = %payload.file_name,
            size,
            "telegram video sent"
        );
        Ok(())
    }

    async fn send_audio(
        &self,
        session_id: &SessionId,
        payload: MediaPayload,
    ) -> Result<(), SinkError> {
        let chat_id = chat_for_session(session_id)?;
        let size = payload.bytes.len();
        self.run_with_retry(chat_id, "sendAudio", || {
            let input =
                InputFile::memory(payload.bytes.clone()).file_name(payload.file_name.clone());
            let req = self
                .bot
                .send_audio(chat_id, input)
                .duration(payload.duration_seconds)
                .title(payload.title.clone());
            async move { req.await }
        })
        .await
        .map_err(|e| api_error("sendAudio", e))?;
        info!(
            chat_id = chat_id.0,
            file_name = %payload.file_name,
            size,
            "telegram audio sent"
        );
        Ok(())
    }

    async fn present_choice(
        &self,
        session_id: &SessionId,
        text: &str,
        options: &[ChoiceOption],
    ) -> Result<MessageHandle, SinkError> {
        let chat_id = chat_for_session(session_id)?;
        let keyboard = choice_keyboard(options);
        let sent = self
            .run_with_retry(chat_id, "sendMessage", || {
                let req = self
                    .bot
                    .send_message(chat_id, text)
                    .reply_markup(keyboard.clone());
                async move { req.await }
            })
            .await
            .map_err(|e| api_error("sendMessage", e))?;
        Ok(handle_for(chat_id, sent.id))
    }
}
