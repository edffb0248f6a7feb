//! Transport-independent bot behaviour: what each inbound event does.

use std::sync::{Arc, Mutex};

use {
    mediagrab_common::{MediaMode, SessionId},
    mediagrab_media::is_supported_url,
    mediagrab_sessions::{Error as SessionError, MediaRequest, SessionStore},
    rand::{SeedableRng, rngs::StdRng},
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
};

use crate::{
    messages,
    orchestrator::{Pipeline, StatusSlot},
    outcome::PipelineOutcome,
    replies::pick_reply,
    sink::{MessageHandle, MessagingSink, SinkError},
};

/// Bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Cancel,
}

impl Command {
    /// All commands with their menu descriptions.
    pub const ALL: [(Command, &'static str); 3] = [
        (Command::Start, "Introduction"),
        (Command::Help, "How to use the bot"),
        (Command::Cancel, "Drop the link waiting for a choice"),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Cancel => "cancel",
        }
    }

    /// Parse `/name`, `/name@botname` or `/name args`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// A pressed keyboard button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Mode(MediaMode),
    Cancel,
}

impl Choice {
    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            messages::CALLBACK_VIDEO => Some(Self::Mode(MediaMode::Video)),
            messages::CALLBACK_AUDIO => Some(Self::Mode(MediaMode::Audio)),
            messages::CALLBACK_CANCEL => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// What a text message led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextHandled {
    Command(Command),
    ChoicePresented,
    Rejected,
    Filler,
}

/// What a button press led to.
#[derive(Debug)]
pub enum ChoiceHandled {
    /// A run was spawned. Resolves to `None` if the run panicked.
    Started(JoinHandle<Option<PipelineOutcome>>),
    Cancelled,
    /// Nothing was pending for this session.
    Expired,
}

/// Routes inbound events to the session store and the pipeline.
pub struct MediaBot {
    sessions: Arc<SessionStore>,
    pipeline: Arc<Pipeline>,
    sink: Arc<dyn MessagingSink>,
    rng: Mutex<StdRng>,
}

impl MediaBot {
    pub fn new(pipeline: Arc<Pipeline>, sink: Arc<dyn MessagingSink>) -> Self {
        Self {
            sessions: Arc::clone(pipeline.sessions()),
            pipeline,
            sink,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Use a fixed random source for filler replies.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn handle_text(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<TextHandled, SinkError> {
        if let Some(command) = Command::parse(text) {
            self.handle_command(session_id, command).await?;
            return Ok(TextHandled::Command(command));
        }

        if !is_supported_url(text) {
            let reply = {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                pick_reply(&mut *rng)
            };
            self.sink.send_text(session_id, reply).await?;
            return Ok(TextHandled::Filler);
        }

        let url = text.trim();
        match self.sessions.begin_request(session_id, url) {
            Ok(()) => {},
            Err(SessionError::Rejected { pending_url }) => {
                debug!(session_id = %session_id, pending_url = %pending_url, "link refused, choice pending");
                self.sink
                    .send_text(session_id, messages::PENDING_CHOICE)
                    .await?;
                return Ok(TextHandled::Rejected);
            },
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "unexpected session error");
                return Ok(TextHandled::Rejected);
            },
        }

        info!(session_id = %session_id, url, "link accepted, awaiting choice");
        if let Err(e) = self
            .sink
            .present_choice(session_id, messages::CHOICE_PROMPT, &messages::CHOICE_OPTIONS)
            .await
        {
            // Nobody can answer a prompt that never arrived.
            self.sessions.clear(session_id);
            return Err(e);
        }
        Ok(TextHandled::ChoicePresented)
    }

    async fn handle_command(&self, session_id: &SessionId, command: Command) -> Result<(), SinkError> {
        match command {
            Command::Start => {
                let text = format!("{}\n\n{}", messages::GREETING, messages::USAGE);
                self.sink.send_text(session_id, &text).await
            },
            Command::Help => self.sink.send_text(session_id, messages::USAGE).await,
            Command::Cancel => {
                let text = if self.sessions.clear(session_id) {
                    messages::CANCELLED
                } else {
                    messages::NOTHING_TO_CANCEL
                };
                self.sink.send_text(session_id, text).await
            },
        }
    }

    /// Handle a keyboard press. `prompt` is the message carrying the keyboard.
    pub async fn handle_choice(
        &self,
        session_id: &SessionId,
        choice: Choice,
        prompt: Option<MessageHandle>,
    ) -> Result<ChoiceHandled, SinkError> {
        let mode = match choice {
            Choice::Mode(mode) => mode,
            Choice::Cancel => {
                if !self.sessions.clear(session_id) {
                    return Ok(ChoiceHandled::Expired);
                }
                if let Some(handle) = prompt {
                    self.sink.edit_status(&handle, messages::CANCELLED).await?;
                }
                return Ok(ChoiceHandled::Cancelled);
            },
        };

        let request = match self.sessions.resolve_choice(session_id, mode) {
            Ok(request) => request,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "stale choice");
                return Ok(ChoiceHandled::Expired);
            },
        };

        Ok(ChoiceHandled::Started(self.spawn_run(request, prompt)))
    }

    fn spawn_run(
        &self,
        request: MediaRequest,
        prompt: Option<MessageHandle>,
    ) -> JoinHandle<Option<PipelineOutcome>> {
        let session_id = request.session_id().clone();
        let pipeline = Arc::clone(&self.pipeline);
        let sink = Arc::clone(&self.sink);
        let status = StatusSlot::new(prompt);

        let run = {
            let status = status.clone();
            tokio::spawn(async move { pipeline.run_tracked(request, &status).await })
        };
        tokio::spawn(async move {
            match run.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "pipeline task aborted");
                    report_aborted(sink.as_ref(), &session_id, status.take()).await;
                    None
                },
            }
        })
    }
}

/// Turn the leftover status of an aborted run into the failure notice, or
/// send the notice on its own when there is no status to edit.
async fn report_aborted(
    sink: &dyn MessagingSink,
    session_id: &SessionId,
    status: Option<MessageHandle>,
) {
    if let Some(handle) = &status {
        match sink.edit_status(handle, messages::DOWNLOAD_FAILED).await {
            Ok(()) => return,
            Err(e) => debug!(session_id = %session_id, error = %e, "failed to edit status"),
        }
    }
    if let Err(e) = sink.send_text(session_id, messages::DOWNLOAD_FAILED).await {
        warn!(session_id = %session_id, error = %e, "failed to report aborted run");
    }
}
