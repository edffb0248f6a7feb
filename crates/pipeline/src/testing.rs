//! In-memory stand-ins for the process and platform boundaries.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    mediagrab_common::{MediaMode, SessionId},
    mediagrab_media::{FetchEngine, FetchError, FetchResult, TranscodeError, Transcoder},
    tokio::sync::Notify,
};

use crate::sink::{ChoiceOption, MediaPayload, MessageHandle, MessagingSink, SinkError};

pub const MIB: u64 = 1024 * 1024;

enum Behaviour {
    Write {
        declared_ext: &'static str,
        actual_ext: Option<&'static str>,
        size: u64,
    },
    Fail(FetchError),
    Hang,
    Panic,
}

pub struct FakeFetcher {
    behaviour: Behaviour,
    title: String,
    duration: u32,
    seen: Mutex<Option<PathBuf>>,
    gate: Option<Arc<Notify>>,
}

impl FakeFetcher {
    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            title: "title".into(),
            duration: 60,
            seen: Mutex::new(None),
            gate: None,
        }
    }

    /// Declares `title.<declared_ext>` and writes a sparse `title.<actual_ext>`.
    pub fn writes(declared_ext: &'static str, actual_ext: &'static str, size: u64) -> Self {
        Self::with(Behaviour::Write {
            declared_ext,
            actual_ext: Some(actual_ext),
            size,
        })
    }

    /// Declares a file but writes nothing.
    pub fn declares_only(declared_ext: &'static str) -> Self {
        Self::with(Behaviour::Write {
            declared_ext,
            actual_ext: None,
            size: 0,
        })
    }

    pub fn failing(error: FetchError) -> Self {
        Self::with(Behaviour::Fail(error))
    }

    pub fn hanging() -> Self {
        Self::with(Behaviour::Hang)
    }

    pub fn panicking() -> Self {
        Self::with(Behaviour::Panic)
    }

    pub fn titled(mut self, title: &str, duration: u32) -> Self {
        self.title = title.into();
        self.duration = duration;
        self
    }

    /// Every fetch waits for one notification on [`FakeFetcher::gate`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn gate(&self) -> Arc<Notify> {
        Arc::clone(self.gate.as_ref().expect("fetcher is not gated"))
    }

    pub fn seen_work_dir(&self) -> Option<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchEngine for FakeFetcher {
    async fn fetch(
        &self,
        _url: &str,
        _mode: MediaMode,
        work_dir: &Path,
    ) -> Result<FetchResult, FetchError> {
        *self.seen.lock().unwrap() = Some(work_dir.to_path_buf());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.behaviour {
            Behaviour::Write {
                declared_ext,
                actual_ext,
                size,
            } => {
                if let Some(ext) = actual_ext {
                    let file = std::fs::File::create(work_dir.join(format!("title.{ext}"))).unwrap();
                    file.set_len(*size).unwrap();
                }
                Ok(FetchResult {
                    declared_path: work_dir.join(format!("title.{declared_ext}")),
                    title: self.title.clone(),
                    duration_seconds: self.duration,
                })
            },
            Behaviour::Fail(e) => Err(e.clone()),
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Panic => panic!("extractor blew up"),
        }
    }
}

/// Writes `compressed.<ext>` containing `small`, or fails.
#[derive(Default)]
pub struct FakeTranscoder {
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeTranscoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
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
        if self.fail {
            return Err(TranscodeError::Spawn {
                binary: "ffmpeg".into(),
                source: std::io::Error::other("not installed"),
            });
        }
        let out = work_dir.join(format!("compressed.{}", mode.delivery_extension()));
        std::fs::write(&out, b"small").unwrap();
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Text {
        session_id: SessionId,
        text: String,
    },
    Status {
        handle: MessageHandle,
        text: String,
    },
    Edited {
        handle: MessageHandle,
        text: String,
    },
    Deleted {
        handle: MessageHandle,
    },
    Video(MediaPayload),
    Audio(MediaPayload),
    Choice {
        handle: MessageHandle,
        text: String,
        options: Vec<ChoiceOption>,
    },
}

/// Records every call in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    next_id: AtomicUsize,
    fail_media: AtomicBool,
    fail_choice: AtomicBool,
}

impl RecordingSink {
    pub fn fail_media(&self) {
        self.fail_media.store(true, Ordering::SeqCst);
    }

    pub fn fail_choice(&self) {
        self.fail_choice.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn videos(&self) -> Vec<MediaPayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Video(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn audio(&self) -> Vec<MediaPayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Audio(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn handle(&self, session_id: &SessionId) -> MessageHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        MessageHandle {
            session_id: session_id.clone(),
            message_id: id.to_string(),
        }
    }
}

#[async_trait]
impl MessagingSink for RecordingSink {
    async fn send_text(&self, session_id: &SessionId, text: &str) -> Result<(), SinkError> {
        self.push(SinkEvent::Text {
            session_id: session_id.clone(),
            text: text.into(),
        });
        Ok(())
    }

    async fn send_status(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<MessageHandle, SinkError> {
        let handle = self.handle(session_id);
        self.push(SinkEvent::Status {
            handle: handle.clone(),
            text: text.into(),
        });
        Ok(handle)
    }

    async fn edit_status(&self, handle: &MessageHandle, text: &str) -> Result<(), SinkError> {
        self.push(SinkEvent::Edited {
            handle: handle.clone(),
            text: text.into(),
        });
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), SinkError> {
        self.push(SinkEvent::Deleted {
            handle: handle.clone(),
        });
        Ok(())
    }

    async fn send_video(
        &self,
        _session_id: &SessionId,
        payload: MediaPayload,
    ) -> Result<(), SinkError> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(SinkError::message("Request Entity Too Large"));
        }
        self.push(SinkEvent::Video(payload));
        Ok(())
    }

    async fn send_audio(
        &self,
        _session_id: &SessionId,
        payload: MediaPayload,
    ) -> Result<(), SinkError> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(SinkError::message("Request Entity Too Large"));
        }
        self.push(SinkEvent::Audio(payload));
        Ok(())
    }

    async fn present_choice(
        &self,
        session_id: &SessionId,
        text: &str,
        options: &[ChoiceOption],
    ) -> Result<MessageHandle, SinkError> {
        if self.fail_choice.load(Ordering::SeqCst) {
            return Err(SinkError::message("chat not found"));
        }
        let handle = self.handle(session_id);
        self.push(SinkEvent::Choice {
            handle: handle.clone(),
            text: text.into(),
            options: options.to_vec(),
        });
        Ok(handle)
    }
}
