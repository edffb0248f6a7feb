//! One download from confirmed request to delivered file.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    mediagrab_common::MediaMode,
    mediagrab_config::MediagrabConfig,
    mediagrab_media::{
        FetchEngine, FetchError, FetchResult, FfmpegTranscoder, MediaArtifact, ResolveError,
        SizeGuard, WorkDir, YtDlpFetcher, resolve_output, sanitize_title,
    },
    mediagrab_sessions::{MediaRequest, SessionStore},
    tracing::{debug, error, info, warn},
};

use crate::{
    messages,
    outcome::{Delivery, PipelineOutcome},
    sink::{MediaPayload, MessageHandle, MessagingSink},
};

/// The status message of a run, readable from outside the run.
///
/// The run keeps it pointing at whatever message currently shows progress and
/// empties it once the final report is done. Whoever supervises the run can
/// take what is left after a panic and report on it.
#[derive(Debug, Clone, Default)]
pub struct StatusSlot(Arc<Mutex<Option<MessageHandle>>>);

impl StatusSlot {
    pub fn new(handle: Option<MessageHandle>) -> Self {
        Self(Arc::new(Mutex::new(handle)))
    }

    pub fn take(&self) -> Option<MessageHandle> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn get(&self) -> Option<MessageHandle> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, handle: Option<MessageHandle>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }
}

/// Runs confirmed requests.
///
/// Whatever happens inside a run, its scratch directory is removed and the
/// request's session slot is released by the time [`Pipeline::run`] returns.
/// The same holds if a step panics, through the drop guards. A link the user
/// sends while the run is in flight stays pending.
pub struct Pipeline {
    sessions: Arc<SessionStore>,
    fetcher: Arc<dyn FetchEngine>,
    size_guard: SizeGuard,
    sink: Arc<dyn MessagingSink>,
    fetch_timeout: Option<Duration>,
    work_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        sessions: Arc<SessionStore>,
        fetcher: Arc<dyn FetchEngine>,
        size_guard: SizeGuard,
        sink: Arc<dyn MessagingSink>,
    ) -> Self {
        Self {
            sessions,
            fetcher,
            size_guard,
            sink,
            fetch_timeout: None,
            work_root: None,
        }
    }

    /// Wire the real yt-dlp and ffmpeg adapters from configuration.
    pub fn from_config(
        config: &MediagrabConfig,
        sessions: Arc<SessionStore>,
        sink: Arc<dyn MessagingSink>,
    ) -> Self {
        let fetcher = Arc::new(YtDlpFetcher::new(config.fetch.clone()));
        let transcoder = Arc::new(FfmpegTranscoder::new(config.transcode.binary.clone()));
        let size_guard = SizeGuard::new(transcoder, config.transcode.max_size_bytes)
            .with_timeout(config.transcode.timeout());
        Self::new(sessions, fetcher, size_guard, sink).with_fetch_timeout(config.fetch.timeout())
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_work_root(mut self, root: PathBuf) -> Self {
        self.work_root = Some(root);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Execute one request. `status` is an existing message to reuse for
    /// progress, usually the choice prompt the user just answered.
    pub async fn run(&self, request: MediaRequest, status: Option<MessageHandle>) -> PipelineOutcome {
        self.run_tracked(request, &StatusSlot::new(status)).await
    }

    /// Like [`Pipeline::run`], reading the initial status from `slot` and
    /// publishing the live one there until the run has reported.
    pub async fn run_tracked(&self, request: MediaRequest, slot: &StatusSlot) -> PipelineOutcome {
        let status = slot.get();
        let _session = self.sessions.guard(&request);

        info!(
            session_id = %request.session_id(),
            url = request.url(),
            mode = %request.mode(),
            "pipeline started"
        );

        let work_dir = match self.create_work_dir() {
            Ok(dir) => dir,
            Err(e) => {
                error!(session_id = %request.session_id(), stage = "workdir", error = %e, "cannot create work dir");
                let outcome = PipelineOutcome::FetchFailed(FetchError::unknown(e.to_string()));
                self.report(&request, status, &outcome).await;
                slot.set(None);
                return outcome;
            },
        };

        let status = self.announce(&request, status).await;
        slot.set(status.clone());
        let outcome = self.execute(&request, &work_dir).await;
        self.report(&request, status, &outcome).await;
        slot.set(None);

        if let Err(e) = work_dir.close() {
            warn!(session_id = %request.session_id(), error = %e, "failed to remove work dir");
        }

        info!(
            session_id = %request.session_id(),
            outcome = outcome.label(),
            "pipeline finished"
        );
        outcome
    }

    fn create_work_dir(&self) -> mediagrab_media::Result<WorkDir> {
        match &self.work_root {
            Some(root) => WorkDir::create_in(root),
            None => WorkDir::create(),
        }
    }

    async fn execute(&self, request: &MediaRequest, work_dir: &WorkDir) -> PipelineOutcome {
        let session_id = request.session_id();

        let fetched = match self.fetch(request, work_dir).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(session_id = %session_id, stage = "fetch", kind = %e.kind, error = %e.message, "fetch failed");
                return PipelineOutcome::FetchFailed(e);
            },
        };

        let artifact = match self.locate(&fetched, request.mode()).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(session_id = %session_id, stage = "resolve", error = %e, "fetched file missing");
                return PipelineOutcome::ResolveFailed(e);
            },
        };
        debug!(
            session_id = %session_id,
            path = %artifact.path.display(),
            size = artifact.size_bytes,
            "fetched file resolved"
        );

        let (artifact, guard) = self.size_guard.apply(artifact, work_dir.path()).await;

        let bytes = match artifact.read_payload().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(session_id = %session_id, stage = "read", error = %e, "cannot read artifact");
                return PipelineOutcome::DeliveryFailed(e.to_string());
            },
        };
        let payload = MediaPayload {
            bytes,
            file_name: artifact.file_name(),
            title: artifact.title.clone(),
            duration_seconds: artifact.duration_seconds,
        };

        let sent = match artifact.mode {
            MediaMode::Video => self.sink.send_video(session_id, payload).await,
            MediaMode::Audio => self.sink.send_audio(session_id, payload).await,
        };
        if let Err(e) = sent {
            error!(session_id = %session_id, stage = "deliver", error = %e, "delivery failed");
            return PipelineOutcome::DeliveryFailed(e.to_string());
        }

        PipelineOutcome::Delivered(Delivery {
            file_name: artifact.file_name(),
            size_bytes: artifact.size_bytes,
            duration_seconds: artifact.duration_seconds,
            guard,
        })
    }

    async fn fetch(
        &self,
        request: &MediaRequest,
        work_dir: &WorkDir,
    ) -> Result<FetchResult, FetchError> {
        let call = self
            .fetcher
            .fetch(request.url(), request.mode(), work_dir.path());
        match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(FetchError::network(format!(
                    "fetch timed out after {}s",
                    limit.as_secs()
                )))
            }),
            None => call.await,
        }
    }

    async fn locate(
        &self,
        fetched: &FetchResult,
        mode: MediaMode,
    ) -> Result<MediaArtifact, ResolveError> {
        let path = resolve_output(&fetched.declared_path).await?;
        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ResolveError::NotFound {
                declared: fetched.declared_path.clone(),
            })?
            .len();
        Ok(MediaArtifact {
            path,
            title: sanitize_title(Some(&fetched.title)),
            duration_seconds: fetched.duration_seconds,
            size_bytes,
            mode,
        })
    }

    /// Show the in-progress status, reusing `existing` when possible.
    async fn announce(
        &self,
        request: &MediaRequest,
        existing: Option<MessageHandle>,
    ) -> Option<MessageHandle> {
        if let Some(handle) = existing {
            match self.sink.edit_status(&handle, messages::DOWNLOADING).await {
                Ok(()) => return Some(handle),
                Err(e) => {
                    debug!(session_id = %request.session_id(), error = %e, "cannot reuse prompt for status");
                },
            }
        }
        match self
            .sink
            .send_status(request.session_id(), messages::DOWNLOADING)
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(session_id = %request.session_id(), error = %e, "failed to send status");
                None
            },
        }
    }

    /// Remove the status on success, or turn it into the failure notice.
    async fn report(
        &self,
        request: &MediaRequest,
        status: Option<MessageHandle>,
        outcome: &PipelineOutcome,
    ) {
        let Some(text) = outcome.user_message() else {
            if let Some(handle) = status
                && let Err(e) = self.sink.delete_message(&handle).await
            {
                debug!(session_id = %request.session_id(), error = %e, "failed to delete status");
            }
            return;
        };

        if let Some(handle) = &status {
            match self.sink.edit_status(handle, text).await {
                Ok(()) => return,
                Err(e) => {
                    debug!(session_id = %request.session_id(), error = %e, "failed to edit status");
                },
            }
        }
        if let Err(e) = self.sink.send_text(request.session_id(), text).await {
            warn!(session_id = %request.session_id(), error = %e, "failed to report failure");
        }
    }
}
