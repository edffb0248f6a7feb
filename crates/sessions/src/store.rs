use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::debug;

use mediagrab_common::{MediaMode, SessionId};

use crate::error::{Error, Result};

/// Conversation state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingChoice,
}

/// What to do with a new URL while another one is still waiting for a choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingPolicy {
    /// Keep the first URL and refuse the new one.
    #[default]
    Reject,
    /// Drop the first URL and wait for a choice on the new one.
    Replace,
}

/// A URL paired with the output form the user picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    session_id: SessionId,
    url: String,
    mode: MediaMode,
    generation: u64,
}

impl MediaRequest {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> MediaMode {
        self.mode
    }

    /// Number of the pending slot this request was taken from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A stored URL and the number it was given when stored.
#[derive(Debug)]
struct Pending {
    url: String,
    generation: u64,
}

/// In-memory map of sessions that currently hold a pending URL.
///
/// A session absent from the map is `Idle`. All transitions take the lock
/// once, so check-and-consume is atomic. The lock is a `std::sync::Mutex`
/// because no operation awaits while holding it.
///
/// Every stored URL gets a fresh generation number, so cleanup for one request
/// can tell its own slot apart from a link the user sent afterwards.
#[derive(Debug, Default)]
pub struct SessionStore {
    pending: Mutex<HashMap<SessionId, Pending>>,
    next_generation: AtomicU64,
    policy: PendingPolicy,
}

impl SessionStore {
    pub fn new(policy: PendingPolicy) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Pending>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// `Idle → AwaitingChoice`, storing `url` as the pending request.
    pub fn begin_request(&self, session_id: &SessionId, url: &str) -> Result<()> {
        let mut pending = self.lock();
        match (pending.get_mut(session_id), self.policy) {
            (Some(existing), PendingPolicy::Reject) => Err(Error::Rejected {
                pending_url: existing.url.clone(),
            }),
            (Some(existing), PendingPolicy::Replace) => {
                debug!(%session_id, old = %existing.url, new = url, "replacing pending url");
                *existing = Pending {
                    url: url.to_string(),
                    generation: self.next_generation(),
                };
                Ok(())
            },
            (None, _) => {
                let generation = self.next_generation();
                pending.insert(session_id.clone(), Pending {
                    url: url.to_string(),
                    generation,
                });
                debug!(%session_id, url, generation, "awaiting choice");
                Ok(())
            },
        }
    }

    /// `AwaitingChoice → Idle`, handing the pending URL out as a request.
    ///
    /// Exactly one concurrent caller per session gets the request; the others
    /// see [`Error::NoPendingRequest`].
    pub fn resolve_choice(&self, session_id: &SessionId, mode: MediaMode) -> Result<MediaRequest> {
        let Pending { url, generation } = self
            .lock()
            .remove(session_id)
            .ok_or(Error::NoPendingRequest)?;
        debug!(%session_id, %mode, generation, "choice resolved");
        Ok(MediaRequest {
            session_id: session_id.clone(),
            url,
            mode,
            generation,
        })
    }

    /// Drop whatever is pending for `session_id`. Idempotent.
    ///
    /// Returns `true` if a pending URL was discarded.
    pub fn clear(&self, session_id: &SessionId) -> bool {
        let removed = self.lock().remove(session_id).is_some();
        if removed {
            debug!(%session_id, "session cleared");
        }
        removed
    }

    /// Drop the pending URL only if it is still the one stored as
    /// `generation`. A newer link for the same session is kept.
    ///
    /// Returns `true` if a pending URL was discarded.
    pub fn release(&self, session_id: &SessionId, generation: u64) -> bool {
        let mut pending = self.lock();
        if pending
            .get(session_id)
            .is_none_or(|entry| entry.generation != generation)
        {
            return false;
        }
        pending.remove(session_id);
        debug!(%session_id, generation, "session released");
        true
    }

    pub fn state(&self, session_id: &SessionId) -> SessionState {
        if self.lock().contains_key(session_id) {
            SessionState::AwaitingChoice
        } else {
            SessionState::Idle
        }
    }

    pub fn pending_url(&self, session_id: &SessionId) -> Option<String> {
        self.lock().get(session_id).map(|entry| entry.url.clone())
    }

    /// Number of sessions currently awaiting a choice.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Scope that releases `request`'s slot when dropped, whatever the exit
    /// path. Links sent after `request` was taken are left pending.
    pub fn guard(self: &Arc<Self>, request: &MediaRequest) -> SessionGuard {
        SessionGuard {
            store: Arc::clone(self),
            session_id: request.session_id.clone(),
            generation: request.generation,
        }
    }
}

/// Releases one request's slot on drop.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct SessionGuard {
    store: Arc<SessionStore>,
    session_id: SessionId,
    generation: u64,
}

impl SessionGuard {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.store.release(&self.session_id, self.generation);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        std::{sync::Barrier, thread},
    };

    fn sid(id: &str) -> SessionId {
        SessionId::from(id)
    }

    #[test]
    fn starts_idle() {
        let store = SessionStore::default();
        assert_eq!(store.state(&sid("a")), SessionState::Idle);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn begin_then_resolve_round_trip() {
        let store = SessionStore::default();
        store
            .begin_request(&sid("a"), "https://youtu.be/abc")
            .unwrap();
        assert_eq!(store.state(&sid("a")), SessionState::AwaitingChoice);

        let req = store.resolve_choice(&sid("a"), MediaMode::Audio).unwrap();
        assert_eq!(req.url(), "https://youtu.be/abc");
        assert_eq!(req.mode(), MediaMode::Audio);
        assert_eq!(req.session_id(), &sid("a"));
        assert_eq!(store.state(&sid("a")), SessionState::Idle);
    }

    #[test]
    fn resolve_without_pending_fails() {
        let store = SessionStore::default();
        assert_eq!(
            store.resolve_choice(&sid("a"), MediaMode::Video),
            Err(Error::NoPendingRequest)
        );
    }

    #[test]
    fn second_resolve_fails() {
        let store = SessionStore::default();
        store.begin_request(&sid("a"), "youtu.be/x").unwrap();
        store.resolve_choice(&sid("a"), MediaMode::Video).unwrap();
        assert_eq!(
            store.resolve_choice(&sid("a"), MediaMode::Video),
            Err(Error::NoPendingRequest)
        );
    }

    #[rstest]
    #[case(PendingPolicy::Reject, Err(Error::Rejected { pending_url: "youtu.be/first".into() }), "youtu.be/first")]
    #[case(PendingPolicy::Replace, Ok(()), "youtu.be/second")]
    fn second_url_while_pending(
        #[case] policy: PendingPolicy,
        #[case] expected: Result<()>,
        #[case] kept: &str,
    ) {
        let store = SessionStore::new(policy);
        store.begin_request(&sid("a"), "youtu.be/first").unwrap();
        assert_eq!(store.begin_request(&sid("a"), "youtu.be/second"), expected);
        assert_eq!(store.pending_url(&sid("a")).as_deref(), Some(kept));
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::default();
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        store.begin_request(&sid("b"), "youtu.be/b").unwrap();
        store.clear(&sid("a"));
        assert_eq!(store.state(&sid("a")), SessionState::Idle);
        assert_eq!(store.state(&sid("b")), SessionState::AwaitingChoice);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = SessionStore::default();
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        assert!(store.clear(&sid("a")));
        assert!(!store.clear(&sid("a")));
        assert!(!store.clear(&sid("never-seen")));
    }

    #[test]
    fn each_stored_url_gets_a_new_generation() {
        let store = SessionStore::new(PendingPolicy::Replace);
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        store.begin_request(&sid("a"), "youtu.be/b").unwrap();
        let replaced = store.resolve_choice(&sid("a"), MediaMode::Video).unwrap();
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        let again = store.resolve_choice(&sid("a"), MediaMode::Video).unwrap();

        assert_eq!(replaced.url(), "youtu.be/b");
        assert!(again.generation() > replaced.generation());
    }

    #[test]
    fn release_ignores_newer_link() {
        let store = SessionStore::default();
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        let request = store.resolve_choice(&sid("a"), MediaMode::Audio).unwrap();
        store.begin_request(&sid("a"), "youtu.be/next").unwrap();

        assert!(!store.release(&sid("a"), request.generation()));
        assert_eq!(store.pending_url(&sid("a")).as_deref(), Some("youtu.be/next"));
        assert!(!store.release(&sid("idle"), request.generation()));
    }

    #[test]
    fn guard_leaves_idle_session_idle() {
        let store = Arc::new(SessionStore::default());
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        let request = store.resolve_choice(&sid("a"), MediaMode::Video).unwrap();
        {
            let guard = store.guard(&request);
            assert_eq!(guard.session_id(), &sid("a"));
        }
        assert_eq!(store.state(&sid("a")), SessionState::Idle);
    }

    #[test]
    fn guard_keeps_link_sent_during_run() {
        let store = Arc::new(SessionStore::default());
        store.begin_request(&sid("a"), "youtu.be/a").unwrap();
        let request = store.resolve_choice(&sid("a"), MediaMode::Video).unwrap();
        store.begin_request(&sid("a"), "youtu.be/next").unwrap();

        let cloned = Arc::clone(&store);
        let joined = thread::spawn(move || {
            let _guard = cloned.guard(&request);
            panic!("pipeline step blew up");
        })
        .join();

        assert!(joined.is_err());
        assert_eq!(store.state(&sid("a")), SessionState::AwaitingChoice);
        assert_eq!(store.pending_url(&sid("a")).as_deref(), Some("youtu.be/next"));
    }

    #[test]
    fn concurrent_resolve_yields_exactly_one_request() {
        const CALLERS: usize = 16;
        let store = Arc::new(SessionStore::default());
        store.begin_request(&sid("a"), "youtu.be/race").unwrap();
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mode = if i % 2 == 0 {
                        MediaMode::Video
                    } else {
                        MediaMode::Audio
                    };
                    store.resolve_choice(&sid("a"), mode)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(Error::NoPendingRequest)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(losers, CALLERS - 1);
    }
}
