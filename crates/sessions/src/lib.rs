//! Per-conversation request state.
//!
//! Each session is either idle or holds exactly one URL waiting for the user
//! to pick an output form. Picking consumes the slot atomically, so a second
//! tap on the same keyboard cannot start a second download.

pub mod error;
pub mod store;

pub use {
    error::{Error, Result},
    store::{MediaRequest, PendingPolicy, SessionGuard, SessionState, SessionStore},
};
