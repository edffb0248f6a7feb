use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A URL is already waiting for a choice and replacement is disabled.
    #[error("a request is already waiting for a choice: {pending_url}")]
    Rejected { pending_url: String },

    /// A choice arrived for a session with nothing pending.
    #[error("no pending request for this session")]
    NoPendingRequest,
}

pub type Result<T> = std::result::Result<T, Error>;
