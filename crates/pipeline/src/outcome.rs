use mediagrab_media::{FetchError, FetchErrorKind, GuardDecision, ResolveError};

use crate::messages;

/// What the delivered file looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: String,
    pub size_bytes: u64,
    pub duration_seconds: u32,
    pub guard: GuardDecision,
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Delivered(Delivery),
    FetchFailed(FetchError),
    ResolveFailed(ResolveError),
    DeliveryFailed(String),
}

impl PipelineOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// Text shown to the user for a failed run. `None` on success.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Delivered(_) => None,
            Self::FetchFailed(e) if e.kind == FetchErrorKind::Unsupported => {
                Some(messages::UNSUPPORTED_SOURCE)
            },
            Self::FetchFailed(_) | Self::ResolveFailed(_) => Some(messages::DOWNLOAD_FAILED),
            Self::DeliveryFailed(_) => Some(messages::SEND_FAILED),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::FetchFailed(_) => "fetch_failed",
            Self::ResolveFailed(_) => "resolve_failed",
            Self::DeliveryFailed(_) => "delivery_failed",
        }
    }
}
