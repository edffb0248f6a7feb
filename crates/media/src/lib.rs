//! Media acquisition: link classification, the fetch engine and transcoder
//! boundaries, output resolution, and the delivery size guard.

pub mod artifact;
pub mod classify;
pub mod error;
pub mod fetch;
pub mod resolve;
pub mod transcode;
pub mod workdir;

pub use {
    artifact::{MAX_TITLE_CHARS, MediaArtifact, sanitize_title},
    classify::is_supported_url,
    error::{Error, FetchError, FetchErrorKind, ResolveError, Result, TranscodeError},
    fetch::{FetchEngine, FetchResult, YtDlpFetcher},
    resolve::{CANDIDATE_EXTENSIONS, resolve_output},
    transcode::{FfmpegTranscoder, GuardDecision, SizeGuard, Transcoder},
    workdir::WorkDir,
};
