//! Error types for canopy-images
//!
//! [`FetchError`] describes why a single identifier produced no image. These
//! never escape the worker: they are recorded in the outcome log and the
//! batch moves on. Batch-level failures (unusable output directories, bad
//! input) use [`canopy_common::Error`] instead.

use thiserror::Error;

/// Per-identifier failure taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Non-200 status, transport error or unreadable body on the metadata request
    #[error("metadata lookup failed: {0}")]
    MetadataFetchFailed(String),

    /// 200 response without any media entries; the common case for rare species
    #[error("no media available")]
    NoMediaAvailable,

    /// Media entries present but none carries a usable URL
    #[error("no media URL")]
    MediaUrlMissing,

    /// Binary download answered with something other than 200/301/302
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The single redirect hop did not end in a 200
    #[error("redirect failed: {first} then {second}")]
    RedirectFailed { first: u16, second: u16 },

    /// Transport-level failure while downloading (connection, timeout, missing Location)
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// URL scheme matches neither the plain nor the encrypted transport
    #[error("no transport for URL: {0}")]
    ProtocolUnresolved(String),

    /// Downloaded bytes could not be decoded, resized or re-encoded
    #[error("image normalization failed: {0}")]
    Normalize(String),

    /// Local file write failed
    #[error("IO error: {0}")]
    Io(String),

    /// The worker itself failed (panicked) while processing the identifier
    #[error("internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// Whether this outcome is routine and should not be logged as a warning
    pub fn is_expected(&self) -> bool {
        matches!(self, FetchError::NoMediaAvailable)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}
