//! Per-identifier audit rows

use std::path::PathBuf;

use super::EolId;
use crate::error::FetchError;

/// Column names, in export order
pub const OUTCOME_COLUMNS: [&str; 6] = [
    "identifier",
    "responseCode",
    "firstCode",
    "mediaURL",
    "writtenFile",
    "error",
];

/// Result of processing one identifier
///
/// Exactly one is recorded per identifier, whatever state the attempt ended in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub identifier: EolId,
    /// Final HTTP status observed
    pub response_code: Option<u16>,
    /// Pre-redirect status, when a redirect was followed
    pub first_code: Option<u16>,
    pub media_url: Option<String>,
    /// Normalized image, or the preserved error body for failed downloads
    pub written_file: Option<PathBuf>,
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    /// Failure with no HTTP details beyond what the caller fills in
    pub fn failure(identifier: EolId, error: FetchError) -> Self {
        Self {
            identifier,
            response_code: None,
            first_code: None,
            media_url: None,
            written_file: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Field names of this row, in export order
    pub fn field_names(&self) -> &'static [&'static str] {
        &OUTCOME_COLUMNS
    }

    /// Cell values in [`OUTCOME_COLUMNS`] order; absent values are empty
    pub fn values(&self) -> [String; 6] {
        [
            self.identifier.to_string(),
            self.response_code.map(|c| c.to_string()).unwrap_or_default(),
            self.first_code.map(|c| c.to_string()).unwrap_or_default(),
            self.media_url.clone().unwrap_or_default(),
            self.written_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
        ]
    }
}
