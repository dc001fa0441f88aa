//! Per-identifier image acquisition
//!
//! One call to [`ImageFetchWorker::run`] walks a single identifier through
//! metadata lookup, media URL resolution, download (one redirect hop at most),
//! fit-inside normalization and the outcome record:
//!
//! ```text
//! START → METADATA_FETCHED → NO_MEDIA                          (fail)
//!                          → MEDIA_RESOLVED → DOWNLOADED → RESIZED (success)
//!       → FETCH_ERROR                                          (fail)
//!       → DOWNLOAD_ERROR                                       (fail)
//! ```
//!
//! Every terminal state appends exactly one [`FetchOutcome`]. Nothing escapes
//! `run`, not even a panic inside the attempt.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::{FutureExt, StreamExt};
use reqwest::Url;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use canopy_common::config::NamingPolicy;
use canopy_common::slug::to_slug;

use super::eol_client::{EolClient, PageError};
use super::exchange::{get_following_once, ExchangeError, HttpTrace};
use super::image_normalizer::ImageNormalizer;
use super::media_locator::{MediaCandidate, MediaLocator};
use super::outcome_log::OutcomeLog;
use super::output_layout::OutputLayout;
use super::transport::{BodyStream, TransportPicker, TransportResponse};
use crate::error::FetchError;
use crate::models::{Attribution, EolId, FetchOutcome, IdentifierEntry, MediaReference};

pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://storage.googleapis.com/public-tree-map/img/";

/// Extension used when the media URL path carries none
const DEFAULT_EXTENSION: &str = "jpg";

/// Worker settings fixed for a whole run
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub layout: OutputLayout,
    pub public_base_url: String,
    pub naming: NamingPolicy,
    pub images_per_identifier: usize,
}

/// State of one image download, kept so a failure can still report what it saw
#[derive(Debug)]
struct ImageAttempt {
    trace: HttpTrace,
    media_url: String,
    written_file: Option<PathBuf>,
    result: Result<MediaReference, FetchError>,
}

/// Runs the acquisition sequence for single identifiers
///
/// Cheap to clone; clones share the transports.
#[derive(Clone)]
pub struct ImageFetchWorker {
    eol: EolClient,
    picker: TransportPicker,
    locator: MediaLocator,
    normalizer: ImageNormalizer,
    settings: WorkerSettings,
}

impl ImageFetchWorker {
    pub fn new(
        eol: EolClient,
        picker: TransportPicker,
        normalizer: ImageNormalizer,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            eol,
            picker,
            locator: MediaLocator::default(),
            normalizer,
            settings,
        }
    }

    pub fn with_locator(mut self, locator: MediaLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Process one identifier
    ///
    /// Returns the published references (empty on failure) and appends
    /// exactly one outcome to `log`. `position` is `(index, total)` for
    /// progress logging only.
    pub async fn run(
        &self,
        entry: &IdentifierEntry,
        position: (usize, usize),
        log: &OutcomeLog,
    ) -> Vec<MediaReference> {
        let (index, total) = position;
        let start = Instant::now();

        let attempt = std::panic::AssertUnwindSafe(self.attempt(entry)).catch_unwind().await;
        let (outcome, references) = match attempt {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                (
                    FetchOutcome::failure(entry.id, FetchError::Internal(message)),
                    Vec::new(),
                )
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome.error {
            None => tracing::info!(
                eol_id = %entry.id,
                images = references.len(),
                elapsed_ms,
                "({}/{}) Fetched image",
                index,
                total
            ),
            Some(error) if error.is_expected() => tracing::debug!(
                eol_id = %entry.id,
                elapsed_ms,
                "({}/{}) {}",
                index,
                total,
                error
            ),
            Some(error) => tracing::warn!(
                eol_id = %entry.id,
                response_code = ?outcome.response_code,
                first_code = ?outcome.first_code,
                elapsed_ms,
                "({}/{}) Image fetch failed: {}",
                index,
                total,
                error
            ),
        }

        log.append(outcome);
        references
    }

    async fn attempt(&self, entry: &IdentifierEntry) -> (FetchOutcome, Vec<MediaReference>) {
        let id = entry.id;

        let stem = self.file_stem(entry);

        let mut trace = HttpTrace::default();
        let body = match self.eol.fetch_page(id, &mut trace).await {
            Ok(body) => body,
            Err(PageError { error, rejected }) => {
                let written_file = match rejected {
                    Some((status, body)) => {
                        let path = self.error_body_path(&format!("{}_meta", stem), status);
                        let body = TransportResponse::from_bytes(status, None, body).body;
                        self.keep_error_body(id, body, path).await
                    }
                    None => None,
                };
                let outcome = FetchOutcome {
                    response_code: trace.response_code,
                    first_code: trace.first_code,
                    written_file,
                    ..FetchOutcome::failure(id, error)
                };
                return (outcome, Vec::new());
            }
        };

        let candidates = self
            .locator
            .locate_all(Some(&body), self.settings.images_per_identifier);
        if candidates.is_empty() {
            let outcome = FetchOutcome {
                response_code: trace.response_code,
                first_code: trace.first_code,
                ..FetchOutcome::failure(id, FetchError::MediaUrlMissing)
            };
            return (outcome, Vec::new());
        }

        let mut attempts = Vec::with_capacity(candidates.len());
        for (n, candidate) in candidates.iter().enumerate() {
            let name = self.numbered_stem(&stem, n);
            attempts.push(self.download_one(id, &name, candidate).await);
        }

        let (mut outcome, references) = summarize(id, attempts);
        // A redirect on the lookup still counts as the row's first status
        if outcome.first_code.is_none() {
            outcome.first_code = trace.first_code;
        }
        (outcome, references)
    }

    /// Download, store and normalize one media entry
    async fn download_one(&self, id: EolId, stem: &str, candidate: &MediaCandidate) -> ImageAttempt {
        let mut attempt = ImageAttempt {
            trace: HttpTrace::default(),
            media_url: candidate.url.clone(),
            written_file: None,
            result: Err(FetchError::MediaUrlMissing),
        };

        let exchange = match get_following_once(&self.picker, &candidate.url, &mut attempt.trace).await {
            Ok(exchange) => exchange,
            Err(error) => {
                attempt.result = Err(match error {
                    ExchangeError::Unresolved(url) => FetchError::ProtocolUnresolved(url),
                    other => FetchError::DownloadFailed(other.to_string()),
                });
                return attempt;
            }
        };

        let status = exchange.response.status;
        if status != 200 {
            let error = match attempt.trace.first_code {
                Some(first) => FetchError::RedirectFailed { first, second: status },
                None => FetchError::UnexpectedStatus(status),
            };
            let path = self.error_body_path(stem, status);
            attempt.written_file = self.keep_error_body(id, exchange.response.body, path).await;
            attempt.result = Err(error);
            return attempt;
        }

        let file_name = format!("{}.{}", stem, extension_of(&candidate.url));
        let path = self.settings.layout.image_dir().join(&file_name);

        if let Err(error) = write_body(exchange.response.body, &path).await {
            attempt.result = Err(error);
            return attempt;
        }

        match self.normalizer.normalize_file(&path).await {
            Ok(image) => {
                tracing::debug!(
                    eol_id = %id,
                    file = %path.display(),
                    width = image.width,
                    height = image.height,
                    resized = image.resized,
                    "Normalized image"
                );
                attempt.written_file = Some(path);
                attempt.result = Ok(MediaReference {
                    url: publish_url(&self.settings.public_base_url, &file_name),
                    author: Some(Attribution {
                        name: candidate.author.clone(),
                        url: EolClient::attribution_url(id),
                    }),
                });
            }
            Err(error) => {
                // Only decodable images stay in the image directory
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::debug!(file = %path.display(), "Could not remove rejected image: {}", e);
                }
                attempt.result = Err(error);
            }
        }

        attempt
    }

    fn error_body_path(&self, stem: &str, status: u16) -> PathBuf {
        self.settings.layout.other_dir().join(format!("{}_{}.html", stem, status))
    }

    /// Save a rejected response body under `other/`; best effort
    async fn keep_error_body(&self, id: EolId, body: BodyStream, path: PathBuf) -> Option<PathBuf> {
        match write_body(body, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(eol_id = %id, path = %path.display(), "Could not keep error body: {}", e);
                None
            }
        }
    }

    /// Base file name for an identifier under the run's naming policy
    ///
    /// Slug naming falls back to the identifier when the record has no
    /// botanical name.
    pub fn file_stem(&self, entry: &IdentifierEntry) -> String {
        match self.settings.naming {
            NamingPolicy::Identifier => entry.id.to_string(),
            NamingPolicy::BotanicalSlug => entry
                .botanical_name
                .as_deref()
                .map(|name| to_slug(name))
                .filter(|slug| !slug.is_empty())
                .unwrap_or_else(|| entry.id.to_string()),
        }
    }

    fn numbered_stem(&self, stem: &str, n: usize) -> String {
        if self.settings.images_per_identifier <= 1 {
            stem.to_string()
        } else {
            format!("{}_{}", stem, n + 1)
        }
    }
}

/// Fold the per-image attempts into one outcome
///
/// The first success describes the row; with none, the first failure does.
fn summarize(id: EolId, attempts: Vec<ImageAttempt>) -> (FetchOutcome, Vec<MediaReference>) {
    let mut references = Vec::new();
    let mut first_success: Option<FetchOutcome> = None;
    let mut failures: Vec<FetchOutcome> = Vec::new();

    for attempt in attempts {
        let outcome = FetchOutcome {
            identifier: id,
            response_code: attempt.trace.response_code,
            first_code: attempt.trace.first_code,
            media_url: Some(attempt.media_url),
            written_file: attempt.written_file,
            error: attempt.result.as_ref().err().cloned(),
        };
        match attempt.result {
            Ok(reference) => {
                references.push(reference);
                first_success.get_or_insert(outcome);
            }
            Err(_) => failures.push(outcome),
        }
    }

    let mut failures = failures.into_iter();
    let outcome = match first_success {
        Some(success) => success,
        None => failures
            .next()
            .unwrap_or_else(|| FetchOutcome::failure(id, FetchError::MediaUrlMissing)),
    };

    for extra in failures {
        tracing::warn!(
            eol_id = %id,
            media_url = extra.media_url.as_deref().unwrap_or_default(),
            "Additional image failed: {}",
            extra.error.map(|e| e.to_string()).unwrap_or_default()
        );
    }

    (outcome, references)
}

/// Stream a response body to `path`, replacing any existing file
///
/// On any failure the partial file is removed.
async fn write_body(body: BodyStream, path: &Path) -> Result<(), FetchError> {
    let mut file = tokio::fs::File::create(path).await?;
    let result = copy_body(body, &mut file).await;
    drop(file);

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(file = %path.display(), "Could not remove partial file: {}", e);
        }
    }
    result
}

async fn copy_body<W>(mut body: BodyStream, writer: &mut W) -> Result<(), FetchError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| FetchError::DownloadFailed(e.to_string()))?;
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Lowercase extension of the URL's last path segment, `jpg` when absent
pub fn extension_of(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Public URL of a stored file
pub fn publish_url(base: &str, file_name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file_name)
}
