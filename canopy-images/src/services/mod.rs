//! Service modules for the image acquisition stage
//!
//! Leaves first: media location, transports and the single-redirect exchange,
//! the taxonomy API client, normalization and the outcome log. The fetch
//! worker composes them; the batch runner drives a pool of workers.

pub mod batch_runner;
pub mod eol_client;
pub mod exchange;
pub mod fetch_worker;
pub mod image_normalizer;
pub mod media_locator;
pub mod outcome_log;
pub mod output_layout;
pub mod transport;

pub use batch_runner::{BatchReport, ConcurrentBatchRunner, DEFAULT_CONCURRENCY};
pub use eol_client::{EolClient, PageError, DEFAULT_API_BASE_URL};
pub use exchange::{get_following_once, Exchange, ExchangeError, HttpTrace};
pub use fetch_worker::{ImageFetchWorker, WorkerSettings, DEFAULT_PUBLIC_BASE_URL};
pub use image_normalizer::{ImageNormalizer, NormalizedImage, DEFAULT_MAX_DIMENSION};
pub use media_locator::{MediaCandidate, MediaField, MediaLocator};
pub use outcome_log::{ExportFilter, OutcomeLog};
pub use output_layout::OutputLayout;
pub use transport::{
    BodyStream, HttpTransport, HttpsTransport, Scheme, Transport, TransportError, TransportPicker,
    TransportResponse,
};
