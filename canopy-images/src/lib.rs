//! canopy-images library interface
//!
//! Image acquisition stage of the canopy street-tree pipeline: resolves each
//! species identifier to normalized photographs and attaches them to the
//! records. Exposed as a library so the binary and integration tests share
//! one implementation.

pub mod config;
pub mod error;
pub mod models;
pub mod records;
pub mod services;

pub use crate::error::FetchError;

use crate::config::PipelineSettings;
use crate::services::{
    ConcurrentBatchRunner, EolClient, ImageFetchWorker, ImageNormalizer, OutputLayout, TransportError,
    TransportPicker, WorkerSettings,
};

/// Build a worker over the given transports
///
/// Tests pass scripted transports here; the binary passes reqwest ones.
pub fn build_worker(settings: &PipelineSettings, picker: TransportPicker) -> ImageFetchWorker {
    let eol = EolClient::new(picker.clone(), settings.api_base_url.clone(), settings.images_per_identifier);
    ImageFetchWorker::new(
        eol,
        picker,
        ImageNormalizer::new(settings.max_dimension),
        WorkerSettings {
            layout: OutputLayout::new(settings.image_dir.clone()),
            public_base_url: settings.public_base_url.clone(),
            naming: settings.naming,
            images_per_identifier: settings.images_per_identifier,
        },
    )
}

pub fn build_runner(settings: &PipelineSettings, picker: TransportPicker) -> ConcurrentBatchRunner {
    ConcurrentBatchRunner::new(build_worker(settings, picker), settings.concurrency)
}

/// Build a batch runner over plain and encrypted reqwest transports
pub fn build_http_runner(settings: &PipelineSettings) -> Result<ConcurrentBatchRunner, TransportError> {
    let picker = TransportPicker::with_timeout(settings.request_timeout)?;
    Ok(build_runner(settings, picker))
}
