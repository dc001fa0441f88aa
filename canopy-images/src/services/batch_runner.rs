//! Bounded-concurrency batch over a record set
//!
//! Identifiers are de-duplicated first so each is fetched at most once, then
//! fed through `buffer_unordered(concurrency)`. Completion order is irrelevant:
//! results are merged back onto records by identifier.
//!
//! Cancellation stops dispatch only. Workers already running finish their
//! identifier so no half-written image is left behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::fetch_worker::ImageFetchWorker;
use super::outcome_log::OutcomeLog;
use crate::models::{EolId, IdentifierSet, MediaReference, SourceRecord};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Records with `images` attached plus the audit trail of the run
#[derive(Debug)]
pub struct BatchReport {
    pub records: Vec<SourceRecord>,
    pub outcomes: OutcomeLog,
    /// Unique identifiers in the input
    pub identifiers: usize,
    /// Identifiers never dispatched because the batch was cancelled
    pub skipped: usize,
}

impl BatchReport {
    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
    }
}

pub struct ConcurrentBatchRunner {
    worker: ImageFetchWorker,
    concurrency: usize,
    cancel_token: CancellationToken,
}

impl ConcurrentBatchRunner {
    pub fn new(worker: ImageFetchWorker, concurrency: usize) -> Self {
        Self {
            worker,
            concurrency: concurrency.max(1),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Fetch images for every identifier and attach them to `records`
    ///
    /// Per-identifier failures end up in the outcome log. The only error is a
    /// setup failure (output directories), raised before any request is made.
    pub async fn run(&self, mut records: Vec<SourceRecord>) -> canopy_common::Result<BatchReport> {
        self.worker.settings().layout.ensure()?;

        let identifiers = IdentifierSet::from_records(&records);
        let total = identifiers.len();
        let start = Instant::now();

        tracing::info!(
            records = records.len(),
            identifiers = total,
            concurrency = self.concurrency,
            "Starting image acquisition"
        );

        let log = OutcomeLog::new();
        let dispatched = AtomicUsize::new(0);
        let worker = &self.worker;
        let cancel_token = &self.cancel_token;
        let log_ref = &log;
        let dispatched_ref = &dispatched;

        let results: Vec<(EolId, Vec<MediaReference>)> = stream::iter(identifiers.into_iter().enumerate())
            .map(|(index, entry)| async move {
                // Checked when the pool has a free slot, not at enqueue time
                if cancel_token.is_cancelled() {
                    return None;
                }
                dispatched_ref.fetch_add(1, Ordering::SeqCst);
                let references = worker.run(&entry, (index + 1, total), log_ref).await;
                Some((entry.id, references))
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|result| async move { result })
            .collect()
            .await;

        let media: HashMap<EolId, Vec<MediaReference>> = results.into_iter().collect();
        for record in &mut records {
            let images = record
                .identifier()
                .and_then(|id| media.get(&id))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            record.attach_images(images);
        }

        let skipped = total - dispatched.load(Ordering::SeqCst);
        if skipped > 0 {
            tracing::warn!(skipped, "Batch cancelled; remaining identifiers were not fetched");
        }

        tracing::info!(
            identifiers = total,
            succeeded = log.success_count(),
            failed = log.failure_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Image acquisition completed"
        );

        Ok(BatchReport {
            records,
            outcomes: log,
            identifiers: total,
            skipped,
        })
    }
}
