//! Append-only audit log of per-identifier outcomes
//!
//! Shared by all workers of a batch. Appends are serialized through a mutex;
//! readers get snapshots. Export is comma-separated text with a header row
//! taken from the first outcome's field names.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::FetchOutcome;

/// Which outcomes an export includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFilter {
    All,
    FailuresOnly,
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeLog {
    entries: Arc<Mutex<Vec<FetchOutcome>>>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FetchOutcome>> {
        // A panic while holding the lock cannot leave a half-pushed entry
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, outcome: FetchOutcome) {
        self.lock().push(outcome);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all outcomes in append order
    pub fn snapshot(&self) -> Vec<FetchOutcome> {
        self.lock().clone()
    }

    pub fn success_count(&self) -> usize {
        self.lock().iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.lock().iter().filter(|o| !o.is_success()).count()
    }

    /// Render as CSV text; empty when no outcome matches
    pub fn to_csv(&self, filter: ExportFilter) -> String {
        let entries = self.lock();
        let mut rows = entries
            .iter()
            .filter(|o| filter == ExportFilter::All || !o.is_success())
            .peekable();

        let Some(first) = rows.peek() else {
            return String::new();
        };

        let mut lines = vec![first.field_names().join(",")];
        lines.extend(rows.map(|outcome| {
            outcome
                .values()
                .iter()
                .map(|v| sanitize_cell(v))
                .collect::<Vec<_>>()
                .join(",")
        }));
        lines.join("\n")
    }

    /// Write the CSV export to `path`
    pub fn write_csv(&self, path: &Path, filter: ExportFilter) -> std::io::Result<()> {
        let mut text = self.to_csv(filter);
        if !text.is_empty() {
            text.push('\n');
        }
        std::fs::write(path, text)
    }
}

/// Cells are joined without quoting, so separators inside values are replaced
fn sanitize_cell(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ',' => ';',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
