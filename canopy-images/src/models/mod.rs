//! Data models for the image acquisition stage

pub mod fetch_outcome;
pub mod media_reference;
pub mod source_record;

pub use fetch_outcome::{FetchOutcome, OUTCOME_COLUMNS};
pub use media_reference::{Attribution, MediaReference};
pub use source_record::{EolId, IdentifierEntry, IdentifierSet, SourceRecord};
