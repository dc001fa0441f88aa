//! Media URL extraction from taxonomy API responses
//!
//! Responses look like `{"taxonConcept": {"dataObjects": [{...}, ...]}}`.
//! Any level may be missing; extraction never fails, it just finds nothing.

use serde_json::Value;

/// Field of a media entry that can carry the image URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaField {
    /// Copy hosted by the taxonomy service itself
    EolMediaUrl,
    /// Original location at the contributing site
    MediaUrl,
}

impl MediaField {
    pub fn key(self) -> &'static str {
        match self {
            MediaField::EolMediaUrl => "eolMediaURL",
            MediaField::MediaUrl => "mediaURL",
        }
    }
}

/// A media entry with a usable URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub url: String,
    /// Trimmed `rightsHolder`, empty when absent
    pub author: String,
}

/// Extracts media URLs, checking fields in preference order
#[derive(Debug, Clone)]
pub struct MediaLocator {
    fields: Vec<MediaField>,
}

impl Default for MediaLocator {
    fn default() -> Self {
        Self::new(vec![MediaField::EolMediaUrl, MediaField::MediaUrl])
    }
}

impl MediaLocator {
    pub fn new(fields: Vec<MediaField>) -> Self {
        Self { fields }
    }

    /// URL of the first media entry, if it carries one
    pub fn locate(&self, body: Option<&Value>) -> Option<String> {
        data_objects(body)?
            .first()
            .and_then(|entry| self.entry_url(entry))
    }

    /// Up to `limit` usable entries, skipping those without a URL
    pub fn locate_all(&self, body: Option<&Value>, limit: usize) -> Vec<MediaCandidate> {
        let Some(entries) = data_objects(body) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let url = self.entry_url(entry)?;
                let author = entry
                    .get("rightsHolder")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                Some(MediaCandidate { url, author })
            })
            .take(limit)
            .collect()
    }

    fn entry_url(&self, entry: &Value) -> Option<String> {
        self.fields.iter().find_map(|field| {
            entry
                .get(field.key())
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }
}

/// Whether the response lists at least one media entry
pub fn has_media_objects(body: Option<&Value>) -> bool {
    data_objects(body).is_some_and(|entries| !entries.is_empty())
}

fn data_objects(body: Option<&Value>) -> Option<&Vec<Value>> {
    body?.get("taxonConcept")?.get("dataObjects")?.as_array()
}
