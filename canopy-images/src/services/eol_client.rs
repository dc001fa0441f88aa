//! Encyclopedia of Life pages API client
//!
//! Looks up a species page and returns the parsed JSON. Only media entries
//! are wanted, so the request zeroes out videos, sounds, maps and texts and
//! disables the taxonomy tree to keep payloads small.

use bytes::Bytes;
use serde_json::Value;

use super::exchange::{get_following_once, ExchangeError, HttpTrace};
use super::media_locator::has_media_objects;
use super::transport::TransportPicker;
use crate::error::FetchError;
use crate::models::EolId;

pub const DEFAULT_API_BASE_URL: &str = "http://eol.org/api";

/// Species pages, used for photograph attribution links
const EOL_PAGE_BASE_URL: &str = "https://eol.org/pages";

/// A failed page lookup
#[derive(Debug)]
pub struct PageError {
    pub error: FetchError,
    /// Status and body of a non-200 response, kept for manual inspection
    pub rejected: Option<(u16, Bytes)>,
}

impl From<FetchError> for PageError {
    fn from(error: FetchError) -> Self {
        Self { error, rejected: None }
    }
}

/// Pages API client
#[derive(Clone)]
pub struct EolClient {
    picker: TransportPicker,
    api_base_url: String,
    images_per_page: usize,
}

impl EolClient {
    pub fn new(picker: TransportPicker, api_base_url: impl Into<String>, images_per_page: usize) -> Self {
        Self {
            picker,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            images_per_page: images_per_page.max(1),
        }
    }

    pub fn images_per_page(&self) -> usize {
        self.images_per_page
    }

    /// Metadata request URL for one identifier
    pub fn page_url(&self, id: EolId) -> String {
        format!(
            "{}/pages/1.0.json?id={}&images_per_page={}&videos_per_page=0&sounds_per_page=0\
             &maps_per_page=0&texts_per_page=0&details=true&taxonomy=false",
            self.api_base_url, id, self.images_per_page
        )
    }

    /// Public media page credited as the photograph source
    pub fn attribution_url(id: EolId) -> String {
        format!("{}/{}/media", EOL_PAGE_BASE_URL, id)
    }

    /// Fetch and parse the page for `id`
    ///
    /// Succeeds only for a 200 response listing at least one media entry.
    /// Status codes seen along the way are left in `trace`.
    pub async fn fetch_page(&self, id: EolId, trace: &mut HttpTrace) -> Result<Value, PageError> {
        let url = self.page_url(id);
        tracing::debug!(eol_id = %id, url = %url, "Querying taxonomy API");

        let exchange = get_following_once(&self.picker, &url, trace)
            .await
            .map_err(|e| match e {
                ExchangeError::Unresolved(url) => FetchError::ProtocolUnresolved(url),
                other => FetchError::MetadataFetchFailed(other.to_string()),
            })?;

        let status = exchange.response.status;
        if status != 200 {
            let reason = match trace.first_code {
                Some(first) => FetchError::RedirectFailed { first, second: status }.to_string(),
                None => format!("unexpected status {}", status),
            };
            let body = exchange.response.bytes().await.unwrap_or_default();
            return Err(PageError {
                error: FetchError::MetadataFetchFailed(reason),
                rejected: Some((status, body)),
            });
        }

        let body = exchange
            .response
            .bytes()
            .await
            .map_err(|e| FetchError::MetadataFetchFailed(e.to_string()))?;
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::MetadataFetchFailed(format!("invalid JSON: {}", e)))?;

        if !has_media_objects(Some(&json)) {
            return Err(FetchError::NoMediaAvailable.into());
        }

        Ok(json)
    }
}
