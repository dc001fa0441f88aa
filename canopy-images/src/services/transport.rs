//! Scheme-selected HTTP transports
//!
//! Every request in the pipeline goes through a [`Transport`] chosen by
//! [`TransportPicker::select`] from the URL's scheme. Transports never follow
//! redirects themselves: the fetch worker decides how many hops to allow.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use thiserror::Error;

const USER_AGENT: &str = "Canopy/0.1.0 (tree-map image pipeline)";

/// Streaming response body
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Transport-level failures (no HTTP status was obtained)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("body read failed: {0}")]
    Body(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

/// URL scheme family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Plain,
    Encrypted,
}

impl Scheme {
    /// Classify a URL by prefix; `None` for anything but http(s)
    pub fn of(url: &str) -> Option<Scheme> {
        let has_prefix = |prefix: &str| {
            url.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };

        if has_prefix("https://") {
            Some(Scheme::Encrypted)
        } else if has_prefix("http://") {
            Some(Scheme::Plain)
        } else {
            None
        }
    }
}

/// Status, redirect target and body of one exchange
pub struct TransportResponse {
    pub status: u16,
    /// `Location` header, verbatim (may be relative)
    pub location: Option<String>,
    pub body: BodyStream,
}

impl TransportResponse {
    /// Response with a body that is already in memory
    pub fn from_bytes(status: u16, location: Option<String>, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            location,
            body: Box::pin(futures::stream::once(async move { Ok::<_, TransportError>(body) })),
        }
    }

    /// Drain the body into memory
    pub async fn bytes(mut self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// A way of issuing GET requests for one scheme family
#[async_trait]
pub trait Transport: Send + Sync {
    fn scheme(&self) -> Scheme;

    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Plain-text HTTP over reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout, false)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn scheme(&self) -> Scheme {
        Scheme::Plain
    }

    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        send(&self.client, url).await
    }
}

/// TLS-only HTTP over reqwest; refuses to downgrade
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout, true)?,
        })
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    fn scheme(&self) -> Scheme {
        Scheme::Encrypted
    }

    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        send(&self.client, url).await
    }
}

fn build_client(timeout: Duration, https_only: bool) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .build()
        .map_err(|e| TransportError::Setup(e.to_string()))
}

async fn send(client: &reqwest::Client, url: &str) -> Result<TransportResponse, TransportError> {
    tracing::trace!(url = %url, "GET");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TransportError::Request(e.to_string()))?;

    let status = response.status().as_u16();
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())));

    Ok(TransportResponse {
        status,
        location,
        body: Box::pin(body),
    })
}

/// Chooses the transport for a URL
#[derive(Clone)]
pub struct TransportPicker {
    plain: Arc<dyn Transport>,
    encrypted: Arc<dyn Transport>,
}

impl TransportPicker {
    pub fn new(plain: Arc<dyn Transport>, encrypted: Arc<dyn Transport>) -> Self {
        Self { plain, encrypted }
    }

    /// Production picker backed by reqwest
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self::new(
            Arc::new(HttpTransport::new(timeout)?),
            Arc::new(HttpsTransport::new(timeout)?),
        ))
    }

    /// Transport for `url`, or `None` when its scheme is unsupported
    ///
    /// Callers must treat `None` as an error and not attempt the request.
    pub fn select(&self, url: &str) -> Option<&Arc<dyn Transport>> {
        match Scheme::of(url)? {
            Scheme::Plain => Some(&self.plain),
            Scheme::Encrypted => Some(&self.encrypted),
        }
    }
}
