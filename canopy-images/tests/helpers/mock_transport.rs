//! Scripted transport standing in for the network
//!
//! Both the plain and the encrypted transport share one [`MockRemote`], so a
//! test scripts URLs once and inspects every request made.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;

use canopy_images::services::{Scheme, Transport, TransportError, TransportPicker, TransportResponse};

#[derive(Debug, Clone)]
enum Scripted {
    Respond {
        status: u16,
        location: Option<String>,
        body: Bytes,
    },
    Fail(TransportError),
}

/// Scripted remote shared by both mock transports
pub struct MockRemote {
    routes: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Semaphore>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// Every request blocks until [`MockRemote::release`] hands out a permit
    pub fn gated() -> Arc<Self> {
        Arc::new(Self::build(Some(Semaphore::new(0))))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate,
        }
    }

    pub fn respond(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Scripted::Respond {
                status,
                location: None,
                body: body.into(),
            },
        );
    }

    pub fn redirect(&self, url: &str, status: u16, location: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Scripted::Respond {
                status,
                location: Some(location.to_string()),
                body: Bytes::new(),
            },
        );
    }

    pub fn fail(&self, url: &str, error: TransportError) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Fail(error));
    }

    /// Let `permits` gated requests proceed
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn picker(self: &Arc<Self>) -> TransportPicker {
        TransportPicker::new(
            Arc::new(MockTransport::new(Scheme::Plain, Arc::clone(self))),
            Arc::new(MockTransport::new(Scheme::Encrypted, Arc::clone(self))),
        )
    }

    async fn serve(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }

        let scripted = self.routes.lock().unwrap().get(url).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match scripted {
            Some(Scripted::Respond { status, location, body }) => {
                Ok(TransportResponse::from_bytes(status, location, body))
            }
            Some(Scripted::Fail(error)) => Err(error),
            None => Ok(TransportResponse::from_bytes(404, None, "<html>not found</html>")),
        }
    }
}

/// One scheme's view of a [`MockRemote`]
pub struct MockTransport {
    scheme: Scheme,
    remote: Arc<MockRemote>,
}

impl MockTransport {
    pub fn new(scheme: Scheme, remote: Arc<MockRemote>) -> Self {
        Self { scheme, remote }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn scheme(&self) -> Scheme {
        self.scheme
    }

    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        assert_eq!(Scheme::of(url), Some(self.scheme), "request routed to wrong transport");
        self.remote.serve(url).await
    }
}
