//! Test helper modules for canopy-images integration tests
//!
//! - MockRemote: scripted responses behind both transports, with request
//!   counting and an optional gate for concurrency tests
//! - Fixtures: taxonomy API bodies, PNG payloads and settings

#![allow(dead_code, unused_imports)]

pub mod fixtures;
pub mod mock_transport;

pub use fixtures::{metadata_url, page_body, png_bytes, record, test_settings, API_BASE, MEDIA_BASE};
pub use mock_transport::{MockRemote, MockTransport};
