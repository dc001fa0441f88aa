//! Response bodies, image payloads and settings for tests

use std::io::Cursor;
use std::path::Path;

use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};

use canopy_images::config::PipelineSettings;
use canopy_images::models::{EolId, SourceRecord};
use canopy_images::services::EolClient;

use super::MockRemote;

pub const API_BASE: &str = "http://api.test/api";
pub const MEDIA_BASE: &str = "https://media.test/content";

/// Settings pointing at the mock API, one image per identifier
pub fn test_settings(image_dir: &Path) -> PipelineSettings {
    PipelineSettings {
        image_dir: image_dir.to_path_buf(),
        public_base_url: "https://storage.test/img/".to_string(),
        api_base_url: API_BASE.to_string(),
        images_per_identifier: 1,
        ..PipelineSettings::default()
    }
}

/// Metadata URL the worker requests for `id` under `settings`
pub fn metadata_url(settings: &PipelineSettings, id: i64) -> String {
    let picker = MockRemote::new().picker();
    EolClient::new(picker, settings.api_base_url.clone(), settings.images_per_identifier)
        .page_url(EolId::new(id).expect("positive id"))
}

/// Pages API body listing the given media URLs with rights holders
pub fn page_body(media: &[(&str, &str)]) -> Value {
    let objects: Vec<Value> = media
        .iter()
        .map(|(url, rights_holder)| {
            json!({
                "dataObjectVersionID": 1,
                "dataType": "http://purl.org/dc/dcmitype/StillImage",
                "eolMediaURL": url,
                "rightsHolder": rights_holder,
            })
        })
        .collect();
    json!({
        "identifier": 582,
        "scientificName": "Arbutus menziesii",
        "taxonConcept": { "dataObjects": objects },
    })
}

/// Encoded PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128u8]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

pub fn record(value: Value) -> SourceRecord {
    SourceRecord::from_value(value).expect("record object")
}
