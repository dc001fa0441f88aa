//! Settings resolution for canopy-images
//!
//! Priority: CLI/ENV override (already merged by clap) → TOML → default.

use std::path::PathBuf;
use std::time::Duration;

use canopy_common::config::{NamingPolicy, TomlConfig};
use canopy_common::{Error, Result};

use crate::services::{
    DEFAULT_API_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_MAX_DIMENSION, DEFAULT_PUBLIC_BASE_URL,
};

pub const DEFAULT_IMAGE_DIR: &str = "build/img";
pub const DEFAULT_IMAGES_PER_IDENTIFIER: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Values given on the command line or through `CANOPY_*` variables
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub image_dir: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub api_base_url: Option<String>,
    pub concurrency: Option<usize>,
    pub images_per_identifier: Option<usize>,
    pub max_dimension: Option<u32>,
    pub naming: Option<NamingPolicy>,
    pub request_timeout_secs: Option<u64>,
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub image_dir: PathBuf,
    pub public_base_url: String,
    pub api_base_url: String,
    pub concurrency: usize,
    pub images_per_identifier: usize,
    pub max_dimension: u32,
    pub naming: NamingPolicy,
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            images_per_identifier: DEFAULT_IMAGES_PER_IDENTIFIER,
            max_dimension: DEFAULT_MAX_DIMENSION,
            naming: NamingPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl PipelineSettings {
    /// Merge overrides over the TOML tier over compiled defaults, then validate
    pub fn resolve(overrides: SettingsOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = Self::default();

        let settings = Self {
            image_dir: overrides
                .image_dir
                .or_else(|| toml.image_dir.clone())
                .unwrap_or(defaults.image_dir),
            public_base_url: overrides
                .public_base_url
                .or_else(|| toml.public_base_url.clone())
                .unwrap_or(defaults.public_base_url),
            api_base_url: overrides
                .api_base_url
                .or_else(|| toml.api_base_url.clone())
                .unwrap_or(defaults.api_base_url),
            concurrency: overrides
                .concurrency
                .or(toml.concurrency)
                .unwrap_or(defaults.concurrency),
            images_per_identifier: overrides
                .images_per_identifier
                .or(toml.images_per_identifier)
                .unwrap_or(defaults.images_per_identifier),
            max_dimension: overrides
                .max_dimension
                .or(toml.max_dimension)
                .unwrap_or(defaults.max_dimension),
            naming: overrides.naming.or(toml.naming).unwrap_or(defaults.naming),
            request_timeout: overrides
                .request_timeout_secs
                .or(toml.request_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.images_per_identifier == 0 {
            return Err(Error::Config("images_per_identifier must be at least 1".to_string()));
        }
        if self.max_dimension == 0 {
            return Err(Error::Config("max_dimension must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout_secs must be at least 1".to_string()));
        }
        if self.public_base_url.trim().is_empty() {
            return Err(Error::Config("public_base_url must not be empty".to_string()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("api_base_url must not be empty".to_string()));
        }
        Ok(())
    }
}
