//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns tier 3: locating and parsing the TOML file. Tiers 1-2 are
//! handled by each binary's argument parser, tier 4 by its settings type.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Directory under the platform config dir holding canopy TOML files
const CONFIG_DIR_NAME: &str = "canopy";

/// TOML bootstrap configuration
///
/// Every field is optional; absent values fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Directory receiving normalized images
    #[serde(default)]
    pub image_dir: Option<PathBuf>,

    /// Public base URL the image files are published under
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Base URL of the taxonomy API (`.../api`)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Number of identifiers fetched simultaneously
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Media entries requested and downloaded per identifier
    #[serde(default)]
    pub images_per_identifier: Option<usize>,

    /// Bounding box edge (pixels) images are fitted inside
    #[serde(default)]
    pub max_dimension: Option<u32>,

    /// Local file naming policy
    #[serde(default)]
    pub naming: Option<NamingPolicy>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How downloaded image files are named on disk
///
/// One policy applies to a whole run.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NamingPolicy {
    /// `<identifier>.<ext>`; collision-free when many records share a species
    #[default]
    Identifier,
    /// `<slug(botanical_name)>.<ext>`; for human-auditable exports
    BotanicalSlug,
}

impl FromStr for NamingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identifier" | "id" => Ok(NamingPolicy::Identifier),
            "botanical-slug" | "slug" => Ok(NamingPolicy::BotanicalSlug),
            other => Err(Error::Config(format!(
                "unknown naming policy '{}' (expected 'identifier' or 'botanical-slug')",
                other
            ))),
        }
    }
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingPolicy::Identifier => write!(f, "identifier"),
            NamingPolicy::BotanicalSlug => write!(f, "botanical-slug"),
        }
    }
}

/// Default TOML path for a tool, e.g. `~/.config/canopy/canopy-images.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Where the TOML tier came from
///
/// Returned alongside the config so the caller can report it once logging is
/// up; the log level itself lives in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` / `CANOPY_CONFIG`
    Explicit(PathBuf),
    /// Platform default file
    Default(PathBuf),
    /// Platform default path checked, nothing there
    Missing(PathBuf),
    /// No platform config directory
    Unavailable,
}

impl ConfigSource {
    /// Report the source through `tracing`
    pub fn log(&self) {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Default(path) => {
                info!("Configuration loaded from {}", path.display())
            }
            ConfigSource::Missing(path) => {
                warn!("No config file at {}; using defaults", path.display())
            }
            ConfigSource::Unavailable => {
                warn!("Could not determine config directory; using defaults")
            }
        }
    }
}

/// Load the TOML tier for a tool
///
/// An explicitly requested file must exist. The platform default file is
/// optional: when it is missing, compiled defaults apply.
pub fn resolve_toml_config(
    explicit: Option<&Path>,
    module_name: &str,
) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    match default_config_path(module_name) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigSource::Default(path)))
        }
        Some(path) => Ok((TomlConfig::default(), ConfigSource::Missing(path))),
        None => Ok((TomlConfig::default(), ConfigSource::Unavailable)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_policy_from_str() {
        assert_eq!("identifier".parse::<NamingPolicy>().unwrap(), NamingPolicy::Identifier);
        assert_eq!("Botanical-Slug".parse::<NamingPolicy>().unwrap(), NamingPolicy::BotanicalSlug);
        assert!("hash".parse::<NamingPolicy>().is_err());
    }

    #[test]
    fn test_naming_policy_display_round_trips() {
        for policy in [NamingPolicy::Identifier, NamingPolicy::BotanicalSlug] {
            assert_eq!(policy.to_string().parse::<NamingPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_config_path_names_module() {
        if let Some(path) = default_config_path("canopy-images") {
            assert!(path.ends_with("canopy/canopy-images.toml"));
        }
    }
}
