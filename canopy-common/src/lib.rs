//! # Canopy Common Library
//!
//! Shared code for the tree-inventory pipeline tools:
//! - Error and result types
//! - Bootstrap configuration loading (TOML)
//! - Botanical name slugging

pub mod config;
pub mod error;
pub mod slug;

pub use error::{Error, Result};
