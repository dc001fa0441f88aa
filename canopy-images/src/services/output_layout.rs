//! Output directory layout
//!
//! ```text
//! <image_dir>/           normalized images
//! <image_dir>/other/     error bodies of failed downloads, for inspection
//! <image_dir>/csv/       default home of the outcome log
//! ```

use std::path::{Path, PathBuf};

use canopy_common::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    image_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn other_dir(&self) -> PathBuf {
        self.image_dir.join("other")
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.image_dir.join("csv")
    }

    /// Create every output directory
    ///
    /// Must run once before any worker starts. Failure aborts the batch.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.image_dir.clone(), self.other_dir(), self.csv_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| Error::Setup {
                path: dir.clone(),
                source,
            })?;
        }
        tracing::debug!(image_dir = %self.image_dir.display(), "Output directories ready");
        Ok(())
    }
}
