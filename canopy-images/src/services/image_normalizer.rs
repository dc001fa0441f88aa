//! Fit-inside resizing of downloaded photographs
//!
//! Images are scaled down so neither edge exceeds the bounding box, keeping
//! aspect ratio. Smaller images are never upscaled. The output keeps the
//! input's encoding format.

use std::io::Cursor;
use std::path::Path;

use image::{imageops::FilterType, ImageFormat, ImageReader};

use crate::error::FetchError;

pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Re-encoded image and its final geometry
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub resized: bool,
}

/// Dimensions of `width`x`height` fitted inside a `max`x`max` box
pub fn fit_inside(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_dimension: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl ImageNormalizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode, fit and re-encode an in-memory image
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<NormalizedImage, FetchError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FetchError::Normalize(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| FetchError::Normalize("unrecognized image format".to_string()))?;
        let decoded = reader
            .decode()
            .map_err(|e| FetchError::Normalize(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let (target_width, target_height) = fit_inside(width, height, self.max_dimension);
        let resized = (target_width, target_height) != (width, height);

        let output = if resized {
            decoded.resize(target_width, target_height, FilterType::Lanczos3)
        } else {
            decoded
        };

        let mut buf = Vec::new();
        output
            .write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| FetchError::Normalize(e.to_string()))?;

        Ok(NormalizedImage {
            bytes: buf,
            width: output.width(),
            height: output.height(),
            format,
            resized,
        })
    }

    /// Normalize the image at `path` in place
    pub async fn normalize_file(&self, path: &Path) -> Result<NormalizedImage, FetchError> {
        let bytes = tokio::fs::read(path).await?;
        let normalizer = *self;

        // Decode and Lanczos resampling are CPU-bound
        let normalized = tokio::task::spawn_blocking(move || normalizer.normalize_bytes(&bytes))
            .await
            .map_err(|e| FetchError::Normalize(format!("resize task failed: {}", e)))??;

        tokio::fs::write(path, &normalized.bytes).await?;
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_fit_inside_landscape() {
        assert_eq!(fit_inside(4000, 3000, 1024), (1024, 768));
    }

    #[test]
    fn test_fit_inside_portrait() {
        assert_eq!(fit_inside(1500, 3000, 1024), (512, 1024));
    }

    #[test]
    fn test_fit_inside_never_upscales() {
        assert_eq!(fit_inside(640, 480, 1024), (640, 480));
        assert_eq!(fit_inside(1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn test_fit_inside_extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_inside(10_000, 2, 100), (100, 1));
    }

    #[test]
    fn test_normalize_shrinks_large_image() {
        let normalizer = ImageNormalizer::new(64);
        let result = normalizer.normalize_bytes(&png(200, 100)).unwrap();

        assert!(result.resized);
        assert_eq!((result.width, result.height), (64, 32));
        assert_eq!(result.format, ImageFormat::Png);

        let reloaded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(reloaded.dimensions(), (64, 32));
    }

    #[test]
    fn test_normalize_leaves_small_image_size() {
        let normalizer = ImageNormalizer::new(64);
        let result = normalizer.normalize_bytes(&png(40, 20)).unwrap();

        assert!(!result.resized);
        assert_eq!((result.width, result.height), (40, 20));
    }

    #[test]
    fn test_normalize_rejects_non_image() {
        let normalizer = ImageNormalizer::default();
        let result = normalizer.normalize_bytes(b"<html>Not Found</html>");
        assert!(matches!(result, Err(FetchError::Normalize(_))));
    }

    #[tokio::test]
    async fn test_normalize_file_overwrites_in_place() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("1.png");
        std::fs::write(&path, png(300, 300)).unwrap();

        ImageNormalizer::new(100).normalize_file(&path).await.unwrap();

        let on_disk = image::open(&path).unwrap();
        assert_eq!(on_disk.dimensions(), (100, 100));
    }
}
