//! Image decoding with format detection, a dimension guard and timeout support.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Format detected from the content
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode a staged file.
    pub async fn decode_file(&self, path: &Path) -> Result<DecodedImage, PipelineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot read file: {}", e),
            })?;
        self.decode_from_bytes(bytes, path).await
    }

    /// Decode an image from an in-memory byte buffer with validation and timeout.
    ///
    /// Decoding runs on the blocking pool; images larger than
    /// `max_image_dimension` on either side are rejected.
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        path: &Path,
    ) -> Result<DecodedImage, PipelineError> {
        let path_owned = path.to_path_buf();
        let max_dim = self.limits.max_image_dimension;
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || Self::decode_bytes_sync(bytes, &path_owned, max_dim)),
        )
        .await;

        match decode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    ///
    /// Dimensions are checked from the header before the pixel buffer is
    /// allocated.
    pub(crate) fn decode_bytes_sync(
        bytes: Vec<u8>,
        path: &Path,
        max_dim: u32,
    ) -> Result<DecodedImage, PipelineError> {
        use std::io::Cursor;

        let decode_error = |message: String| PipelineError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let reader = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| decode_error(format!("Cannot detect image format: {}", e)))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| decode_error(e.to_string()))?;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }

        let reader = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| decode_error(format!("Cannot detect image format: {}", e)))?;
        let format = reader
            .format()
            .ok_or_else(|| decode_error("Unrecognized image format".to_string()))?;
        let image = reader.decode().map_err(|e| decode_error(e.to_string()))?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_format_detected_by_content() {
        let bytes = png_bytes(8, 6);
        let result =
            ImageDecoder::decode_bytes_sync(bytes, Path::new("misnamed.jpg"), 10_000).unwrap();
        assert_eq!(result.format, ImageFormat::Png);
        assert_eq!((result.width, result.height), (8, 6));
    }

    #[test]
    fn test_dimension_guard() {
        let bytes = png_bytes(64, 8);
        let err = ImageDecoder::decode_bytes_sync(bytes, Path::new("wide.png"), 32)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::ImageTooLarge {
                width: 64,
                max_dim: 32,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_decode_error() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let mut bytes = png_bytes(16, 16);
        bytes.truncate(40);

        let err = decoder
            .decode_from_bytes(bytes, Path::new("broken.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_decode_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo");
        std::fs::write(&path, png_bytes(20, 10)).unwrap();

        let decoder = ImageDecoder::new(LimitsConfig::default());
        let decoded = decoder.decode_file(&path).await.unwrap();
        assert_eq!(decoded.image.dimensions(), (20, 10));
    }
}
