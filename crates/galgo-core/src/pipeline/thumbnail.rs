//! Fixed-size thumbnails for images and video frames.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::ThumbnailConfig;
use crate::error::PipelineError;
use crate::pipeline::decode::ImageDecoder;
use crate::pipeline::video::VideoTools;

/// Renders and encodes thumbnails of exactly the configured dimensions.
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    config: ThumbnailConfig,
    format: ImageFormat,
    timeout_ms: u64,
}

impl ThumbnailGenerator {
    /// Create a generator. An unrecognised format falls back to WebP;
    /// config validation rejects it before this point.
    pub fn new(config: ThumbnailConfig, timeout_ms: u64) -> Self {
        let format = config.image_format().unwrap_or(ImageFormat::WebP);
        Self {
            config,
            format,
            timeout_ms,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Extension for stored thumbnails.
    pub fn extension(&self) -> &'static str {
        self.config.extension()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Scale and crop to exactly the target dimensions.
    ///
    /// Large sources are first filled to twice the target, then the center
    /// is cropped out. Smaller sources are filled straight to the target.
    pub fn render(&self, image: &DynamicImage) -> DynamicImage {
        let (target_w, target_h) = self.dimensions();
        let (width, height) = image.dimensions();

        let double_w = target_w.saturating_mul(2);
        let double_h = target_h.saturating_mul(2);
        if width >= double_w && height >= double_h {
            let scaled = image.resize_to_fill(double_w, double_h, FilterType::Lanczos3);
            scaled.crop_imm(
                (double_w - target_w) / 2,
                (double_h - target_h) / 2,
                target_w,
                target_h,
            )
        } else {
            image.resize_to_fill(target_w, target_h, FilterType::Lanczos3)
        }
    }

    /// Encode a rendered thumbnail in the configured format.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        let pixels = match self.format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
            _ => DynamicImage::ImageRgba8(image.to_rgba8()),
        };
        let mut buffer = Cursor::new(Vec::new());
        pixels.write_to(&mut buffer, self.format)?;
        Ok(buffer.into_inner())
    }

    /// Render and encode synchronously.
    pub fn generate(&self, image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        self.encode(&self.render(image))
    }

    /// Render and encode on the blocking pool under the decode timeout.
    pub async fn generate_async(
        &self,
        image: Arc<DynamicImage>,
        path: &Path,
    ) -> Result<Vec<u8>, PipelineError> {
        let generator = self.clone();
        let result = timeout(
            Duration::from_millis(self.timeout_ms),
            tokio::task::spawn_blocking(move || generator.generate(&image)),
        )
        .await;

        match result {
            Ok(Ok(Ok(bytes))) => Ok(bytes),
            Ok(Ok(Err(e))) => Err(PipelineError::Thumbnail {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Ok(Err(e)) => Err(PipelineError::Thumbnail {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "thumbnail".to_string(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    /// Thumbnail of a video: one frame at the configured offset, then the
    /// same render/encode path as images.
    ///
    /// The frame goes to an exclusively created temp file outside the
    /// staging area, removed when this call returns.
    pub async fn from_video(
        &self,
        tools: &VideoTools,
        decoder: &ImageDecoder,
        staged: &Path,
    ) -> Result<Vec<u8>, PipelineError> {
        let scratch = tempfile::Builder::new()
            .prefix("galgo-frame-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| PipelineError::Thumbnail {
                path: staged.to_path_buf(),
                message: format!("Cannot create frame file: {}", e),
            })?
            .into_temp_path();

        tools
            .extract_frame(staged, self.config.video_frame_offset_secs, &scratch)
            .await?;
        let frame = decoder.decode_file(&scratch).await?;
        self.generate_async(Arc::new(frame.image), staged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn generator(width: u32, height: u32, format: &str) -> ThumbnailGenerator {
        let config = ThumbnailConfig {
            width,
            height,
            format: format.to_string(),
            ..ThumbnailConfig::default()
        };
        ThumbnailGenerator::new(config, 5_000)
    }

    fn pattern(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_exact_dimensions_for_any_source() {
        let generator = generator(64, 48, "webp");
        for (w, h) in [(1000, 500), (300, 900), (130, 97), (10, 10), (64, 48), (1, 400)] {
            let thumb = generator.render(&pattern(w, h));
            assert_eq!(thumb.dimensions(), (64, 48), "source {w}x{h}");
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let generator = generator(32, 32, "png");
        let source = pattern(200, 150);
        assert_eq!(
            generator.generate(&source).unwrap(),
            generator.generate(&source).unwrap()
        );
    }

    #[test]
    fn test_webp_output() {
        let bytes = generator(64, 64, "webp").generate(&pattern(200, 200)).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_jpeg_output_decodes_to_target() {
        let bytes = generator(40, 30, "jpeg").generate(&pattern(400, 400)).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[tokio::test]
    async fn test_generate_async() {
        let generator = generator(16, 16, "png");
        let bytes = generator
            .generate_async(Arc::new(pattern(100, 50)), Path::new("wide.png"))
            .await
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[tokio::test]
    async fn test_video_frame_never_touches_staged_siblings() {
        use crate::config::{LimitsConfig, VideoConfig};

        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("clip.mp4");
        std::fs::write(&staged, b"\0\0\0\x20ftypisom").unwrap();
        let sibling = dir.path().join("clip.mp4.frame.png");
        std::fs::write(&sibling, b"another upload").unwrap();

        let video = VideoConfig {
            ffprobe_path: "/nonexistent/galgo-ffprobe".to_string(),
            ffmpeg_path: "/nonexistent/galgo-ffmpeg".to_string(),
        };
        let limits = LimitsConfig::default();
        let tools = VideoTools::new(&video, &limits).unwrap();
        let decoder = ImageDecoder::new(limits);

        let result = generator(32, 32, "png")
            .from_video(&tools, &decoder, &staged)
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&sibling).unwrap(), b"another upload");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
