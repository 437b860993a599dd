//! Per-class processing: identity, capture metadata and thumbnail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PipelineError;
use crate::types::CaptureMetadata;

use super::decode::ImageDecoder;
use super::hash::{PerceptualHasher, VideoHasher};
use super::metadata::{ContainerProbe, ExifReader, MetadataExtractor};
use super::sniff::SniffedType;
use super::thumbnail::ThumbnailGenerator;
use super::video::VideoTools;

/// A staged, sniffed file on its way through a handler.
#[derive(Debug)]
pub struct IngestJob {
    pub path: PathBuf,
    pub file_name: String,
    pub sniffed: SniffedType,
    pub size: u64,
    /// Relative directory the original will land in
    pub originals_dir: PathBuf,
    pub ingested_at: DateTime<Utc>,
    pixels: Option<Arc<DynamicImage>>,
}

impl IngestJob {
    pub fn new(
        path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        sniffed: SniffedType,
        size: u64,
        originals_dir: impl Into<PathBuf>,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            sniffed,
            size,
            originals_dir: originals_dir.into(),
            ingested_at,
            pixels: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Class-specific stages of the pipeline.
///
/// `content_identity` failures reject the file. Metadata and thumbnail
/// failures only degrade the record, unless metadata reports the payload
/// as undecodable.
#[async_trait]
pub trait MediaHandler: Send + Sync {
    async fn content_identity(&self, job: &mut IngestJob) -> Result<String, PipelineError>;

    async fn capture_metadata(&self, job: &IngestJob) -> Result<CaptureMetadata, PipelineError>;

    /// Encoded thumbnail bytes.
    async fn thumbnail(&self, job: &IngestJob) -> Result<Vec<u8>, PipelineError>;
}

/// Images: decode once, hash and thumbnail from the same pixels.
pub struct ImageHandler {
    decoder: ImageDecoder,
    hasher: Arc<PerceptualHasher>,
    exif: ExifReader,
    thumbnails: ThumbnailGenerator,
}

impl ImageHandler {
    pub fn new(decoder: ImageDecoder, thumbnails: ThumbnailGenerator) -> Self {
        Self {
            decoder,
            hasher: Arc::new(PerceptualHasher::new()),
            exif: ExifReader,
            thumbnails,
        }
    }

    async fn pixels(&self, job: &IngestJob) -> Result<Arc<DynamicImage>, PipelineError> {
        match &job.pixels {
            Some(pixels) => Ok(Arc::clone(pixels)),
            None => Ok(Arc::new(self.decoder.decode_file(job.path()).await?.image)),
        }
    }
}

#[async_trait]
impl MediaHandler for ImageHandler {
    async fn content_identity(&self, job: &mut IngestJob) -> Result<String, PipelineError> {
        let decoded = self.decoder.decode_file(job.path()).await?;
        tracing::trace!(
            file = %job.file_name,
            width = decoded.width,
            height = decoded.height,
            "Decoded"
        );
        let pixels = Arc::new(decoded.image);
        job.pixels = Some(Arc::clone(&pixels));

        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.identity(&pixels))
            .await
            .map_err(|e| PipelineError::Decode {
                path: job.path.clone(),
                message: format!("Task join error: {}", e),
            })
    }

    async fn capture_metadata(&self, job: &IngestJob) -> Result<CaptureMetadata, PipelineError> {
        self.exif.extract(job.path()).await
    }

    async fn thumbnail(&self, job: &IngestJob) -> Result<Vec<u8>, PipelineError> {
        let pixels = self.pixels(job).await?;
        self.thumbnails.generate_async(pixels, job.path()).await
    }
}

/// Video: identity from bytes or name, metadata and frame via ffmpeg tools.
pub struct VideoHandler {
    hasher: VideoHasher,
    probe: ContainerProbe,
    tools: VideoTools,
    frame_decoder: ImageDecoder,
    thumbnails: ThumbnailGenerator,
}

impl VideoHandler {
    pub fn new(
        hasher: VideoHasher,
        tools: VideoTools,
        frame_decoder: ImageDecoder,
        thumbnails: ThumbnailGenerator,
    ) -> Self {
        Self {
            hasher,
            probe: ContainerProbe::new(tools.clone()),
            tools,
            frame_decoder,
            thumbnails,
        }
    }
}

#[async_trait]
impl MediaHandler for VideoHandler {
    async fn content_identity(&self, job: &mut IngestJob) -> Result<String, PipelineError> {
        self.hasher
            .identity(job.path(), &job.originals_dir, &job.file_name, job.ingested_at)
            .await
    }

    async fn capture_metadata(&self, job: &IngestJob) -> Result<CaptureMetadata, PipelineError> {
        self.probe.extract(job.path()).await
    }

    async fn thumbnail(&self, job: &IngestJob) -> Result<Vec<u8>, PipelineError> {
        self.thumbnails
            .from_video(&self.tools, &self.frame_decoder, job.path())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitsConfig, ThumbnailConfig};
    use crate::pipeline::sniff::TypeSniffer;
    use image::{ImageFormat, Rgb, RgbImage};

    fn image_handler() -> ImageHandler {
        ImageHandler::new(
            ImageDecoder::new(LimitsConfig::default()),
            ThumbnailGenerator::new(ThumbnailConfig::default(), 5_000),
        )
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
    }

    async fn job_for(path: &Path) -> IngestJob {
        let sniffed = TypeSniffer::sniff_file(path).await.unwrap();
        let size = std::fs::metadata(path).unwrap().len();
        IngestJob::new(path, "photo.png", sniffed, size, "medias/2024-07-01", Utc::now())
    }

    #[tokio::test]
    async fn test_image_identity_caches_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        write_png(&path, 600, 400);

        let handler = image_handler();
        let mut job = job_for(&path).await;
        let identity = handler.content_identity(&mut job).await.unwrap();
        assert!(!identity.is_empty());
        assert!(job.pixels.is_some());

        let thumb = handler.thumbnail(&job).await.unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 256));
    }

    #[tokio::test]
    async fn test_image_identity_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();

        let mut job = job_for(&path).await;
        let err = image_handler().content_identity(&mut job).await.unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
