//! Sub-configuration structs with their defaults.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where uploads, originals and thumbnails live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory; every other path is relative to it
    pub base_dir: PathBuf,

    /// Staging directory name for in-flight uploads
    pub staging_dir: String,

    /// Directory name for date-partitioned originals
    pub medias_dir: String,

    /// Directory name for date-partitioned thumbnails
    pub thumbnails_dir: String,

    /// Static preview served when a record has no thumbnail
    pub fallback_thumbnail: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("~/.galgo/uploads"),
            staging_dir: "tmp".to_string(),
            medias_dir: "medias".to_string(),
            thumbnails_dir: "thumbnails".to_string(),
            fallback_thumbnail: PathBuf::from("static/cover.webp"),
        }
    }
}

/// Upload streaming and batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of uploads processed concurrently within a batch
    pub parallel_workers: usize,

    /// Bytes read from the upload stream per write
    pub chunk_size: usize,

    /// Maximum upload size in megabytes
    pub max_file_size_mb: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            chunk_size: 64 * 1024,
            max_file_size_mb: 500,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Timeout for a single ffprobe/ffmpeg invocation in milliseconds
    pub probe_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            probe_timeout_ms: 30000,
        }
    }
}

/// How video identities are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoHashStrategy {
    /// BLAKE3 over the uploaded bytes (content-addressed)
    #[default]
    Content,
    /// BLAKE3 over storage directory, filename and ingestion instant.
    /// Not content-addressed: re-uploads never collide.
    NameTimestamp,
}

/// Content identity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    pub video_strategy: VideoHashStrategy,
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Whether to generate thumbnails
    pub enabled: bool,

    /// Target width in pixels
    pub width: u32,

    /// Target height in pixels
    pub height: u32,

    /// Output format: "webp", "jpeg" or "png"
    pub format: String,

    /// Offset into a video, in seconds, of the frame used as its preview
    pub video_frame_offset_secs: f64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 256,
            height: 256,
            format: "webp".to_string(),
            video_frame_offset_secs: 1.0,
        }
    }
}

impl ThumbnailConfig {
    /// Resolve the configured output format.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self.format.to_lowercase().as_str() {
            "webp" => Some(ImageFormat::WebP),
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    /// File extension used for stored thumbnails.
    pub fn extension(&self) -> &'static str {
        match self.image_format() {
            Some(ImageFormat::Jpeg) => "jpg",
            Some(ImageFormat::Png) => "png",
            _ => "webp",
        }
    }
}

/// External video tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// ffprobe executable (name on PATH or absolute path)
    pub ffprobe_path: String,

    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg_path: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
