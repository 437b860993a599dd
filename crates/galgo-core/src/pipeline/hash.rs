//! Content identities: perceptual hashes for images, BLAKE3 for video.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use blake3::Hasher as Blake3Hasher;
use chrono::{DateTime, SecondsFormat, Utc};
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::VideoHashStrategy;
use crate::error::PipelineError;

/// Perceptual hasher producing filename-safe identities for images.
///
/// The hasher is pre-configured once and shared; hashing a decoded image
/// is pure and deterministic.
pub struct PerceptualHasher {
    phash_hasher: image_hasher::Hasher,
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let phash_hasher = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(16, 16)
            .to_hasher();
        Self { phash_hasher }
    }

    /// Identity of a decoded image: URL-safe base64 of the hash bits.
    ///
    /// Similar images produce similar (often identical) identities, so
    /// re-encoded copies of the same picture collapse to one stored file.
    pub fn identity(&self, image: &DynamicImage) -> String {
        let hash = self.phash_hasher.hash_image(image);
        URL_SAFE_NO_PAD.encode(hash.as_bytes())
    }
}

/// Produces video identities according to the configured strategy.
#[derive(Debug, Clone)]
pub struct VideoHasher {
    strategy: VideoHashStrategy,
    timeout_ms: u64,
}

impl VideoHasher {
    pub fn new(strategy: VideoHashStrategy, timeout_ms: u64) -> Self {
        Self {
            strategy,
            timeout_ms,
        }
    }

    /// Identity for a staged video.
    ///
    /// `originals_dir` and `ingested_at` feed only the name/timestamp
    /// strategy.
    pub async fn identity(
        &self,
        path: &Path,
        originals_dir: &Path,
        file_name: &str,
        ingested_at: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        match self.strategy {
            VideoHashStrategy::Content => self.content_identity(path).await,
            VideoHashStrategy::NameTimestamp => {
                Ok(name_timestamp_hash(originals_dir, file_name, ingested_at))
            }
        }
    }

    async fn content_identity(&self, path: &Path) -> Result<String, PipelineError> {
        let owned = path.to_path_buf();
        let result = timeout(
            Duration::from_millis(self.timeout_ms),
            tokio::task::spawn_blocking(move || content_hash(&owned)),
        )
        .await;

        match result {
            Ok(Ok(Ok(hash))) => Ok(hash),
            Ok(Ok(Err(e))) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot hash file: {}", e),
            }),
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "hash".to_string(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }
}

/// Streaming BLAKE3 hash of file contents, lowercase hex.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Blake3Hasher::new();

    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

fn name_timestamp_hash(originals_dir: &Path, file_name: &str, ingested_at: DateTime<Utc>) -> String {
    let mut hasher = Blake3Hasher::new();
    hasher.update(originals_dir.to_string_lossy().as_bytes());
    hasher.update(b"/");
    hasher.update(file_name.as_bytes());
    hasher.update(
        ingested_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 64])
        }))
    }

    #[test]
    fn test_identity_consistency() {
        let hasher = PerceptualHasher::new();
        let img = gradient(100, 80);
        assert_eq!(hasher.identity(&img), hasher.identity(&img));
    }

    #[test]
    fn test_identity_is_filename_safe() {
        let hasher = PerceptualHasher::new();
        let identity = hasher.identity(&gradient(64, 64));
        assert!(!identity.is_empty());
        assert!(identity
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_identity_stable_across_stored_bytes() {
        let hasher = PerceptualHasher::new();
        let img = gradient(120, 90);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let reloaded = image::load_from_memory(buf.get_ref()).unwrap();
        assert_eq!(hasher.identity(&img), hasher.identity(&reloaded));
    }

    #[tokio::test]
    async fn test_video_content_hash_ignores_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let hasher = VideoHasher::new(VideoHashStrategy::Content, 5_000);
        let now = Utc::now();
        let id_a = hasher.identity(&a, Path::new("medias"), "a.mp4", now).await.unwrap();
        let id_b = hasher.identity(&b, Path::new("medias"), "b.mp4", now).await.unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(id_a.len(), 64);
    }

    #[tokio::test]
    async fn test_video_name_timestamp_varies_with_instant() {
        let hasher = VideoHasher::new(VideoHashStrategy::NameTimestamp, 5_000);
        let first = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 1).unwrap();
        let dir = Path::new("medias/2024-07-01");

        let id_1 = hasher.identity(Path::new("unused"), dir, "clip.mp4", first).await.unwrap();
        let id_2 = hasher.identity(Path::new("unused"), dir, "clip.mp4", second).await.unwrap();
        assert_ne!(id_1, id_2);
    }

    #[tokio::test]
    async fn test_video_content_hash_missing_file() {
        let hasher = VideoHasher::new(VideoHashStrategy::Content, 5_000);
        let err = hasher
            .identity(Path::new("/nonexistent/clip.mp4"), Path::new("medias"), "clip.mp4", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
