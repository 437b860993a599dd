//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.parallel_workers must be > 0".into(),
            ));
        }
        if self.ingest.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.chunk_size must be > 0".into(),
            ));
        }
        if self.ingest.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.probe_timeout_ms must be > 0".into(),
            ));
        }
        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.width and thumbnail.height must be > 0".into(),
            ));
        }
        if self.thumbnail.image_format().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "thumbnail.format must be one of webp, jpeg, png (got {:?})",
                self.thumbnail.format
            )));
        }
        if !self.thumbnail.video_frame_offset_secs.is_finite()
            || self.thumbnail.video_frame_offset_secs < 0.0
        {
            return Err(ConfigError::ValidationError(
                "thumbnail.video_frame_offset_secs must be >= 0".into(),
            ));
        }
        for (key, name) in [
            ("storage.staging_dir", &self.storage.staging_dir),
            ("storage.medias_dir", &self.storage.medias_dir),
            ("storage.thumbnails_dir", &self.storage.thumbnails_dir),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) || name == ".." || name == "." {
                return Err(ConfigError::ValidationError(format!(
                    "{key} must be a single directory name"
                )));
            }
        }
        if self.storage.staging_dir == self.storage.medias_dir
            || self.storage.staging_dir == self.storage.thumbnails_dir
            || self.storage.medias_dir == self.storage.thumbnails_dir
        {
            return Err(ConfigError::ValidationError(
                "storage directories must be distinct".into(),
            ));
        }
        Ok(())
    }
}
