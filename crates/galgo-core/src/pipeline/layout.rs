//! On-disk layout: staging area, date-partitioned originals and thumbnails.
//!
//! ```text
//! <base>/tmp/<original-filename>
//! <base>/medias/<YYYY-MM-DD>/<identity>.<ext>
//! <base>/thumbnails/<YYYY-MM-DD>/<identity>.<ext>
//! ```

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::config::{Config, StorageConfig};
use crate::types::MediaRecord;

/// Resolves every path the pipeline touches relative to one base directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    staging_dir: String,
    medias_dir: String,
    thumbnails_dir: String,
    fallback_thumbnail: PathBuf,
}

impl StorageLayout {
    /// Build a layout rooted at `root` using the directory names from `storage`.
    pub fn new(root: impl Into<PathBuf>, storage: &StorageConfig) -> Self {
        Self {
            root: root.into(),
            staging_dir: storage.staging_dir.clone(),
            medias_dir: storage.medias_dir.clone(),
            thumbnails_dir: storage.thumbnails_dir.clone(),
            fallback_thumbnail: storage.fallback_thumbnail.clone(),
        }
    }

    /// Build a layout rooted at the configured (tilde-expanded) base directory.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.base_dir(), &config.storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the staging directory.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(&self.staging_dir)
    }

    /// Relative path of a stored original.
    pub fn original_path(&self, date: NaiveDate, identity: &str, extension: &str) -> PathBuf {
        Self::partitioned(&self.medias_dir, date, identity, extension)
    }

    /// Relative path of a stored thumbnail.
    pub fn thumbnail_path(&self, date: NaiveDate, identity: &str, extension: &str) -> PathBuf {
        Self::partitioned(&self.thumbnails_dir, date, identity, extension)
    }

    /// Relative directory of originals for a given day.
    pub fn originals_dir(&self, date: NaiveDate) -> PathBuf {
        PathBuf::from(&self.medias_dir).join(date.format("%Y-%m-%d").to_string())
    }

    fn partitioned(dir: &str, date: NaiveDate, identity: &str, extension: &str) -> PathBuf {
        PathBuf::from(dir)
            .join(date.format("%Y-%m-%d").to_string())
            .join(format!("{identity}.{extension}"))
    }

    /// Resolve a relative path against the base directory.
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Create the parent directory of a relative path.
    ///
    /// Create-if-absent semantics: concurrent callers racing on the same
    /// directory all succeed.
    pub async fn ensure_parent(&self, relative: &Path) -> std::io::Result<PathBuf> {
        let absolute = self.absolute(relative);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(absolute)
    }

    /// The preview a reader should serve for `record`.
    ///
    /// Substitutes the static fallback when the record has no thumbnail; the
    /// fallback is never written onto the record itself.
    pub fn thumbnail_or_fallback<'a>(&'a self, record: &'a MediaRecord) -> &'a Path {
        record
            .thumbnail_path
            .as_deref()
            .unwrap_or(self.fallback_thumbnail.as_path())
    }
}
