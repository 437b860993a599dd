//! Local upload sources: expand CLI paths into the files to ingest.
//!
//! No extension filter is applied; content sniffing decides what is
//! accepted.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Finds candidate files under a set of paths.
#[derive(Debug, Clone, Default)]
pub struct FileDiscovery {
    include_hidden: bool,
}

/// Information about a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also descend into and return dot-files.
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Discover files under every path, sorted and deduplicated.
    ///
    /// A path naming a file is returned as-is, even when hidden.
    pub fn discover_all(&self, paths: &[PathBuf]) -> Vec<DiscoveredFile> {
        let mut files: Vec<DiscoveredFile> =
            paths.iter().flat_map(|p| self.discover(p)).collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);
        files
    }

    /// Discover files at a single path.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            return std::fs::metadata(path)
                .map(|meta| {
                    vec![DiscoveredFile {
                        path: path.to_path_buf(),
                        size: meta.len(),
                    }]
                })
                .unwrap_or_default();
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || self.include_hidden || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(_) => continue,
            };
            files.push(DiscoveredFile {
                path: entry.into_path(),
                size,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
