//! Error types for the Galgo ingestion pipeline.
//!
//! Errors are organized by stage so each rejected upload carries an
//! actionable message (file path, stage, specific issue). Per-file errors
//! never escape a batch: they are folded into a [`FailureReason`] on the
//! file's [`IngestionOutcome`](crate::types::IngestionOutcome).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Galgo operations.
#[derive(Error, Debug)]
pub enum GalgoError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Persistence collaborator errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Writing the upload to the staging area failed
    #[error("Staging failed for {path}: {message}")]
    Staging { path: PathBuf, message: String },

    /// Upload exceeded the configured size limit while streaming
    #[error("Upload too large: {file_name} (> {max_mb}MB)")]
    UploadTooLarge { file_name: String, max_mb: u64 },

    /// Content sniffing found neither a supported image nor a video container
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// Image or video payload could not be decoded or read for hashing
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// Metadata extraction failed (non-fatal)
    #[error("Metadata extraction failed for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Thumbnail generation failed (non-fatal)
    #[error("Thumbnail generation failed for {path}: {message}")]
    Thumbnail { path: PathBuf, message: String },

    /// External video tool (ffprobe/ffmpeg) failed or is misconfigured
    #[error("{tool} failed for {path}: {message}")]
    Tool {
        tool: String,
        path: PathBuf,
        message: String,
    },

    /// The persistence collaborator refused the record
    #[error("Persisting {file_name} failed: {source}")]
    Store {
        file_name: String,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    /// Classify this error for the per-file outcome.
    pub fn failure_reason(&self) -> FailureReason {
        let message = self.to_string();
        match self {
            Self::Staging { .. } | Self::UploadTooLarge { .. } => FailureReason::Staging(message),
            Self::UnsupportedFormat { .. } => FailureReason::UnsupportedType(message),
            Self::Store {
                source: StoreError::AlreadyExists { .. },
                ..
            } => FailureReason::DuplicateContent(message),
            Self::Store { .. } => FailureReason::Persistence(message),
            Self::Decode { .. }
            | Self::ImageTooLarge { .. }
            | Self::Timeout { .. }
            | Self::Metadata { .. }
            | Self::Thumbnail { .. }
            | Self::Tool { .. } => FailureReason::Decode(message),
        }
    }
}

/// Errors reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Uniqueness constraint over (identity, size, capture timestamp) violated
    #[error("media already exists: {content_identity}")]
    AlreadyExists { content_identity: String },

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Why a single upload was rejected.
///
/// Serialized as `{"kind": "...", "message": "..."}` on the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// The upload could not be written to the staging area
    Staging(String),
    /// The content is not an accepted image or video
    UnsupportedType(String),
    /// The payload is corrupt or unreadable
    Decode(String),
    /// Identical content is already stored
    DuplicateContent(String),
    /// The persistence collaborator failed for another reason
    Persistence(String),
}

impl FailureReason {
    /// Stable snake_case name of the failure class, as serialized.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Staging(_) => "staging",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::Decode(_) => "decode",
            Self::DuplicateContent(_) => "duplicate_content",
            Self::Persistence(_) => "persistence",
        }
    }

    /// The human-readable message attached to this failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Staging(m)
            | Self::UnsupportedType(m)
            | Self::Decode(m)
            | Self::DuplicateContent(m)
            | Self::Persistence(m) => m,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Convenience type alias for Galgo results.
pub type Result<T> = std::result::Result<T, GalgoError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_store_error_is_distinct_reason() {
        let err = PipelineError::Store {
            file_name: "beach.jpg".to_string(),
            source: StoreError::AlreadyExists {
                content_identity: "abc".to_string(),
            },
        };
        assert!(matches!(
            err.failure_reason(),
            FailureReason::DuplicateContent(_)
        ));
        assert!(err.failure_reason().message().contains("already exists"));
    }

    #[test]
    fn test_backend_store_error_is_persistence_reason() {
        let err = PipelineError::Store {
            file_name: "beach.jpg".to_string(),
            source: StoreError::Backend("connection reset".to_string()),
        };
        assert!(matches!(err.failure_reason(), FailureReason::Persistence(_)));
    }

    #[test]
    fn test_unsupported_maps_to_unsupported_type() {
        let err = PipelineError::UnsupportedFormat {
            path: PathBuf::from("/tmp/notes.txt"),
            format: "application/octet-stream".to_string(),
        };
        assert!(matches!(
            err.failure_reason(),
            FailureReason::UnsupportedType(_)
        ));
    }

    #[test]
    fn test_failure_reason_serializes_kind_and_message() {
        let reason = FailureReason::Decode("bad huffman table".to_string());
        let json = serde_json::to_string(&reason).unwrap();
        assert_eq!(json, r#"{"kind":"decode","message":"bad huffman table"}"#);
    }
}
