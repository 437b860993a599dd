//! CLI enum types for the ingest command: output format, video hash strategy.

use clap::ValueEnum;
use galgo_core::config::VideoHashStrategy;

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for galgo_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Jsonl => Self::JsonLines,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// How video identities are derived.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum VideoHash {
    /// BLAKE3 over the file bytes
    Content,
    /// BLAKE3 over destination directory, filename and ingestion time
    NameTimestamp,
}

impl From<VideoHash> for VideoHashStrategy {
    fn from(hash: VideoHash) -> Self {
        match hash {
            VideoHash::Content => Self::Content,
            VideoHash::NameTimestamp => Self::NameTimestamp,
        }
    }
}
