//! Galgo Core - media ingestion library.
//!
//! Galgo accepts uploaded image and video files, stages them to disk,
//! classifies them by content, derives a content identity, extracts
//! capture metadata, renders a thumbnail and hands a [`MediaRecord`] to a
//! persistence collaborator.
//!
//! # Architecture
//!
//! ```text
//! Upload → Stage → Sniff → Identity → Metadata → Thumbnail → Place → Store
//! ```
//!
//! Every upload produces exactly one [`IngestionOutcome`]; per-file failures
//! never abort a batch.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use galgo_core::{Config, Ingestor, MemoryStore, UploadRequest};
//!
//! #[tokio::main]
//! async fn main() -> galgo_core::Result<()> {
//!     let config = Config::load()?;
//!     let ingestor = Ingestor::new(&config, Arc::new(MemoryStore::new()))?;
//!
//!     let upload = UploadRequest::open("./holiday.jpg".as_ref()).await?;
//!     let outcomes = ingestor.ingest_batch(vec![upload]).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcomes)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{
    ConfigError, FailureReason, GalgoError, PipelineError, PipelineResult, Result, StoreError,
};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{Ingestor, StorageLayout, UploadRequest};
pub use store::{MediaStore, MemoryStore};
pub use types::{BatchStats, CaptureMetadata, IngestionOutcome, MediaClass, MediaRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
