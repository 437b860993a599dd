//! Media ingestion pipeline components.
//!
//! This module contains all the stages of the ingestion pipeline:
//! - **ingest**: Stream uploads into the staging area
//! - **sniff**: Classify staged files by content
//! - **decode**: Decode images with limits and timeouts
//! - **hash**: Content identities for images and video
//! - **metadata**: Capture time and location from EXIF / containers
//! - **thumbnail**: Fixed-size previews
//! - **video**: ffprobe / ffmpeg wrappers
//! - **handler**: Per-class dispatch of the stages above
//! - **layout**: Where staged files, originals and thumbnails live
//! - **processor**: Orchestrates the full pipeline
//! - **discovery**: Find local files to ingest

pub mod decode;
pub mod discovery;
pub mod handler;
pub mod hash;
pub mod ingest;
pub mod layout;
pub mod metadata;
pub mod processor;
pub mod sniff;
pub mod thumbnail;
pub mod video;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use handler::{ImageHandler, IngestJob, MediaHandler, VideoHandler};
pub use hash::{PerceptualHasher, VideoHasher};
pub use ingest::{Placement, StagedFile, StreamIngestor, UploadRequest};
pub use layout::StorageLayout;
pub use metadata::{ContainerProbe, ExifReader, ExifTags, MetadataExtractor};
pub use processor::Ingestor;
pub use sniff::{SniffedType, TypeSniffer};
pub use thumbnail::ThumbnailGenerator;
pub use video::VideoTools;
