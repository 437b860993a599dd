//! Pipeline orchestration - wires together all ingestion stages.
//!
//! Per upload: stage → sniff → identity → metadata → thumbnail → place →
//! persist. Each upload yields exactly one [`IngestionOutcome`]; only a
//! staging directory that cannot be created fails a whole batch.

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::Config;
use crate::error::{ConfigError, GalgoError, PipelineError};
use crate::store::MediaStore;
use crate::types::{BatchStats, CaptureMetadata, IngestionOutcome, MediaClass, MediaRecord};

use super::decode::ImageDecoder;
use super::handler::{ImageHandler, IngestJob, MediaHandler, VideoHandler};
use super::hash::VideoHasher;
use super::ingest::{Placement, StreamIngestor, UploadBody, UploadRequest};
use super::layout::StorageLayout;
use super::sniff::TypeSniffer;
use super::thumbnail::ThumbnailGenerator;
use super::video::VideoTools;

/// The ingestion service: turns uploads into stored media and records.
pub struct Ingestor {
    layout: StorageLayout,
    stager: StreamIngestor,
    image: Box<dyn MediaHandler>,
    video: Box<dyn MediaHandler>,
    store: Arc<dyn MediaStore>,
    thumbnails: Option<&'static str>,
    parallel_workers: usize,
    placements: PlacementLocks,
}

impl Ingestor {
    /// Build an ingestor from configuration and a persistence collaborator.
    pub fn new(config: &Config, store: Arc<dyn MediaStore>) -> Result<Self, ConfigError> {
        let layout = StorageLayout::from_config(config);
        let stager = StreamIngestor::new(layout.staging_dir(), &config.ingest);
        let decoder = ImageDecoder::new(config.limits.clone());
        let thumbnail_gen =
            ThumbnailGenerator::new(config.thumbnail.clone(), config.limits.decode_timeout_ms);
        let tools = VideoTools::new(&config.video, &config.limits)?;
        let video_hasher =
            VideoHasher::new(config.hash.video_strategy, config.limits.probe_timeout_ms);

        Ok(Self {
            thumbnails: thumbnail_gen
                .is_enabled()
                .then(|| thumbnail_gen.extension()),
            image: Box::new(ImageHandler::new(decoder.clone(), thumbnail_gen.clone())),
            video: Box::new(VideoHandler::new(
                video_hasher,
                tools,
                decoder,
                thumbnail_gen,
            )),
            layout,
            stager,
            store,
            parallel_workers: config.ingest.parallel_workers.max(1),
            placements: PlacementLocks::default(),
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Create the staging directory.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        self.stager
            .prepare()
            .await
            .map_err(|e| PipelineError::Staging {
                path: self.stager.staging_dir().to_path_buf(),
                message: format!("Cannot create staging directory: {e}"),
            })
    }

    /// Ingest a single upload into today's partition.
    pub async fn ingest(&self, upload: UploadRequest) -> IngestionOutcome {
        self.ingest_on(upload, Local::now().date_naive()).await
    }

    /// Ingest a single upload into the partition for `date`.
    pub async fn ingest_on(&self, upload: UploadRequest, date: NaiveDate) -> IngestionOutcome {
        let (file_name, body) = upload.into_parts();
        let start = Instant::now();

        match self.process(&file_name, body, date, Utc::now()).await {
            Ok(record) => {
                tracing::debug!(
                    "Ingested {:?} as {} in {:?}",
                    file_name,
                    record.content_identity,
                    start.elapsed()
                );
                IngestionOutcome::Ingested(Box::new(record))
            }
            Err(e) => {
                tracing::warn!("Rejected {:?}: {}", file_name, e);
                IngestionOutcome::Rejected {
                    file_name,
                    reason: e.failure_reason(),
                }
            }
        }
    }

    /// Ingest a batch into today's partition.
    pub async fn ingest_batch(
        &self,
        uploads: Vec<UploadRequest>,
    ) -> Result<Vec<IngestionOutcome>, GalgoError> {
        self.ingest_batch_on(uploads, Local::now().date_naive())
            .await
    }

    /// Ingest a batch, up to `parallel_workers` at a time, preserving input
    /// order in the result.
    pub async fn ingest_batch_on(
        &self,
        uploads: Vec<UploadRequest>,
        date: NaiveDate,
    ) -> Result<Vec<IngestionOutcome>, GalgoError> {
        self.prepare().await?;

        let start = Instant::now();
        let outcomes: Vec<IngestionOutcome> = stream::iter(uploads)
            .map(|upload| self.ingest_on(upload, date))
            .buffered(self.parallel_workers)
            .collect()
            .await;

        let stats = BatchStats::from_outcomes(&outcomes, start.elapsed());
        tracing::info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            bytes = stats.total_bytes,
            "Batch complete in {:.2}s",
            stats.total_seconds
        );
        Ok(outcomes)
    }

    fn handler_for(&self, class: MediaClass) -> Option<&dyn MediaHandler> {
        match class {
            MediaClass::Image => Some(self.image.as_ref()),
            MediaClass::Video => Some(self.video.as_ref()),
            MediaClass::Unsupported => None,
        }
    }

    async fn process(
        &self,
        file_name: &str,
        body: UploadBody,
        date: NaiveDate,
        ingested_at: DateTime<Utc>,
    ) -> Result<MediaRecord, PipelineError> {
        let staged = self.stager.stage(file_name, body).await?;

        let sniffed = TypeSniffer::sniff_file(staged.path()).await?;
        let handler =
            self.handler_for(sniffed.class)
                .ok_or_else(|| PipelineError::UnsupportedFormat {
                    path: PathBuf::from(file_name),
                    format: "content is neither a supported image nor a video".to_string(),
                })?;
        tracing::trace!("  Sniffed {:?}: {}", file_name, sniffed.mime_type);

        let mut job = IngestJob::new(
            staged.path(),
            file_name,
            sniffed,
            staged.size(),
            self.layout.originals_dir(date),
            ingested_at,
        );

        let hash_start = Instant::now();
        let identity = handler.content_identity(&mut job).await?;
        tracing::trace!("  Identity: {:?}", hash_start.elapsed());

        let capture = match handler.capture_metadata(&job).await {
            Ok(capture) => capture,
            Err(e @ PipelineError::Decode { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!("{}", e);
                CaptureMetadata::default()
            }
        };

        let thumbnail = match self.thumbnails {
            Some(_) => match handler.thumbnail(&job).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            },
            None => None,
        };
        drop(job);

        // Placement through insert is exclusive per (date, identity): a
        // sibling must never see files that a failed insert later removes.
        let _placing = self.placements.acquire(date, &identity).await;

        let byte_size = staged.size();
        let original_path = self
            .layout
            .original_path(date, &identity, sniffed.extension);
        let destination = self
            .layout
            .ensure_parent(&original_path)
            .await
            .map_err(|e| placement_error(&original_path, e))?;
        let mut created = Vec::new();
        if staged
            .place_at(&destination)
            .await
            .map_err(|e| placement_error(&original_path, e))?
            == Placement::Created
        {
            created.push(destination);
        } else {
            tracing::debug!("Kept existing original {:?}", original_path);
        }

        let thumbnail_path = match thumbnail {
            Some(bytes) => match self.write_thumbnail(date, &identity, &bytes).await {
                Ok((path, placement)) => {
                    if placement == Placement::Created {
                        created.push(self.layout.absolute(&path));
                    }
                    Some(path)
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            },
            None => None,
        };

        let record = MediaRecord {
            file_name: file_name.to_string(),
            content_identity: identity,
            original_path,
            thumbnail_path,
            byte_size,
            mime_type: sniffed.mime_type.to_string(),
            media_class: sniffed.class,
            capture,
        };

        if let Err(source) = self.store.insert(&record).await {
            compensate(&created).await;
            return Err(PipelineError::Store {
                file_name: file_name.to_string(),
                source,
            });
        }
        Ok(record)
    }

    /// Write thumbnail bytes to their partitioned path, keeping any file
    /// already there.
    async fn write_thumbnail(
        &self,
        date: NaiveDate,
        identity: &str,
        bytes: &[u8],
    ) -> Result<(PathBuf, Placement), PipelineError> {
        let extension = self.thumbnails.unwrap_or("webp");
        let relative = self.layout.thumbnail_path(date, identity, extension);
        let thumbnail_error = |e: std::io::Error| PipelineError::Thumbnail {
            path: relative.clone(),
            message: e.to_string(),
        };

        let absolute = self
            .layout
            .ensure_parent(&relative)
            .await
            .map_err(thumbnail_error)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok((relative, Placement::Existing))
            }
            Err(e) => return Err(thumbnail_error(e)),
        };

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&absolute).await;
            return Err(thumbnail_error(e));
        }
        Ok((relative, Placement::Created))
    }
}

fn placement_error(relative: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::Staging {
        path: relative.to_path_buf(),
        message: format!("Cannot store original: {e}"),
    }
}

type PlacementSlots = HashMap<(NaiveDate, String), Arc<AsyncMutex<()>>>;

/// Per-(date, identity) async locks, dropped from the map once unused.
#[derive(Default)]
struct PlacementLocks {
    slots: Mutex<PlacementSlots>,
}

impl PlacementLocks {
    async fn acquire(&self, date: NaiveDate, identity: &str) -> PlacementGuard<'_> {
        let key = (date, identity.to_string());
        let slot = Arc::clone(self.slots().entry(key.clone()).or_default());
        let guard = Arc::clone(&slot).lock_owned().await;
        PlacementGuard {
            locks: self,
            key,
            slot,
            guard: Some(guard),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, PlacementSlots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct PlacementGuard<'a> {
    locks: &'a PlacementLocks,
    key: (NaiveDate, String),
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PlacementGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.slots();
        // Only the map and this guard still hold the slot: nobody is waiting
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

/// Remove files this call created; never touches pre-existing ones.
async fn compensate(created: &[PathBuf]) {
    for path in created {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Rolled back {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to roll back {:?}: {}", path, e),
        }
    }
}
