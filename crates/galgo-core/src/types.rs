//! Core data types for the Galgo ingestion pipeline.
//!
//! These types represent what one ingested upload becomes: a classified,
//! content-addressed [`MediaRecord`] or a typed rejection.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FailureReason;

/// Media class decided by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Video,
    Unsupported,
}

impl MediaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for MediaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capture location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Positive north of the equator
    pub latitude: f64,
    /// Positive east of Greenwich
    pub longitude: f64,
}

/// Capture-time metadata decoded from EXIF or container tags.
///
/// An unknown timestamp is `None` (serialized as `null`), never an epoch
/// sentinel. Latitude and longitude only exist together as a [`GeoPoint`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// When the media was captured (naive, as recorded by the device)
    pub taken_at: Option<NaiveDateTime>,

    /// Where the media was captured
    pub location: Option<GeoPoint>,
}

impl CaptureMetadata {
    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|p| p.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|p| p.longitude)
    }

    pub fn is_empty(&self) -> bool {
        self.taken_at.is_none() && self.location.is_none()
    }
}

/// The record produced for one successfully ingested upload.
///
/// Immutable once built; handed as-is to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Filename supplied with the upload
    pub file_name: String,

    /// Content identity, also the stored filename stem
    pub content_identity: String,

    /// Stored original, relative to the storage base directory
    pub original_path: PathBuf,

    /// Stored preview, relative to the storage base directory.
    /// Absent when generation failed or is disabled; readers substitute the
    /// configured fallback asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    /// Size of the original in bytes
    pub byte_size: u64,

    /// Sniffed MIME type ("image/jpeg", "video/mp4", ...)
    pub mime_type: String,

    /// Sniffed media class
    pub media_class: MediaClass,

    /// Capture timestamp and location
    pub capture: CaptureMetadata,
}

/// Result of ingesting one upload. A batch yields one per input, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestionOutcome {
    Ingested(Box<MediaRecord>),
    Rejected {
        file_name: String,
        reason: FailureReason,
    },
}

impl IngestionOutcome {
    pub fn is_ingested(&self) -> bool {
        matches!(self, Self::Ingested(_))
    }

    pub fn file_name(&self) -> &str {
        match self {
            Self::Ingested(record) => &record.file_name,
            Self::Rejected { file_name, .. } => file_name,
        }
    }

    pub fn record(&self) -> Option<&MediaRecord> {
        match self {
            Self::Ingested(record) => Some(&**record),
            Self::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Ingested(_) => None,
            Self::Rejected { reason, .. } => Some(reason),
        }
    }
}

/// Statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchStats {
    /// Uploads that produced a record
    pub succeeded: usize,

    /// Uploads that were rejected
    pub failed: usize,

    /// Bytes stored across successful uploads
    pub total_bytes: u64,

    /// Wall-clock time in seconds
    pub total_seconds: f64,
}

impl BatchStats {
    /// Tally a batch of outcomes.
    pub fn from_outcomes(outcomes: &[IngestionOutcome], elapsed: std::time::Duration) -> Self {
        let mut stats = Self {
            total_seconds: elapsed.as_secs_f64(),
            ..Self::default()
        };
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats
    }

    /// Account for a single outcome.
    pub fn record(&mut self, outcome: &IngestionOutcome) {
        match outcome {
            IngestionOutcome::Ingested(record) => {
                self.succeeded += 1;
                self.total_bytes += record.byte_size;
            }
            IngestionOutcome::Rejected { .. } => self.failed += 1,
        }
    }

    /// Uploads handled per second.
    pub fn files_per_second(&self) -> f64 {
        if self.total_seconds > 0.0 {
            (self.succeeded + self.failed) as f64 / self.total_seconds
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_record() -> MediaRecord {
        MediaRecord {
            file_name: "beach.jpg".to_string(),
            content_identity: "abc123".to_string(),
            original_path: PathBuf::from("medias/2024-07-01/abc123.jpg"),
            thumbnail_path: None,
            byte_size: 2048,
            mime_type: "image/jpeg".to_string(),
            media_class: MediaClass::Image,
            capture: CaptureMetadata {
                taken_at: NaiveDate::from_ymd_opt(2024, 7, 1)
                    .and_then(|d| d.and_hms_opt(10, 0, 0)),
                location: Some(GeoPoint {
                    latitude: 10.5,
                    longitude: -3.25,
                }),
            },
        }
    }

    #[test]
    fn test_ingested_outcome_roundtrip() {
        let outcome = IngestionOutcome::Ingested(Box::new(sample_record()));
        let json = serde_json::to_string(&outcome).unwrap();

        assert!(json.contains("\"status\":\"ingested\""));
        assert!(json.contains("\"media_class\":\"image\""));
        assert!(json.contains("\"taken_at\":\"2024-07-01T10:00:00\""));
        assert!(!json.contains("thumbnail_path"));

        let parsed: IngestionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn test_rejected_outcome_serialization() {
        let outcome = IngestionOutcome::Rejected {
            file_name: "notes.txt".to_string(),
            reason: FailureReason::UnsupportedType("not a media file".to_string()),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"rejected\""));
        assert!(json.contains("\"kind\":\"unsupported_type\""));
        assert_eq!(outcome.file_name(), "notes.txt");
        assert!(outcome.record().is_none());
    }

    #[test]
    fn test_unknown_timestamp_is_null() {
        let capture = CaptureMetadata::default();
        let json = serde_json::to_string(&capture).unwrap();
        assert_eq!(json, r#"{"taken_at":null,"location":null}"#);
        assert!(capture.is_empty());
        assert!(capture.latitude().is_none() && capture.longitude().is_none());
    }

    #[test]
    fn test_batch_stats_tally() {
        let outcomes = vec![
            IngestionOutcome::Ingested(Box::new(sample_record())),
            IngestionOutcome::Rejected {
                file_name: "x.bin".to_string(),
                reason: FailureReason::Decode("corrupt".to_string()),
            },
        ];
        let stats = BatchStats::from_outcomes(&outcomes, std::time::Duration::from_secs(2));
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_bytes, 2048);
        assert!((stats.files_per_second() - 1.0).abs() < f64::EPSILON);
    }
}
