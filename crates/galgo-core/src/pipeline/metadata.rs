//! Capture metadata: EXIF for images, container tags for video.
//!
//! Raw tag values are collected into [`ExifTags`]; turning them into a
//! [`CaptureMetadata`] is a pure conversion. Malformed values become `None`,
//! never an error.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::PipelineError;
use crate::pipeline::video::VideoTools;
use crate::types::{CaptureMetadata, GeoPoint};

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const EXIF_DATETIME_LEN: usize = 19;

/// Raw EXIF values relevant to capture metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifTags {
    pub date_time_original: Option<String>,
    pub date_time: Option<String>,
    pub gps_latitude: Option<Vec<f64>>,
    pub gps_latitude_ref: Option<String>,
    pub gps_longitude: Option<Vec<f64>>,
    pub gps_longitude_ref: Option<String>,
}

impl ExifTags {
    /// Collect the raw tag values from a parsed EXIF block.
    pub fn from_exif(exif: &exif::Exif) -> Self {
        Self {
            date_time_original: ascii_field(exif, Tag::DateTimeOriginal),
            date_time: ascii_field(exif, Tag::DateTime),
            gps_latitude: rational_field(exif, Tag::GPSLatitude),
            gps_latitude_ref: ascii_field(exif, Tag::GPSLatitudeRef),
            gps_longitude: rational_field(exif, Tag::GPSLongitude),
            gps_longitude_ref: ascii_field(exif, Tag::GPSLongitudeRef),
        }
    }

    /// DateTimeOriginal when present, otherwise DateTime.
    pub fn capture_time(&self) -> Option<NaiveDateTime> {
        self.date_time_original
            .as_deref()
            .or(self.date_time.as_deref())
            .and_then(parse_exif_datetime)
    }

    /// Both coordinates, or neither.
    pub fn location(&self) -> Option<GeoPoint> {
        let latitude = sexagesimal_to_decimal(
            self.gps_latitude.as_deref()?,
            self.gps_latitude_ref.as_deref()?,
            "N",
        )?;
        let longitude = sexagesimal_to_decimal(
            self.gps_longitude.as_deref()?,
            self.gps_longitude_ref.as_deref()?,
            "E",
        )?;
        Some(GeoPoint {
            latitude,
            longitude,
        })
    }
}

impl From<&ExifTags> for CaptureMetadata {
    fn from(tags: &ExifTags) -> Self {
        Self {
            taken_at: tags.capture_time(),
            location: tags.location(),
        }
    }
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp.
///
/// Trailing NUL bytes are stripped before the 19-character length check:
/// EXIF ASCII values carry a NUL terminator, so a raw 20-byte
/// `"2024:07:01 10:00:00\0"` is accepted. Any other length yields `None`.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim_end_matches('\0');
    if raw.len() != EXIF_DATETIME_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, EXIF_DATETIME_FORMAT).ok()
}

/// Degrees, minutes, seconds to signed decimal degrees.
///
/// Negated unless `reference` equals `positive_ref` ("N" or "E").
pub fn sexagesimal_to_decimal(dms: &[f64], reference: &str, positive_ref: &str) -> Option<f64> {
    let [degrees, minutes, seconds] = dms else {
        return None;
    };
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if !decimal.is_finite() {
        return None;
    }
    if reference.trim() == positive_ref {
        Some(decimal)
    } else {
        Some(-decimal)
    }
}

/// Parse a container `creation_time` tag into naive UTC.
pub fn parse_container_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn rational_field(exif: &exif::Exif, tag: Tag) -> Option<Vec<f64>> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => Some(values.iter().map(|r| r.to_f64()).collect()),
        _ => None,
    }
}

/// Reads capture metadata for one media class.
///
/// Callers treat errors as non-fatal, except [`PipelineError::Decode`],
/// which means the payload itself is unreadable.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<CaptureMetadata, PipelineError>;
}

/// EXIF reader for images.
#[derive(Debug, Clone, Default)]
pub struct ExifReader;

impl ExifReader {
    /// Read raw tags from a file. A file without EXIF yields empty tags.
    pub fn read_tags(path: &Path) -> Result<ExifTags, PipelineError> {
        let metadata_error = |message: String| PipelineError::Metadata {
            path: path.to_path_buf(),
            message,
        };
        let file = File::open(path).map_err(|e| metadata_error(e.to_string()))?;
        let mut reader = BufReader::new(file);
        match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Ok(ExifTags::from_exif(&exif)),
            Err(exif::Error::NotFound(_)) => Ok(ExifTags::default()),
            Err(e) => Err(metadata_error(e.to_string())),
        }
    }
}

#[async_trait]
impl MetadataExtractor for ExifReader {
    async fn extract(&self, path: &Path) -> Result<CaptureMetadata, PipelineError> {
        let owned = path.to_path_buf();
        let tags = tokio::task::spawn_blocking(move || Self::read_tags(&owned))
            .await
            .map_err(|e| PipelineError::Metadata {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            })??;
        Ok(CaptureMetadata::from(&tags))
    }
}

/// Container probe for video. Never yields a location.
#[derive(Debug, Clone)]
pub struct ContainerProbe {
    tools: VideoTools,
}

impl ContainerProbe {
    pub fn new(tools: VideoTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl MetadataExtractor for ContainerProbe {
    async fn extract(&self, path: &Path) -> Result<CaptureMetadata, PipelineError> {
        let probe = self.tools.probe(path).await?;
        Ok(CaptureMetadata {
            taken_at: probe.creation_time().and_then(parse_container_time),
            location: None,
        })
    }
}
