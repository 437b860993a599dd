//! Content-based type sniffing.
//!
//! Classification looks only at the leading bytes of the staged file; the
//! upload's filename and extension are never consulted.

use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::error::PipelineError;
use crate::types::MediaClass;

/// What the leading bytes of a file say it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedType {
    pub class: MediaClass,
    pub mime_type: &'static str,
    /// Canonical extension for the stored original
    pub extension: &'static str,
}

impl SniffedType {
    const fn image(mime_type: &'static str, extension: &'static str) -> Self {
        Self {
            class: MediaClass::Image,
            mime_type,
            extension,
        }
    }

    const fn video(mime_type: &'static str, extension: &'static str) -> Self {
        Self {
            class: MediaClass::Video,
            mime_type,
            extension,
        }
    }

    pub const UNSUPPORTED: Self = Self {
        class: MediaClass::Unsupported,
        mime_type: "application/octet-stream",
        extension: "bin",
    };

    pub fn is_supported(&self) -> bool {
        self.class != MediaClass::Unsupported
    }
}

/// Classifies staged files by magic number.
pub struct TypeSniffer;

impl TypeSniffer {
    /// Bytes read from the start of a file. Long enough for the MPEG-TS
    /// second sync byte and the Matroska doctype.
    pub const HEADER_LEN: usize = 256;

    /// Sniff a file on disk.
    pub async fn sniff_file(path: &Path) -> Result<SniffedType, PipelineError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| PipelineError::Staging {
                path: path.to_path_buf(),
                message: format!("Cannot open staged file: {}", e),
            })?;

        let mut header = vec![0u8; Self::HEADER_LEN];
        let mut filled = 0;
        while filled < header.len() {
            let n = file
                .read(&mut header[filled..])
                .await
                .map_err(|e| PipelineError::Staging {
                    path: path.to_path_buf(),
                    message: format!("Cannot read staged file: {}", e),
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        header.truncate(filled);

        Ok(Self::sniff(&header))
    }

    /// Classify a header buffer.
    pub fn sniff(header: &[u8]) -> SniffedType {
        Self::sniff_image(header)
            .or_else(|| Self::sniff_video(header))
            .unwrap_or(SniffedType::UNSUPPORTED)
    }

    fn sniff_image(h: &[u8]) -> Option<SniffedType> {
        if h.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(SniffedType::image("image/jpeg", "jpg"));
        }
        if h.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(SniffedType::image("image/png", "png"));
        }
        if h.starts_with(b"GIF87a") || h.starts_with(b"GIF89a") {
            return Some(SniffedType::image("image/gif", "gif"));
        }
        if h.len() >= 12 && &h[0..4] == b"RIFF" && &h[8..12] == b"WEBP" {
            return Some(SniffedType::image("image/webp", "webp"));
        }
        // BMP: "BM" plus a zeroed reserved field; a bare "BM" is too weak
        if h.len() >= 14 && h.starts_with(b"BM") && h[6..10] == [0, 0, 0, 0] {
            return Some(SniffedType::image("image/bmp", "bmp"));
        }
        if h.starts_with(&[b'I', b'I', 0x2A, 0x00]) || h.starts_with(&[b'M', b'M', 0x00, 0x2A]) {
            return Some(SniffedType::image("image/tiff", "tiff"));
        }
        None
    }

    fn sniff_video(h: &[u8]) -> Option<SniffedType> {
        // ISO base media: size box then "ftyp" and a major brand
        if h.len() >= 12 && &h[4..8] == b"ftyp" {
            return Self::classify_ftyp(&h[8..12]);
        }
        if h.len() >= 12 && &h[0..4] == b"RIFF" && &h[8..12] == b"AVI " {
            return Some(SniffedType::video("video/x-msvideo", "avi"));
        }
        // EBML header: Matroska or WebM depending on the doctype string
        if h.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return if contains(h, b"webm") {
                Some(SniffedType::video("video/webm", "webm"))
            } else {
                Some(SniffedType::video("video/x-matroska", "mkv"))
            };
        }
        if h.starts_with(&[0x00, 0x00, 0x01, 0xBA]) {
            return Some(SniffedType::video("video/mpeg", "mpg"));
        }
        // MPEG transport stream: sync byte at the start of two 188-byte packets
        if h.len() > 188 && h[0] == 0x47 && h[188] == 0x47 {
            return Some(SniffedType::video("video/mp2t", "ts"));
        }
        if h.len() >= 4 && h.starts_with(b"FLV") && h[3] == 0x01 {
            return Some(SniffedType::video("video/x-flv", "flv"));
        }
        None
    }

    fn classify_ftyp(brand: &[u8]) -> Option<SniffedType> {
        match brand {
            // Still-image containers the decoder cannot read
            b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx" | b"mif1" | b"msf1"
            | b"avif" | b"avis" => None,
            // Audio-only MPEG-4
            b"M4A " | b"M4B " | b"M4P " => None,
            b"qt  " => Some(SniffedType::video("video/quicktime", "mov")),
            b"M4V " | b"M4VH" | b"M4VP" => Some(SniffedType::video("video/x-m4v", "m4v")),
            b if b.starts_with(b"3g2") => Some(SniffedType::video("video/3gpp2", "3g2")),
            b if b.starts_with(b"3gp") => Some(SniffedType::video("video/3gpp", "3gp")),
            _ => Some(SniffedType::video("video/mp4", "mp4")),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
