//! Input document and its source type.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported source types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Office Open XML word-processing document
    Docx,
    /// Portable Document Format
    Pdf,
    /// PNG image
    Png,
    /// JPEG image
    Jpeg,
    /// TIFF image
    Tiff,
    /// Windows bitmap
    Bmp,
    /// WebP image
    Webp,
}

impl SourceType {
    /// Map a file extension (case-insensitive, without dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(SourceType::Docx),
            "pdf" => Some(SourceType::Pdf),
            "png" => Some(SourceType::Png),
            "jpg" | "jpeg" => Some(SourceType::Jpeg),
            "tif" | "tiff" => Some(SourceType::Tiff),
            "bmp" => Some(SourceType::Bmp),
            "webp" => Some(SourceType::Webp),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Docx => "docx",
            SourceType::Pdf => "pdf",
            SourceType::Png => "png",
            SourceType::Jpeg => "jpeg",
            SourceType::Tiff => "tiff",
            SourceType::Bmp => "bmp",
            SourceType::Webp => "webp",
        }
    }

    /// Check if this is a raster image type (OCR path).
    pub fn is_image(&self) -> bool {
        !matches!(self, SourceType::Docx | SourceType::Pdf)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw uploaded bytes plus the caller's filename hint.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    bytes: &'a [u8],
    filename: &'a str,
}

impl<'a> SourceDocument<'a> {
    /// Wrap uploaded bytes.
    pub fn new(bytes: &'a [u8], filename: &'a str) -> Self {
        Self { bytes, filename }
    }

    /// Raw content.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Filename hint as given by the caller.
    pub fn filename(&self) -> &'a str {
        self.filename
    }

    /// Final path component of the filename hint.
    pub fn basename(&self) -> &'a str {
        Path::new(self.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.filename)
    }

    /// Lowercased extension of the filename hint.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}
