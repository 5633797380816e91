//! Source type detection.
//!
//! A document is classified by its content signature first and by the
//! filename extension second. A supported signature always wins; a supported
//! extension is enough to route a payload whose signature is unknown (so a
//! corrupt file fails in its walker with a data error instead of being
//! rejected as unsupported).

use std::io::Cursor;

use crate::error::{Error, Result};
use crate::model::{SourceDocument, SourceType};

/// PDF header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"
/// Readers accept the header anywhere in the first kilobyte.
const PDF_HEADER_WINDOW: usize = 1024;

/// Entry that marks a ZIP container as a word-processing document.
const DOCX_MAIN_PART: &str = "word/document.xml";

/// Determine the source type of an uploaded document.
pub fn classify(doc: &SourceDocument<'_>) -> Result<SourceType> {
    let extension = doc.extension();
    let by_extension = extension.as_deref().and_then(SourceType::from_extension);
    let sniffed = sniff(doc.bytes());

    match (sniffed, by_extension) {
        (Some(content), Some(declared)) if content != declared => {
            log::warn!(
                "{}: extension says {} but content is {}, using {}",
                doc.filename(),
                declared,
                content,
                content
            );
            Ok(content)
        }
        (Some(content), _) => Ok(content),
        (None, Some(declared)) => {
            log::debug!(
                "{}: unrecognized signature, trusting extension '{}'",
                doc.filename(),
                declared
            );
            Ok(declared)
        }
        (None, None) => {
            let signature = infer::get(doc.bytes())
                .map(|t| t.mime_type().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(Error::UnsupportedSourceType {
                filename: doc.filename().to_string(),
                detail: format!(
                    "extension '{}', signature {}",
                    extension.unwrap_or_default(),
                    signature
                ),
            })
        }
    }
}

/// Detect a supported source type from content alone.
pub fn sniff(data: &[u8]) -> Option<SourceType> {
    if detect_pdf_format(data).is_some() {
        return Some(SourceType::Pdf);
    }

    let kind = infer::get(data)?;
    match kind.extension() {
        "docx" => Some(SourceType::Docx),
        "zip" if is_docx_container(data) => Some(SourceType::Docx),
        "pdf" => Some(SourceType::Pdf),
        "png" => Some(SourceType::Png),
        "jpg" => Some(SourceType::Jpeg),
        "tif" => Some(SourceType::Tiff),
        "bmp" => Some(SourceType::Bmp),
        "webp" => Some(SourceType::Webp),
        _ => None,
    }
}

/// Check if a ZIP container holds a word-processing main part.
pub fn is_docx_container(data: &[u8]) -> bool {
    zip::ZipArchive::new(Cursor::new(data))
        .map(|mut archive| archive.by_name(DOCX_MAIN_PART).is_ok())
        .unwrap_or(false)
}

/// Find and parse the PDF header.
///
/// Returns `None` if no `%PDF-x.y` header appears in the first kilobyte.
pub fn detect_pdf_format(data: &[u8]) -> Option<PdfFormat> {
    let window = &data[..data.len().min(PDF_HEADER_WINDOW)];
    let start = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)?;

    let version_bytes = data.get(start + PDF_MAGIC.len()..start + PDF_MAGIC.len() + VERSION_LEN)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return None;
    }

    Some(PdfFormat { version })
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    if version.len() != 3 {
        return false;
    }

    let chars: Vec<char> = version.chars().collect();
    chars[0].is_ascii_digit() && chars[1] == '.' && chars[2].is_ascii_digit()
}
