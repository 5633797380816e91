//! Document-level types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Content, DocumentContent, OcrContent, SourceType, TableFragment};

/// How a PDF's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    /// Text layer walk
    DirectTextExtraction,
    /// OCR of the embedded page image
    OcrExtraction,
}

/// The normalized result of one extraction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Filename hint (final path component)
    pub filename: String,

    /// Detected source type
    pub source_type: SourceType,

    /// Extraction time (UTC)
    #[serde(rename = "extraction_date")]
    pub extraction_timestamp: DateTime<Utc>,

    /// PDF only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_processing_method: Option<ProcessingMethod>,

    /// Extracted content
    pub content: Content,
}

impl ProcessedDocument {
    /// Get the placeholder content, if this is a DOCX/PDF text result.
    pub fn document_content(&self) -> Option<&DocumentContent> {
        match &self.content {
            Content::Document(d) => Some(d),
            Content::Ocr(_) => None,
        }
    }

    /// Get the OCR content, if this result came from OCR.
    pub fn ocr_content(&self) -> Option<&OcrContent> {
        match &self.content {
            Content::Ocr(o) => Some(o),
            Content::Document(_) => None,
        }
    }

    /// Check if the content came from OCR.
    pub fn is_ocr(&self) -> bool {
        matches!(self.content, Content::Ocr(_))
    }

    /// Tables of the document.
    pub fn tables(&self) -> &[TableFragment] {
        self.content.tables()
    }

    /// Main text (with placeholders for DOCX/PDF).
    pub fn text(&self) -> &str {
        self.content.text()
    }
}
