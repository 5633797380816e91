//! Content shapes of a processed document.

use serde::{Deserialize, Serialize};

use super::TableFragment;
use crate::config::OcrConfig;

/// Text with table placeholders plus the referenced tables (DOCX and PDF).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    /// Prose with `[[INSERT_TABLE:<id>]]` markers in reading order
    pub extracted_text_with_placeholders: String,
    /// Tables referenced by the markers, in marker order
    pub tables: Vec<TableFragment>,
}

impl DocumentContent {
    /// Look up a table by id.
    pub fn table(&self, id: &str) -> Option<&TableFragment> {
        self.tables.iter().find(|t| t.id == id)
    }
}

/// One recognized word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordDetail {
    /// Recognized text
    pub text: String,
    /// Confidence in [0, 100]
    pub confidence: f32,
    /// Left edge in pixels of the preprocessed image
    pub left: u32,
    /// Top edge in pixels of the preprocessed image
    pub top: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Snapshot of the OCR settings a result was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSettingsUsed {
    /// Language code(s)
    pub language: String,
    /// Page segmentation mode
    pub page_segmentation_mode: u8,
    /// Engine mode
    pub engine_mode: u8,
    /// Whether preprocessing ran
    pub preprocessing_applied: bool,
    /// Whether deskew ran
    pub deskew_applied: bool,
    /// Character whitelist, if any
    pub char_whitelist: Option<String>,
}

impl From<&OcrConfig> for OcrSettingsUsed {
    fn from(config: &OcrConfig) -> Self {
        Self {
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            engine_mode: config.engine_mode,
            preprocessing_applied: config.apply_preprocessing,
            deskew_applied: config.deskew_applied(),
            char_whitelist: config.char_whitelist.clone(),
        }
    }
}

/// OCR output (image sources and scanned PDFs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrContent {
    /// Full recognized text
    pub extracted_text: String,
    /// Settings used for recognition
    pub ocr_settings_used: OcrSettingsUsed,
    /// Per-word geometry and confidence
    pub word_level_details: Vec<WordDetail>,
    /// Always empty
    pub tables: Vec<TableFragment>,
}

/// Either content shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// DOCX / PDF text layer
    Document(DocumentContent),
    /// OCR
    Ocr(OcrContent),
}

impl Content {
    /// Tables of the content (empty for OCR).
    pub fn tables(&self) -> &[TableFragment] {
        match self {
            Content::Document(d) => &d.tables,
            Content::Ocr(o) => &o.tables,
        }
    }

    /// Main text of the content.
    pub fn text(&self) -> &str {
        match self {
            Content::Document(d) => &d.extracted_text_with_placeholders,
            Content::Ocr(o) => &o.extracted_text,
        }
    }
}
