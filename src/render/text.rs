//! Plain text rendering.

use crate::model::{Content, ProcessedDocument};
use crate::weave::strip_markers;

/// What plain text output does with table markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderMode {
    /// Keep markers inline and append the referenced tables
    #[default]
    Keep,
    /// Remove markers and omit the tables
    Strip,
}

/// Convert a processed document to plain text.
///
/// OCR content renders as its recognized text in either mode.
pub fn to_text(doc: &ProcessedDocument, mode: PlaceholderMode) -> String {
    let content = match &doc.content {
        Content::Ocr(ocr) => return ocr.extracted_text.trim().to_string(),
        Content::Document(content) => content,
    };

    if mode == PlaceholderMode::Strip {
        return strip_markers(&content.extracted_text_with_placeholders)
            .trim()
            .to_string();
    }

    let mut parts = vec![content.extracted_text_with_placeholders.clone()];
    if !content.tables.is_empty() {
        parts.push("\n\n--- Referenced Table Data ---".to_string());
        for table in &content.tables {
            parts.push(format!("\n--- {} ---", table.id));
            parts.push(table.plain_text());
            parts.push(String::new());
        }
    }

    parts.join("\n").trim().to_string()
}
