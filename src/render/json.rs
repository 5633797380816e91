//! JSON response rendering.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{ProcessedDocument, ProcessingMethod, SourceType};

use super::text::{to_text, PlaceholderMode};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Envelope shared by the JSON and text responses.
#[derive(Serialize)]
struct Response<'a, C: Serialize> {
    filename: &'a str,
    format: &'static str,
    extraction_date: String,
    source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_processing_method: Option<ProcessingMethod>,
    content: C,
}

impl<'a, C: Serialize> Response<'a, C> {
    fn new(doc: &'a ProcessedDocument, format: &'static str, content: C) -> Self {
        Self {
            filename: &doc.filename,
            format,
            extraction_date: rfc3339(&doc.extraction_timestamp),
            source_type: doc.source_type,
            pdf_processing_method: doc.pdf_processing_method,
            content,
        }
    }
}

fn rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn serialize<T: Serialize>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::UnexpectedExtractionFailure(format!("JSON serialization error: {}", e)))
}

/// Render the structured JSON response (document or OCR shape).
pub fn to_json(doc: &ProcessedDocument, format: JsonFormat) -> Result<String> {
    serialize(&Response::new(doc, "json", &doc.content), format)
}

/// Render the text response: the JSON envelope with the plain text as `content`.
pub fn to_text_response(
    doc: &ProcessedDocument,
    mode: PlaceholderMode,
    format: JsonFormat,
) -> Result<String> {
    serialize(&Response::new(doc, "text", to_text(doc, mode)), format)
}
