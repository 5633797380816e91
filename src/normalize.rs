//! Assembly of the final [`ProcessedDocument`].

use chrono::{DateTime, Utc};

use crate::model::{Content, ProcessedDocument, ProcessingMethod, SourceType};

/// Request metadata carried into the result.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    /// Filename hint (final path component)
    pub filename: String,
    /// Classified source type
    pub source_type: SourceType,
    /// Extraction time
    pub extracted_at: DateTime<Utc>,
}

/// Wrap extracted content and request metadata into a [`ProcessedDocument`].
///
/// PDF results record how their content was obtained; other sources carry
/// no processing method.
pub fn normalize(meta: RequestMeta, content: Content) -> ProcessedDocument {
    let pdf_processing_method = match (meta.source_type, &content) {
        (SourceType::Pdf, Content::Document(_)) => Some(ProcessingMethod::DirectTextExtraction),
        (SourceType::Pdf, Content::Ocr(_)) => Some(ProcessingMethod::OcrExtraction),
        _ => None,
    };

    ProcessedDocument {
        filename: meta.filename,
        source_type: meta.source_type,
        extraction_timestamp: meta.extracted_at,
        pdf_processing_method,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrConfig;
    use crate::model::{DocumentContent, OcrContent, OcrSettingsUsed};
    use chrono::TimeZone;

    fn meta(source_type: SourceType) -> RequestMeta {
        RequestMeta {
            filename: "in.bin".to_string(),
            source_type,
            extracted_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    fn ocr_content() -> Content {
        Content::Ocr(OcrContent {
            extracted_text: "scan".to_string(),
            ocr_settings_used: OcrSettingsUsed::from(&OcrConfig::default()),
            word_level_details: vec![],
            tables: vec![],
        })
    }

    #[test]
    fn test_pdf_methods() {
        let direct = normalize(meta(SourceType::Pdf), Content::Document(DocumentContent::default()));
        assert_eq!(
            direct.pdf_processing_method,
            Some(ProcessingMethod::DirectTextExtraction)
        );

        let scanned = normalize(meta(SourceType::Pdf), ocr_content());
        assert_eq!(
            scanned.pdf_processing_method,
            Some(ProcessingMethod::OcrExtraction)
        );
    }

    #[test]
    fn test_values_pass_through() {
        let doc = normalize(meta(SourceType::Png), ocr_content());
        assert_eq!(doc.filename, "in.bin");
        assert_eq!(doc.source_type, SourceType::Png);
        assert_eq!(doc.pdf_processing_method, None);
        assert_eq!(doc.text(), "scan");
        assert_eq!(doc.extraction_timestamp.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }
}
