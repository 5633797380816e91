//! Engine-level tests: image OCR, error taxonomy, determinism.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{docx_bytes, paragraph, png_bytes, table, word, ScriptedOcr};
use undoc::ocr::TesseractEngine;
use undoc::render::{self, JsonFormat, PlaceholderMode};
use undoc::weave::find_markers;
use undoc::{Engine, Error, ErrorClass, ExtractionConfig, OcrConfig, SourceType};

fn fixed_engine(ocr: Arc<ScriptedOcr>) -> Engine {
    Engine::new()
        .with_ocr_engine(ocr)
        .with_fixed_time(Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap())
}

#[test]
fn test_image_ocr() {
    let ocr = Arc::new(ScriptedOcr::new(vec![
        word("Total", 95.0, 1, 10),
        word("due", 91.0, 1, 60),
        word("120", 89.5, 2, 10),
    ]));
    let doc = fixed_engine(ocr.clone())
        .process(&png_bytes(120, 60), "uploads/receipt.png", &ExtractionConfig::default())
        .unwrap();

    assert_eq!(doc.filename, "receipt.png");
    assert_eq!(doc.source_type, SourceType::Png);
    assert_eq!(doc.pdf_processing_method, None);

    let content = doc.ocr_content().unwrap();
    assert_eq!(content.extracted_text, "Total due\n120");
    assert_eq!(content.word_level_details.len(), 3);
    assert_eq!(content.word_level_details[2].text, "120");
    assert_eq!(content.word_level_details[2].top, 40);
    assert!(content.tables.is_empty());

    let settings = &content.ocr_settings_used;
    assert_eq!(settings.language, "eng");
    assert!(settings.preprocessing_applied);
    assert!(settings.deskew_applied);

    let request = ocr.last_request().unwrap();
    assert_eq!(request.language, "eng");
    assert_eq!(request.char_whitelist, None);
}

#[test]
fn test_ocr_settings_forwarded() {
    let ocr = Arc::new(ScriptedOcr::new(vec![word("A-12", 90.0, 1, 0)]));
    let config = ExtractionConfig::default().with_ocr(
        OcrConfig::new()
            .with_language("eng+deu")
            .with_page_segmentation_mode(6)
            .with_engine_mode(1)
            .with_preprocessing(false)
            .with_char_whitelist("0123456789"),
    );
    let doc = fixed_engine(ocr.clone())
        .process(&png_bytes(80, 40), "code.png", &config)
        .unwrap();

    let request = ocr.last_request().unwrap();
    assert_eq!(request.language, "eng+deu");
    assert_eq!(request.page_segmentation_mode, 6);
    assert_eq!(request.engine_mode, 1);
    assert_eq!(request.char_whitelist.as_deref(), Some("0123456789"));

    let content = doc.ocr_content().unwrap();
    assert_eq!(content.extracted_text, "12");
    assert!(!content.ocr_settings_used.preprocessing_applied);
    assert!(!content.ocr_settings_used.deskew_applied);
}

#[test]
fn test_missing_language_pack() {
    let ocr = Arc::new(ScriptedOcr::new(vec![]));
    let config = ExtractionConfig::default().with_ocr_language("eng+jpn");
    let err = fixed_engine(ocr.clone())
        .process(&png_bytes(40, 40), "scan.png", &config)
        .unwrap_err();

    match &err {
        Error::OcrLanguageUnsupported { language, available } => {
            assert_eq!(language, "jpn");
            assert!(available.contains(&"eng".to_string()));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.class(), ErrorClass::Client);
    assert!(ocr.last_request().is_none());
}

#[test]
fn test_engine_unavailable() {
    let engine = Engine::new().with_ocr_engine(Arc::new(TesseractEngine::with_binary(
        "/nonexistent/bin/tesseract",
    )));
    let err = engine
        .process(&png_bytes(40, 40), "scan.png", &ExtractionConfig::default())
        .unwrap_err();

    assert!(matches!(err, Error::OcrEngineUnavailable(_)));
    assert_eq!(err.class(), ErrorClass::NotImplemented);
    assert_eq!(err.status_code(), 501);
}

#[test]
fn test_undecodable_image() {
    let ocr = Arc::new(ScriptedOcr::new(vec![]));
    let err = fixed_engine(ocr)
        .process(b"\x89PNG\r\n\x1a\n truncated", "broken.png", &ExtractionConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidImageData(_)));
    assert_eq!(err.status_code(), 422);
}

#[test]
fn test_unsupported_and_invalid_config() {
    let engine = fixed_engine(Arc::new(ScriptedOcr::new(vec![])));

    let err = engine
        .process(b"plain words", "notes.txt", &ExtractionConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedSourceType { .. }));
    assert_eq!(err.status_code(), 400);

    let mut config = ExtractionConfig::default();
    config.ocr.page_segmentation_mode = 14;
    let err = engine
        .process(&png_bytes(20, 20), "scan.png", &config)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_repeatable_with_fixed_clock() {
    let body = format!(
        "{}{}{}{}",
        paragraph("Summary"),
        table(&[&["Month", "Units"], &["Jan", "10"], &["Feb", "12"]]),
        table(&[&["Region"], &["North"]]),
        paragraph("Notes")
    );
    let bytes = docx_bytes(&body);
    let engine = fixed_engine(Arc::new(ScriptedOcr::new(vec![])));
    let config = ExtractionConfig::default();

    let first = engine.process(&bytes, "sales.docx", &config).unwrap();
    let second = engine.process(&bytes, "sales.docx", &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        render::to_json(&first, JsonFormat::Compact).unwrap(),
        render::to_json(&second, JsonFormat::Compact).unwrap()
    );

    // Every marker names exactly one table, in table order
    let ids: Vec<_> = first.tables().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(find_markers(first.text()), ids);

    let stripped = render::to_text(&first, PlaceholderMode::Strip);
    assert_eq!(stripped, "Summary\nNotes");
}

#[test]
fn test_json_response_shape() {
    let bytes = docx_bytes(&format!("{}{}", paragraph("Intro"), table(&[&["k", "v"], &["x", "1"]])));
    let doc = fixed_engine(Arc::new(ScriptedOcr::new(vec![])))
        .process(&bytes, "kv.docx", &ExtractionConfig::default())
        .unwrap();

    let json = render::to_json(&doc, JsonFormat::Compact).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["filename"], "kv.docx");
    assert_eq!(value["format"], "json");
    assert_eq!(value["source_type"], "docx");
    assert_eq!(value["extraction_date"], "2024-05-17T09:30:00Z");
    assert!(value.get("pdf_processing_method").is_none());
    assert_eq!(
        value["content"]["extracted_text_with_placeholders"],
        "Intro\n[[INSERT_TABLE:table001]]"
    );
    assert_eq!(value["content"]["tables"][0]["data"][0][1], 1);
}
