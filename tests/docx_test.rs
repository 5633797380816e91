//! End-to-end DOCX extraction tests.

mod common;

use common::{docx_bytes, paragraph, table};
use undoc::weave::find_markers;
use undoc::render::{self, JsonFormat, PlaceholderMode};
use undoc::{process, CellValue, Content, Error, ExtractionConfig, ProcessingMethod, SourceType};

#[test]
fn test_table_between_paragraphs() {
    let body = format!(
        "{}{}{}",
        paragraph("Intro"),
        table(&[&["H1", "H2"], &["a", "1"]]),
        paragraph("Outro")
    );
    let doc = process(&docx_bytes(&body), "report.docx", &ExtractionConfig::default()).unwrap();

    assert_eq!(doc.filename, "report.docx");
    assert_eq!(doc.source_type, SourceType::Docx);
    assert_eq!(doc.pdf_processing_method, None::<ProcessingMethod>);

    let content = doc.document_content().unwrap();
    assert_eq!(
        content.extracted_text_with_placeholders,
        "Intro\n[[INSERT_TABLE:table001]]\nOutro"
    );
    assert_eq!(content.tables.len(), 1);

    let t = &content.tables[0];
    assert_eq!(t.id, "table001");
    assert_eq!(t.position, 1);
    assert_eq!(t.headers, vec!["H1", "H2"]);
    assert_eq!(
        t.rows,
        vec![vec![CellValue::Text("a".into()), CellValue::Integer(1)]]
    );
    assert_eq!(t.page_number, None);
}

#[test]
fn test_tables_numbered_in_document_order() {
    let body = format!(
        "{}{}{}{}",
        table(&[&["A"], &["1"]]),
        paragraph("between"),
        table(&[&["B"], &["2.5"]]),
        paragraph("end")
    );
    let doc = process(&docx_bytes(&body), "two.docx", &ExtractionConfig::default()).unwrap();

    let ids: Vec<_> = doc.tables().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["table001", "table002"]);
    assert_eq!(find_markers(doc.text()), ids);
    assert_eq!(doc.tables()[1].rows[0][0], CellValue::Float(2.5));
}

#[test]
fn test_empty_body() {
    let doc = process(&docx_bytes(""), "empty.docx", &ExtractionConfig::default()).unwrap();
    match &doc.content {
        Content::Document(content) => {
            assert_eq!(content.extracted_text_with_placeholders, "");
            assert!(content.tables.is_empty());
        }
        other => panic!("expected document content, got {:?}", other),
    }
}

#[test]
fn test_docx_detected_despite_extension() {
    let bytes = docx_bytes(&paragraph("Hello"));
    let doc = process(&bytes, "upload.bin", &ExtractionConfig::default()).unwrap();
    assert_eq!(doc.source_type, SourceType::Docx);
    assert_eq!(doc.text(), "Hello");
}

#[test]
fn test_corrupt_docx() {
    let result = process(b"PK\x03\x04 definitely not a zip", "broken.docx", &ExtractionConfig::default());
    assert!(matches!(result, Err(Error::InvalidDocumentData(_))));
}

#[test]
fn test_cells_keep_written_numbers() {
    let body = table(&[&["H"], &["3.0"], &["1.50"], &["-0"], &["2.25"], &["-4"]]);
    let doc = process(&docx_bytes(&body), "amounts.docx", &ExtractionConfig::default()).unwrap();

    let rows: Vec<_> = doc.tables()[0].rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(
        rows,
        vec![
            CellValue::Text("3.0".into()),
            CellValue::Text("1.50".into()),
            CellValue::Text("-0".into()),
            CellValue::Float(2.25),
            CellValue::Integer(-4),
        ]
    );

    let text = render::to_text(&doc, PlaceholderMode::Keep);
    assert!(text.ends_with("H\n3.0\n1.50\n-0\n2.25\n-4"), "{text}");

    let json = render::to_json(&doc, JsonFormat::Compact).unwrap();
    assert!(json.contains(r#""data":[["3.0"],["1.50"],["-0"],[2.25],[-4]]"#), "{json}");
}
