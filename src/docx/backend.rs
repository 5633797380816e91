//! DOCX body reader over `zip` + `quick-xml`.

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Main part of a word-processing package.
const DOCUMENT_PART: &str = "word/document.xml";

/// Upper bound on the buffer reserved from a part's declared size.
const PART_SIZE_HINT_LIMIT: u64 = 16 * 1024 * 1024;

/// A top-level element of the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyElement {
    /// Plain text of one paragraph (possibly empty)
    Paragraph(String),
    /// Cell texts of one table, row by row, with merged cells expanded
    Table(Vec<Vec<String>>),
}

/// Source of DOCX body elements in document order.
pub trait DocxBackend: Send + Sync {
    /// Read the body elements of a DOCX payload.
    fn body(&self, data: &[u8]) -> Result<Vec<BodyElement>>;
}

/// [`DocxBackend`] reading `word/document.xml` straight from the package.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDocxBackend;

impl ZipDocxBackend {
    /// Create a new backend.
    pub fn new() -> Self {
        Self
    }
}

impl DocxBackend for ZipDocxBackend {
    fn body(&self, data: &[u8]) -> Result<Vec<BodyElement>> {
        let xml = read_document_part(data)?;
        parse_body(&xml)
    }
}

/// Read the main document part of a DOCX package as text.
fn read_document_part(data: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => {
            Error::InvalidDocumentData(format!("missing {}", DOCUMENT_PART))
        }
        other => other.into(),
    })?;

    // The declared size comes from the archive and is not trusted.
    let mut bytes = Vec::with_capacity(part.size().min(PART_SIZE_HINT_LIMIT) as usize);
    part.read_to_end(&mut bytes)
        .map_err(|e| Error::InvalidDocumentData(format!("cannot read {}: {}", DOCUMENT_PART, e)))?;

    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidDocumentData(format!("{} is not UTF-8", DOCUMENT_PART)))
}

/// Extract an attribute value by key from an element.
fn get_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(|a| a.ok())
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// One `w:tc` as written, before span expansion.
#[derive(Debug, Default)]
struct CellInfo {
    paragraphs: Vec<String>,
    grid_span: usize,
    /// `Some(true)` starts a vertical merge, `Some(false)` continues one
    v_merge: Option<bool>,
}

impl CellInfo {
    fn new() -> Self {
        Self {
            grid_span: 1,
            ..Self::default()
        }
    }

    fn text(&self) -> String {
        self.paragraphs.join("\n")
    }
}

/// Rows of one top-level table under construction.
#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<CellInfo>>,
}

impl TableBuilder {
    /// Expand horizontal spans and vertical merges into a plain grid.
    ///
    /// Spanned columns repeat the cell text; a continued vertical merge
    /// repeats the text of the cell above it.
    fn build(self) -> Vec<Vec<String>> {
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.rows.len());

        for row in self.rows {
            let mut expanded = Vec::new();
            for cell in row {
                let col = expanded.len();
                let text = match cell.v_merge {
                    Some(false) => grid
                        .last()
                        .and_then(|above: &Vec<String>| above.get(col))
                        .cloned()
                        .unwrap_or_default(),
                    _ => cell.text(),
                };
                for _ in 0..cell.grid_span.max(1) {
                    expanded.push(text.clone());
                }
            }
            grid.push(expanded);
        }

        grid
    }
}

/// Walk state for `word/document.xml`.
#[derive(Default)]
struct BodyWalker {
    elements: Vec<BodyElement>,
    /// Open paragraphs; text boxes nest paragraphs inside paragraphs
    paragraphs: Vec<String>,
    /// Open tables; only the outermost one produces a [`BodyElement`]
    table_depth: usize,
    table: Option<TableBuilder>,
    row: Option<Vec<CellInfo>>,
    cell: Option<CellInfo>,
    in_run: bool,
    in_text: bool,
}

impl BodyWalker {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:p" => self.paragraphs.push(String::new()),
            b"w:r" => self.in_run = true,
            b"w:t" if self.in_run => self.in_text = true,
            b"w:tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.table = Some(TableBuilder::default());
                }
            }
            b"w:tr" if self.table_depth == 1 => self.row = Some(Vec::new()),
            b"w:tc" if self.table_depth == 1 => self.cell = Some(CellInfo::new()),
            _ => self.property(e),
        }
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:p" => self.finish_paragraph(String::new()),
            b"w:tab" if self.in_run => self.push_text("\t"),
            b"w:br" | b"w:cr" if self.in_run => self.push_text("\n"),
            b"w:tc" if self.table_depth == 1 => {
                if let Some(row) = self.row.as_mut() {
                    row.push(CellInfo::new());
                }
            }
            _ => self.property(e),
        }
    }

    /// Cell properties that affect the grid.
    fn property(&mut self, e: &BytesStart<'_>) {
        if self.table_depth != 1 {
            return;
        }
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        match e.name().as_ref() {
            b"w:gridSpan" => {
                if let Some(span) = get_attr(e, b"w:val").and_then(|v| v.parse().ok()) {
                    cell.grid_span = span;
                }
            }
            b"w:vMerge" => {
                cell.v_merge = Some(get_attr(e, b"w:val").as_deref() == Some("restart"));
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            self.push_text(text);
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:p" => {
                if let Some(text) = self.paragraphs.pop() {
                    self.finish_paragraph(text);
                }
            }
            b"w:r" => self.in_run = false,
            b"w:t" => self.in_text = false,
            b"w:tc" if self.table_depth == 1 => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.push(cell);
                }
            }
            b"w:tr" if self.table_depth == 1 => {
                if let (Some(row), Some(table)) = (self.row.take(), self.table.as_mut()) {
                    table.rows.push(row);
                }
            }
            b"w:tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    if let Some(table) = self.table.take() {
                        self.elements.push(BodyElement::Table(table.build()));
                    }
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.push_str(text);
        }
    }

    /// Route a closed paragraph to its enclosing paragraph, cell or the body.
    fn finish_paragraph(&mut self, text: String) {
        if let Some(parent) = self.paragraphs.last_mut() {
            if !text.is_empty() {
                if !parent.is_empty() {
                    parent.push('\n');
                }
                parent.push_str(&text);
            }
        } else if self.table_depth > 0 {
            // Nested tables land in the outer cell as extra paragraphs
            if let Some(cell) = self.cell.as_mut() {
                cell.paragraphs.push(text);
            }
        } else {
            self.elements.push(BodyElement::Paragraph(text));
        }
    }
}

/// Parse the body of `word/document.xml` into elements in document order.
pub fn parse_body(xml: &str) -> Result<Vec<BodyElement>> {
    let mut reader = Reader::from_str(xml);
    // Runs rely on xml:space="preserve" whitespace
    reader.trim_text(false);

    let mut walker = BodyWalker::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => walker.start(&e),
            Event::Empty(e) => walker.empty(&e),
            Event::Text(e) => {
                let text = e.unescape()?;
                walker.text(&text);
            }
            Event::End(e) => walker.end(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(walker.elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            body
        )
    }

    fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
    }

    #[test]
    fn test_paragraph_runs() {
        let xml = document(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>World</w:t></w:r><w:r><w:tab/><w:t>A</w:t><w:br/><w:t>B</w:t></w:r></w:p>"#,
        );
        let body = parse_body(&xml).unwrap();
        assert_eq!(
            body,
            vec![BodyElement::Paragraph("Hello World\tA\nB".to_string())]
        );
    }

    #[test]
    fn test_empty_paragraphs_kept() {
        let xml = document(&format!("{}<w:p/><w:p><w:pPr/></w:p>{}", para("a"), para("b")));
        let body = parse_body(&xml).unwrap();
        assert_eq!(
            body,
            vec![
                BodyElement::Paragraph("a".into()),
                BodyElement::Paragraph(String::new()),
                BodyElement::Paragraph(String::new()),
                BodyElement::Paragraph("b".into()),
            ]
        );
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = document(&para("R&amp;D &lt;2024&gt;"));
        assert_eq!(
            parse_body(&xml).unwrap(),
            vec![BodyElement::Paragraph("R&D <2024>".into())]
        );
    }

    #[test]
    fn test_table_in_document_order() {
        let xml = document(&format!(
            "{}<w:tbl><w:tblPr/><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>{}",
            para("Intro"),
            para("H1"),
            para("H2"),
            para("a"),
            para("1"),
            para("Outro")
        ));
        let body = parse_body(&xml).unwrap();
        assert_eq!(body.len(), 3);
        assert_eq!(
            body[1],
            BodyElement::Table(vec![
                vec!["H1".to_string(), "H2".to_string()],
                vec!["a".to_string(), "1".to_string()],
            ])
        );
        assert_eq!(body[2], BodyElement::Paragraph("Outro".into()));
    }

    #[test]
    fn test_merged_cells_expanded() {
        let xml = document(&format!(
            r#"<w:tbl>
<w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr>{}</w:tc><w:tc><w:tcPr><w:vMerge w:val="restart"/></w:tcPr>{}</w:tc></w:tr>
<w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc><w:tc><w:tcPr><w:vMerge/></w:tcPr><w:p/></w:tc></w:tr>
</w:tbl>"#,
            para("Wide"),
            para("Tall"),
            para("x"),
            para("y")
        ));
        let body = parse_body(&xml).unwrap();
        assert_eq!(
            body,
            vec![BodyElement::Table(vec![
                vec!["Wide".to_string(), "Wide".to_string(), "Tall".to_string()],
                vec!["x".to_string(), "y".to_string(), "Tall".to_string()],
            ])]
        );
    }

    #[test]
    fn test_cell_paragraphs_and_nested_table() {
        let nested = format!("<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>", para("inner"));
        let xml = document(&format!(
            "<w:tbl><w:tr><w:tc>{}{}{}</w:tc></w:tr></w:tbl>",
            para("line 1"),
            para("line 2"),
            nested
        ));
        let body = parse_body(&xml).unwrap();
        assert_eq!(
            body,
            vec![BodyElement::Table(vec![vec![
                "line 1\nline 2\ninner".to_string()
            ]])]
        );
    }

    #[test]
    fn test_missing_document_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let err = ZipDocxBackend::new().body(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidDocumentData(ref m) if m.contains("word/document.xml")));
    }

    #[test]
    fn test_forged_part_size() {
        let xml = document(&para("Hello"));
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file(DOCUMENT_PART, options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        let mut data = writer.finish().unwrap().into_inner();

        // Claim a ~4 GB uncompressed size in the central directory entry.
        let entry = data
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        data[entry + 24..entry + 28].copy_from_slice(&0xF000_0000u32.to_le_bytes());

        match ZipDocxBackend::new().body(&data) {
            Ok(body) => assert_eq!(body, vec![BodyElement::Paragraph("Hello".to_string())]),
            Err(err) => assert!(matches!(err, Error::InvalidDocumentData(_)), "{err:?}"),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let err = ZipDocxBackend::new().body(b"garbage").unwrap_err();
        assert!(matches!(err, Error::InvalidDocumentData(_)));
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_body("<w:document><w:body><w:p></w:body>").unwrap_err();
        assert!(matches!(err, Error::InvalidDocumentData(_)));
    }
}
