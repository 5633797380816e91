//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Mutex;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use undoc::error::Result;
use undoc::ocr::{OcrEngine, OcrRequest, RecognizedToken};

/// OCR engine that returns fixed tokens and records the last request.
pub struct ScriptedOcr {
    pub tokens: Vec<RecognizedToken>,
    pub languages: Vec<String>,
    pub last_request: Mutex<Option<OcrRequest>>,
}

impl ScriptedOcr {
    pub fn new(tokens: Vec<RecognizedToken>) -> Self {
        Self {
            tokens,
            languages: vec!["eng".to_string(), "deu".to_string(), "osd".to_string()],
            last_request: Mutex::new(None),
        }
    }

    pub fn last_request(&self) -> Option<OcrRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    fn available_languages(&self) -> Result<Vec<String>> {
        Ok(self.languages.clone())
    }

    fn recognize(&self, _image: &DynamicImage, request: &OcrRequest) -> Result<Vec<RecognizedToken>> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.tokens.clone())
    }
}

/// A recognized word on the given line of block 1.
pub fn word(text: &str, confidence: f32, line: u32, left: i32) -> RecognizedToken {
    RecognizedToken {
        text: text.to_string(),
        confidence,
        left,
        top: 20 * line as i32,
        width: 8 * text.len() as i32,
        height: 12,
        block: 1,
        paragraph: 1,
        line,
    }
}

/// A white page with a black bar, encoded as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut img = GrayImage::from_pixel(width, height, Luma([255]));
    for x in width / 4..width * 3 / 4 {
        for y in height / 2..height / 2 + 3 {
            img.put_pixel(x, y, Luma([0]));
        }
    }
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Wrap body XML in a minimal word-processing package.
pub fn docx_bytes(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let content_types = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(content_types.as_bytes()).unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", text)
}

pub fn table(rows: &[&[&str]]) -> String {
    let mut xml = String::from("<w:tbl>");
    for row in rows {
        xml.push_str("<w:tr>");
        for cell in row.iter() {
            xml.push_str("<w:tc>");
            xml.push_str(&paragraph(cell));
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}
