//! # undoc
//!
//! Document content extraction for DOCX, PDF and scanned images.
//!
//! Every source is reduced to the same shape: prose text in reading order
//! with `[[INSERT_TABLE:<id>]]` markers where tables occurred, plus the list
//! of those tables. Images (and PDFs without a text layer) go through
//! preprocessing and OCR instead and carry per-word confidence and geometry.
//!
//! ## Quick Start
//!
//! ```no_run
//! use undoc::{process_file, render, ExtractionConfig};
//!
//! fn main() -> undoc::Result<()> {
//!     let doc = process_file("report.pdf", &ExtractionConfig::default())?;
//!
//!     for table in doc.tables() {
//!         println!("{}: {} rows", table.id, table.row_count());
//!     }
//!
//!     let json = render::to_json(&doc, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Placeholder linking**: tables are cut out of the prose and referenced by id
//! - **PDF table strategies**: ruled grids (strict or relaxed), whitespace alignment
//! - **OCR**: grayscale, Otsu binarization and deskew before Tesseract
//! - **Scanned PDF fallback**: OCR of the first page image when the text layer is empty
//! - **Parallel processing**: Uses Rayon for multi-page documents

pub mod config;
pub mod detect;
pub mod docx;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod render;
pub mod weave;

// Re-export commonly used types
pub use config::{
    ErrorMode, ExtractionConfig, OcrConfig, PdfOcrFallback, PdfTableConfig, TableStrategy,
};
pub use detect::{classify, detect_pdf_format, sniff, PdfFormat};
pub use engine::{Engine, Extraction, PdfPlan};
pub use error::{Error, ErrorClass, Result};
pub use model::{
    CellValue, Content, DocumentContent, Fragment, OcrContent, OcrSettingsUsed,
    ProcessedDocument, ProcessingMethod, SourceDocument, SourceType, TableFragment,
    TextFragment, WordDetail,
};
pub use render::{JsonFormat, PlaceholderMode};

use std::path::Path;

use once_cell::sync::Lazy;

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(Engine::new);

/// The process-wide engine behind [`process`] and [`process_file`].
///
/// It is built once, so the OCR engine lookup and its language list are
/// resolved on first use and reused afterwards.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// Extract a document with the default engine.
///
/// # Arguments
///
/// * `bytes` - Document content
/// * `filename` - Filename hint, used for the extension and the reported name
/// * `config` - Extraction settings
///
/// # Example
///
/// ```no_run
/// use undoc::{process, ExtractionConfig, TableStrategy};
///
/// let bytes = std::fs::read("statement.pdf").unwrap();
/// let config = ExtractionConfig::new().with_table_strategy(TableStrategy::Text);
/// let doc = process(&bytes, "statement.pdf", &config).unwrap();
/// println!("{}", doc.text());
/// ```
pub fn process(bytes: &[u8], filename: &str, config: &ExtractionConfig) -> Result<ProcessedDocument> {
    default_engine().process(bytes, filename, config)
}

/// Read and extract a file with the default engine.
pub fn process_file<P: AsRef<Path>>(path: P, config: &ExtractionConfig) -> Result<ProcessedDocument> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    process(&bytes, &path.to_string_lossy(), config)
}

/// Extract a file and render the JSON response.
///
/// # Example
///
/// ```no_run
/// use undoc::{extract_json, ExtractionConfig, JsonFormat};
///
/// let json = extract_json("scan.png", &ExtractionConfig::default(), JsonFormat::Pretty).unwrap();
/// std::fs::write("scan.json", json).unwrap();
/// ```
pub fn extract_json<P: AsRef<Path>>(
    path: P,
    config: &ExtractionConfig,
    format: JsonFormat,
) -> Result<String> {
    let doc = process_file(path, config)?;
    render::to_json(&doc, format)
}

/// Extract a file as plain text, keeping table markers and appending the tables.
pub fn extract_text<P: AsRef<Path>>(path: P, config: &ExtractionConfig) -> Result<String> {
    let doc = process_file(path, config)?;
    Ok(render::to_text(&doc, PlaceholderMode::Keep))
}
