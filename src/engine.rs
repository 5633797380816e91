//! Request dispatch.
//!
//! The [`Engine`] classifies an uploaded document, runs the matching
//! extraction path and normalizes the result. Backends are held behind
//! `Arc`s so an engine is cheap to clone and can be shared across threads.
//!
//! # Example
//!
//! ```no_run
//! use undoc::{Engine, ExtractionConfig};
//!
//! let engine = Engine::new();
//! let bytes = std::fs::read("report.docx")?;
//! let doc = engine.process(&bytes, "report.docx", &ExtractionConfig::default())?;
//! println!("{}", doc.text());
//! # Ok::<(), undoc::Error>(())
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{ErrorMode, ExtractionConfig, OcrConfig, PdfTableConfig};
use crate::detect::{classify, detect_pdf_format};
use crate::docx::{DocxBackend, DocxWalker, ZipDocxBackend};
use crate::error::{Error, ErrorClass, Result};
use crate::model::{Content, OcrContent, ProcessedDocument, SourceDocument, SourceType};
use crate::normalize::{normalize, RequestMeta};
use crate::ocr::{OcrAdapter, OcrEngine, TesseractEngine};
use crate::pdf::{LopdfBackend, PdfBackend, PdfDocument, PdfWalker};
use crate::preprocess;
use crate::weave::weave;

/// PDF extraction settings taken from the request.
#[derive(Debug, Clone, Copy)]
pub struct PdfPlan<'c> {
    /// Table detection settings
    pub tables: &'c PdfTableConfig,
    /// Page error handling
    pub error_mode: ErrorMode,
    /// Analyze pages in parallel
    pub parallel: bool,
    /// Minimum text length and OCR settings of the scanned-PDF fallback
    pub ocr_fallback: Option<(usize, &'c OcrConfig)>,
}

/// One extraction path per source type, each with its slice of the config.
#[derive(Debug, Clone, Copy)]
pub enum Extraction<'c> {
    /// Structural DOCX walk
    Docx,
    /// PDF text layer walk with table detection
    Pdf(PdfPlan<'c>),
    /// Preprocessing and OCR
    Image(&'c OcrConfig),
}

impl<'c> Extraction<'c> {
    /// Select the path for a source type.
    pub fn select(source_type: SourceType, config: &'c ExtractionConfig) -> Self {
        match source_type {
            SourceType::Docx => Extraction::Docx,
            SourceType::Pdf => Extraction::Pdf(PdfPlan {
                tables: &config.pdf,
                error_mode: config.error_mode,
                parallel: config.parallel,
                ocr_fallback: config
                    .pdf_ocr_fallback
                    .enabled
                    .then_some((config.pdf_ocr_fallback.min_text_chars, &config.ocr)),
            }),
            SourceType::Png
            | SourceType::Jpeg
            | SourceType::Tiff
            | SourceType::Bmp
            | SourceType::Webp => Extraction::Image(&config.ocr),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    System,
    Fixed(DateTime<Utc>),
}

/// Document extraction engine.
#[derive(Clone)]
pub struct Engine {
    docx: Arc<dyn DocxBackend>,
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    clock: Clock,
}

impl Engine {
    /// Create an engine with the default backends.
    pub fn new() -> Self {
        Self {
            docx: Arc::new(ZipDocxBackend::new()),
            pdf: Arc::new(LopdfBackend),
            ocr: Arc::new(TesseractEngine::new()),
            clock: Clock::System,
        }
    }

    /// Replace the DOCX backend.
    pub fn with_docx_backend(mut self, backend: Arc<dyn DocxBackend>) -> Self {
        self.docx = backend;
        self
    }

    /// Replace the PDF backend.
    pub fn with_pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.pdf = backend;
        self
    }

    /// Replace the OCR engine.
    pub fn with_ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = engine;
        self
    }

    /// Stamp every result with a fixed extraction time.
    pub fn with_fixed_time(mut self, at: DateTime<Utc>) -> Self {
        self.clock = Clock::Fixed(at);
        self
    }

    /// The OCR engine handle.
    pub fn ocr_engine(&self) -> &dyn OcrEngine {
        self.ocr.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        match self.clock {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => at,
        }
    }

    /// Extract a document.
    ///
    /// `filename` is a hint; only its final path component is reported.
    pub fn process(
        &self,
        bytes: &[u8],
        filename: &str,
        config: &ExtractionConfig,
    ) -> Result<ProcessedDocument> {
        config.validate()?;

        let source = SourceDocument::new(bytes, filename);
        let source_type = classify(&source)?;
        log::info!(
            "Processing {} as {} ({} bytes)",
            source.basename(),
            source_type,
            bytes.len()
        );

        let extraction = Extraction::select(source_type, config);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.extract(&source, extraction)))
            .unwrap_or_else(|payload| {
                Err(Error::UnexpectedExtractionFailure(format!(
                    "extraction panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        let content = match outcome {
            Ok(content) => content,
            Err(e) => {
                if e.class() == ErrorClass::Internal {
                    log::error!("{} ({}): {}", source.basename(), source_type, e);
                } else {
                    log::warn!("{} ({}): {}", source.basename(), source_type, e);
                }
                return Err(e);
            }
        };

        Ok(normalize(
            RequestMeta {
                filename: source.basename().to_string(),
                source_type,
                extracted_at: self.now(),
            },
            content,
        ))
    }

    /// Run one extraction path.
    pub fn extract(&self, source: &SourceDocument<'_>, extraction: Extraction<'_>) -> Result<Content> {
        match extraction {
            Extraction::Docx => {
                let fragments = DocxWalker::new(self.docx.as_ref()).walk(source.bytes())?;
                Ok(Content::Document(weave(fragments)?))
            }
            Extraction::Pdf(plan) => self.extract_pdf(source.bytes(), plan),
            Extraction::Image(ocr) => {
                let image = preprocess::decode(source.bytes())?;
                let prepared = preprocess::preprocess(image, ocr);
                let content = OcrAdapter::new(self.ocr.as_ref()).recognize(&prepared, ocr)?;
                Ok(Content::Ocr(content))
            }
        }
    }

    fn extract_pdf(&self, bytes: &[u8], plan: PdfPlan<'_>) -> Result<Content> {
        if let Some(format) = detect_pdf_format(bytes) {
            log::debug!("Detected {}", format);
        }

        let doc = self.pdf.open(bytes)?;
        let fragments = PdfWalker::new(plan.tables)
            .with_error_mode(plan.error_mode)
            .with_parallel(plan.parallel)
            .walk(doc.as_ref())?;
        let content = weave(fragments)?;

        if let Some((min_chars, ocr)) = plan.ocr_fallback {
            let length = content.extracted_text_with_placeholders.trim().chars().count();
            if length < min_chars {
                log::info!(
                    "PDF text layer has {} characters (< {}), trying OCR",
                    length,
                    min_chars
                );
                if let Some(scanned) = self.ocr_first_page(doc.as_ref(), ocr) {
                    return Ok(Content::Ocr(scanned));
                }
            }
        }

        Ok(Content::Document(content))
    }

    /// OCR the largest image of page 1. Any failure keeps the direct result.
    fn ocr_first_page(&self, doc: &dyn PdfDocument, config: &OcrConfig) -> Option<OcrContent> {
        if doc.page_count() == 0 {
            return None;
        }
        let image = match doc.page_image(1) {
            Ok(Some(image)) => image,
            Ok(None) => {
                log::debug!("No image on page 1, keeping direct extraction");
                return None;
            }
            Err(e) => {
                log::warn!("Cannot read page 1 image: {}", e);
                return None;
            }
        };

        let prepared = preprocess::preprocess(image, config);
        match OcrAdapter::new(self.ocr.as_ref()).recognize(&prepared, config) {
            Ok(content) if !content.extracted_text.trim().is_empty() => Some(content),
            Ok(_) => {
                log::info!("OCR fallback produced no text, keeping direct extraction");
                None
            }
            Err(e) => {
                log::warn!("OCR fallback failed: {}", e);
                None
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ocr", &self.ocr.name())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
