//! Extraction configuration.
//!
//! Every sub-config carries the documented defaults in its `Default` impl and
//! can be loaded from JSON (missing fields fall back to those defaults).

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerance used by the `text` strategy when none is given.
pub const DEFAULT_TEXT_TOLERANCE: u32 = 3;
/// Largest accepted `text_tolerance`.
pub const MAX_TEXT_TOLERANCE: u32 = 50;
/// Largest Tesseract page segmentation mode.
pub const MAX_PAGE_SEGMENTATION_MODE: u8 = 13;
/// Largest Tesseract engine mode.
pub const MAX_ENGINE_MODE: u8 = 4;

static LANGUAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+(\+[A-Za-z0-9_]+)*$").expect("valid language regex"));

/// Full configuration for one extraction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// PDF table detection settings
    pub pdf: PdfTableConfig,
    /// OCR settings (image sources and the scanned-PDF fallback)
    pub ocr: OcrConfig,
    /// Scanned-PDF OCR fallback
    pub pdf_ocr_fallback: PdfOcrFallback,
    /// What to do with a PDF page that cannot be decoded
    pub error_mode: ErrorMode,
    /// Walk PDF pages in parallel
    pub parallel: bool,
}

impl ExtractionConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Replace the PDF table settings.
    pub fn with_pdf(mut self, pdf: PdfTableConfig) -> Self {
        self.pdf = pdf;
        self
    }

    /// Replace the OCR settings.
    pub fn with_ocr(mut self, ocr: OcrConfig) -> Self {
        self.ocr = ocr;
        self
    }

    /// Set the PDF table strategy.
    pub fn with_table_strategy(mut self, strategy: TableStrategy) -> Self {
        self.pdf.strategy = strategy;
        self
    }

    /// Set the `text` strategy tolerance in points.
    pub fn with_text_tolerance(mut self, tolerance: u32) -> Self {
        self.pdf.text_tolerance = Some(tolerance);
        self
    }

    /// Drop PDF table rows whose cells are all empty.
    pub fn remove_empty_rows(mut self) -> Self {
        self.pdf.remove_empty_rows = true;
        self
    }

    /// Set the OCR language.
    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr.language = language.into();
        self
    }

    /// Restrict OCR output to the given characters.
    pub fn with_char_whitelist(mut self, whitelist: impl Into<String>) -> Self {
        self.ocr.char_whitelist = Some(whitelist.into());
        self
    }

    /// Configure the scanned-PDF OCR fallback.
    pub fn with_pdf_ocr_fallback(mut self, fallback: PdfOcrFallback) -> Self {
        self.pdf_ocr_fallback = fallback;
        self
    }

    /// Disable the scanned-PDF OCR fallback.
    pub fn without_pdf_ocr_fallback(mut self) -> Self {
        self.pdf_ocr_fallback.enabled = false;
        self
    }

    /// Skip undecodable PDF pages instead of failing.
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Disable parallel page processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Check every value against its documented range.
    pub fn validate(&self) -> Result<()> {
        self.pdf.validate()?;
        self.ocr.validate()
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf: PdfTableConfig::default(),
            ocr: OcrConfig::default(),
            pdf_ocr_fallback: PdfOcrFallback::default(),
            error_mode: ErrorMode::Strict,
            parallel: true,
        }
    }
}

/// Table detection algorithm for PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum TableStrategy {
    /// Ruling lines only, closed grids only
    #[default]
    LinesStrict,
    /// Ruling lines and rectangle edges
    Lines,
    /// Whitespace alignment of text tokens
    Text,
    /// The backend's own heuristic
    EngineDefault,
}

impl TableStrategy {
    /// Resolve a strategy name. Unknown names fall back to `lines_strict`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "lines_strict" => TableStrategy::LinesStrict,
            "lines" => TableStrategy::Lines,
            "text" => TableStrategy::Text,
            "engine_default" | "pymupdf_default" => TableStrategy::EngineDefault,
            other => {
                log::warn!(
                    "Unknown table strategy '{}', falling back to lines_strict",
                    other
                );
                TableStrategy::LinesStrict
            }
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStrategy::LinesStrict => "lines_strict",
            TableStrategy::Lines => "lines",
            TableStrategy::Text => "text",
            TableStrategy::EngineDefault => "engine_default",
        }
    }
}

impl From<String> for TableStrategy {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl fmt::Display for TableStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PDF table detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfTableConfig {
    /// Detection algorithm
    pub strategy: TableStrategy,
    /// Alignment tolerance in points for the `text` strategy (0-50)
    pub text_tolerance: Option<u32>,
    /// Drop data rows whose cells are all empty
    pub remove_empty_rows: bool,
}

impl PdfTableConfig {
    /// Create settings for the given strategy.
    pub fn new(strategy: TableStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Set the text tolerance.
    pub fn with_text_tolerance(mut self, tolerance: u32) -> Self {
        self.text_tolerance = Some(tolerance);
        self
    }

    /// Enable or disable empty row removal.
    pub fn with_remove_empty_rows(mut self, remove: bool) -> Self {
        self.remove_empty_rows = remove;
        self
    }

    /// Tolerance the `text` strategy actually uses.
    pub fn effective_text_tolerance(&self) -> f32 {
        self.text_tolerance.unwrap_or(DEFAULT_TEXT_TOLERANCE) as f32
    }

    fn validate(&self) -> Result<()> {
        if let Some(tolerance) = self.text_tolerance {
            if tolerance > MAX_TEXT_TOLERANCE {
                return Err(Error::InvalidConfig(format!(
                    "text_tolerance must be between 0 and {}, got {}",
                    MAX_TEXT_TOLERANCE, tolerance
                )));
            }
        }
        Ok(())
    }
}

/// OCR settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. `eng` or `eng+deu`
    pub language: String,
    /// Page segmentation mode (0-13)
    pub page_segmentation_mode: u8,
    /// OCR engine mode (0-4)
    pub engine_mode: u8,
    /// Grayscale + binarize (+ deskew) before recognition
    pub apply_preprocessing: bool,
    /// Correct text-line skew (only with preprocessing)
    pub deskew: bool,
    /// Restrict recognition to these characters
    pub char_whitelist: Option<String>,
}

impl OcrConfig {
    /// Create OCR settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the page segmentation mode.
    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = psm;
        self
    }

    /// Set the engine mode.
    pub fn with_engine_mode(mut self, oem: u8) -> Self {
        self.engine_mode = oem;
        self
    }

    /// Enable or disable preprocessing.
    pub fn with_preprocessing(mut self, apply: bool) -> Self {
        self.apply_preprocessing = apply;
        self
    }

    /// Enable or disable deskew.
    pub fn with_deskew(mut self, deskew: bool) -> Self {
        self.deskew = deskew;
        self
    }

    /// Set the character whitelist.
    pub fn with_char_whitelist(mut self, whitelist: impl Into<String>) -> Self {
        self.char_whitelist = Some(whitelist.into());
        self
    }

    /// Whether deskew actually runs.
    pub fn deskew_applied(&self) -> bool {
        self.deskew && self.apply_preprocessing
    }

    /// Individual language codes of a `+`-joined language string.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.language.split('+').filter(|l| !l.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if !LANGUAGE_PATTERN.is_match(&self.language) {
            return Err(Error::InvalidConfig(format!(
                "invalid OCR language '{}'",
                self.language
            )));
        }
        if self.page_segmentation_mode > MAX_PAGE_SEGMENTATION_MODE {
            return Err(Error::InvalidConfig(format!(
                "page_segmentation_mode must be between 0 and {}, got {}",
                MAX_PAGE_SEGMENTATION_MODE, self.page_segmentation_mode
            )));
        }
        if self.engine_mode > MAX_ENGINE_MODE {
            return Err(Error::InvalidConfig(format!(
                "engine_mode must be between 0 and {}, got {}",
                MAX_ENGINE_MODE, self.engine_mode
            )));
        }
        if let Some(whitelist) = &self.char_whitelist {
            if whitelist.is_empty() || whitelist.chars().any(char::is_whitespace) {
                return Err(Error::InvalidConfig(
                    "char_whitelist must be non-empty and contain no whitespace".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: 3,
            engine_mode: 3,
            apply_preprocessing: true,
            deskew: true,
            char_whitelist: None,
        }
    }
}

/// OCR fallback for PDFs without a usable text layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOcrFallback {
    /// Try OCR when the text layer is too short
    pub enabled: bool,
    /// Text shorter than this (after trimming) triggers the fallback
    pub min_text_chars: usize,
}

impl Default for PdfOcrFallback {
    fn default() -> Self {
        Self {
            enabled: true,
            min_text_chars: 100,
        }
    }
}

/// Error handling mode for PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Fail on any undecodable page
    #[default]
    Strict,
    /// Skip undecodable pages and continue
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.pdf.strategy, TableStrategy::LinesStrict);
        assert_eq!(config.pdf.text_tolerance, None);
        assert!(!config.pdf.remove_empty_rows);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.page_segmentation_mode, 3);
        assert_eq!(config.ocr.engine_mode, 3);
        assert!(config.ocr.apply_preprocessing);
        assert!(config.ocr.deskew);
        assert_eq!(config.ocr.char_whitelist, None);
        assert_eq!(config.error_mode, ErrorMode::Strict);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ExtractionConfig::new()
            .with_table_strategy(TableStrategy::Text)
            .with_text_tolerance(10)
            .remove_empty_rows()
            .with_ocr_language("deu")
            .lenient()
            .sequential();

        assert_eq!(config.pdf.strategy, TableStrategy::Text);
        assert_eq!(config.pdf.effective_text_tolerance(), 10.0);
        assert!(config.pdf.remove_empty_rows);
        assert_eq!(config.ocr.language, "deu");
        assert_eq!(config.error_mode, ErrorMode::Lenient);
        assert!(!config.parallel);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(TableStrategy::from_name("lines"), TableStrategy::Lines);
        assert_eq!(TableStrategy::from_name("TEXT"), TableStrategy::Text);
        assert_eq!(
            TableStrategy::from_name("pymupdf_default"),
            TableStrategy::EngineDefault
        );
        assert_eq!(
            TableStrategy::from_name("bogus"),
            TableStrategy::LinesStrict
        );
        assert_eq!(TableStrategy::EngineDefault.to_string(), "engine_default");
    }

    #[test]
    fn test_validation_ranges() {
        let config = ExtractionConfig::new().with_text_tolerance(51);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ExtractionConfig::new().with_text_tolerance(50);
        assert!(config.validate().is_ok());

        let config =
            ExtractionConfig::new().with_ocr(OcrConfig::new().with_page_segmentation_mode(14));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ExtractionConfig::new().with_ocr(OcrConfig::new().with_engine_mode(5));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_language_validation() {
        for ok in ["eng", "eng+deu", "chi_sim"] {
            assert!(OcrConfig::new().with_language(ok).validate().is_ok(), "{ok}");
        }
        for bad in ["", "eng+", "eng deu", "--psm"] {
            assert!(OcrConfig::new().with_language(bad).validate().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_whitelist_validation() {
        assert!(OcrConfig::new().with_char_whitelist("0123456789").validate().is_ok());
        assert!(OcrConfig::new().with_char_whitelist("").validate().is_err());
        assert!(OcrConfig::new().with_char_whitelist("0 1").validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ExtractionConfig::from_json(r#"{"pdf": {"strategy": "text", "text_tolerance": 8}}"#)
                .unwrap();
        assert_eq!(config.pdf.strategy, TableStrategy::Text);
        assert_eq!(config.pdf.text_tolerance, Some(8));
        assert_eq!(config.ocr, OcrConfig::default());
    }

    #[test]
    fn test_from_json_rejects_out_of_range() {
        let result = ExtractionConfig::from_json(r#"{"ocr": {"engine_mode": 9}}"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result = ExtractionConfig::from_json("{not json");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_deskew_applied() {
        assert!(OcrConfig::new().deskew_applied());
        assert!(!OcrConfig::new().with_preprocessing(false).deskew_applied());
        assert!(!OcrConfig::new().with_deskew(false).deskew_applied());
    }

    #[test]
    fn test_strategy_serde_roundtrip_name() {
        let json = serde_json::to_string(&TableStrategy::LinesStrict).unwrap();
        assert_eq!(json, "\"lines_strict\"");
    }
}
