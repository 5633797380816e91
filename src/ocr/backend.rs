//! OCR engine abstraction.

use image::DynamicImage;

use crate::config::OcrConfig;
use crate::error::Result;

/// Parameters of one recognition call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    /// Language code(s), `+`-joined
    pub language: String,
    /// Page segmentation mode
    pub page_segmentation_mode: u8,
    /// Engine mode
    pub engine_mode: u8,
    /// Restrict recognition to these characters
    pub char_whitelist: Option<String>,
}

impl From<&OcrConfig> for OcrRequest {
    fn from(config: &OcrConfig) -> Self {
        Self {
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            engine_mode: config.engine_mode,
            char_whitelist: config.char_whitelist.clone(),
        }
    }
}

/// One token as reported by an engine.
///
/// Layout numbers identify the block, paragraph and line the token belongs
/// to; a confidence of `-1` marks structural rows without text.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedToken {
    /// Recognized text (empty for structural rows)
    pub text: String,
    /// Confidence from 0 to 100, or -1
    pub confidence: f32,
    /// Left edge in pixels
    pub left: i32,
    /// Top edge in pixels
    pub top: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Block number within the page
    pub block: u32,
    /// Paragraph number within the block
    pub paragraph: u32,
    /// Line number within the paragraph
    pub line: u32,
}

/// A text recognition engine.
///
/// Implementations hold no per-request state and may be called from several
/// threads at once.
pub trait OcrEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Installed language packs.
    ///
    /// Fails with `OcrEngineUnavailable` when the engine itself is missing.
    fn available_languages(&self) -> Result<Vec<String>>;

    /// Recognize the tokens of an image.
    fn recognize(&self, image: &DynamicImage, request: &OcrRequest) -> Result<Vec<RecognizedToken>>;
}
