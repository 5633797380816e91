//! Turns engine tokens into [`OcrContent`].

use image::DynamicImage;

use super::backend::{OcrEngine, OcrRequest, RecognizedToken};
use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::model::{OcrContent, OcrSettingsUsed, WordDetail};

/// Runs recognition with an explicitly supplied engine.
pub struct OcrAdapter<'a> {
    engine: &'a dyn OcrEngine,
}

impl<'a> OcrAdapter<'a> {
    /// Create an adapter over an engine handle.
    pub fn new(engine: &'a dyn OcrEngine) -> Self {
        Self { engine }
    }

    /// Recognize a preprocessed image.
    ///
    /// The requested languages are checked against the engine's installed
    /// packs before recognition starts.
    pub fn recognize(&self, image: &DynamicImage, config: &OcrConfig) -> Result<OcrContent> {
        self.check_languages(config)?;

        let tokens = self
            .engine
            .recognize(image, &OcrRequest::from(config))?;
        let words = clean_tokens(tokens, config.char_whitelist.as_deref());
        log::debug!(
            "{} recognized {} words ({}x{} image)",
            self.engine.name(),
            words.len(),
            image.width(),
            image.height()
        );

        Ok(OcrContent {
            extracted_text: assemble_text(&words),
            ocr_settings_used: OcrSettingsUsed::from(config),
            word_level_details: words.into_iter().map(|w| w.detail).collect(),
            tables: Vec::new(),
        })
    }

    fn check_languages(&self, config: &OcrConfig) -> Result<()> {
        let available = self.engine.available_languages()?;
        if let Some(missing) = config
            .languages()
            .find(|lang| !available.iter().any(|a| a == lang))
        {
            return Err(Error::OcrLanguageUnsupported {
                language: missing.to_string(),
                available,
            });
        }
        Ok(())
    }
}

/// A kept word with its layout position.
struct Word {
    detail: WordDetail,
    block: u32,
    paragraph: u32,
    line: u32,
}

/// Drop structural and empty tokens, enforce the whitelist, clamp values.
fn clean_tokens(tokens: Vec<RecognizedToken>, whitelist: Option<&str>) -> Vec<Word> {
    tokens
        .into_iter()
        .filter(|t| t.confidence >= 0.0)
        .filter_map(|t| {
            let text: String = match whitelist {
                Some(allowed) => t.text.chars().filter(|c| allowed.contains(*c)).collect(),
                None => t.text.trim().to_string(),
            };
            if text.trim().is_empty() {
                return None;
            }
            Some(Word {
                detail: WordDetail {
                    text,
                    confidence: t.confidence.clamp(0.0, 100.0),
                    left: t.left.max(0) as u32,
                    top: t.top.max(0) as u32,
                    width: t.width.max(0) as u32,
                    height: t.height.max(0) as u32,
                },
                block: t.block,
                paragraph: t.paragraph,
                line: t.line,
            })
        })
        .collect()
}

/// Join words with spaces, lines with `\n`, paragraphs with a blank line.
fn assemble_text(words: &[Word]) -> String {
    let mut text = String::new();
    let mut previous: Option<&Word> = None;

    for word in words {
        if let Some(prev) = previous {
            let separator = if (prev.block, prev.paragraph) != (word.block, word.paragraph) {
                "\n\n"
            } else if prev.line != word.line {
                "\n"
            } else {
                " "
            };
            text.push_str(separator);
        }
        text.push_str(&word.detail.text);
        previous = Some(word);
    }

    text
}
