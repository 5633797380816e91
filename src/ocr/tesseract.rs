//! Tesseract OCR engine.
//!
//! Runs the `tesseract` command-line program once per image and reads its
//! TSV output. Each call is an independent process.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{DynamicImage, ImageFormat};
use once_cell::sync::OnceCell;

use super::backend::{OcrEngine, OcrRequest, RecognizedToken};
use crate::error::{Error, Result};

const PROGRAM: &str = "tesseract";

/// stderr fragments tesseract prints when a traineddata file is missing.
const MISSING_LANGUAGE_HINTS: &[&str] = &[
    "Failed loading language",
    "Error opening data file",
    "Could not initialize tesseract",
];

/// [`OcrEngine`] backed by the `tesseract` program.
#[derive(Debug, Default)]
pub struct TesseractEngine {
    binary: Option<PathBuf>,
    languages: OnceCell<Vec<String>>,
}

impl TesseractEngine {
    /// Locate `tesseract` on the `PATH`.
    ///
    /// A missing program is reported on first use, not here.
    pub fn new() -> Self {
        let binary = which::which(PROGRAM).ok();
        if binary.is_none() {
            log::debug!("{} not found on PATH", PROGRAM);
        }
        Self {
            binary,
            languages: OnceCell::new(),
        }
    }

    /// Use an explicit program path.
    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(path.into()),
            languages: OnceCell::new(),
        }
    }

    /// Check if the program was found.
    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn binary(&self) -> Result<&Path> {
        self.binary.as_deref().ok_or_else(|| {
            Error::OcrEngineUnavailable(format!(
                "{} not found on PATH (install tesseract-ocr)",
                PROGRAM
            ))
        })
    }

    fn run(&self, command: &mut Command) -> Result<Output> {
        command.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                Error::OcrEngineUnavailable(format!("cannot run {}: {}", PROGRAM, e))
            }
            _ => Error::Io(e),
        })
    }

    fn list_languages(&self) -> Result<Vec<String>> {
        let output = self.run(Command::new(self.binary()?).arg("--list-langs"))?;
        if !output.status.success() {
            return Err(Error::OcrEngineUnavailable(format!(
                "{} --list-langs failed: {}",
                PROGRAM,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        // Older releases print the list on stderr
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_language_list(&text))
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        PROGRAM
    }

    fn available_languages(&self) -> Result<Vec<String>> {
        self.languages
            .get_or_try_init(|| self.list_languages())
            .cloned()
    }

    fn recognize(&self, image: &DynamicImage, request: &OcrRequest) -> Result<Vec<RecognizedToken>> {
        let binary = self.binary()?;

        let mut file = tempfile::Builder::new()
            .prefix("undoc-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .write_to(file.as_file_mut(), ImageFormat::Png)
            .map_err(|e| Error::UnexpectedExtractionFailure(format!("cannot stage image: {}", e)))?;

        let mut command = Command::new(binary);
        command
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&request.language)
            .arg("--oem")
            .arg(request.engine_mode.to_string())
            .arg("--psm")
            .arg(request.page_segmentation_mode.to_string());
        if let Some(whitelist) = &request.char_whitelist {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        command.arg("tsv");

        log::debug!(
            "Running {} -l {} --oem {} --psm {}",
            PROGRAM,
            request.language,
            request.engine_mode,
            request.page_segmentation_mode
        );
        let output = self.run(&mut command)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if MISSING_LANGUAGE_HINTS.iter().any(|hint| stderr.contains(hint)) {
                return Err(Error::OcrLanguageUnsupported {
                    language: request.language.clone(),
                    available: self.available_languages().unwrap_or_default(),
                });
            }
            return Err(Error::UnexpectedExtractionFailure(format!(
                "{} failed: {}",
                PROGRAM,
                stderr.trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `tesseract --list-langs` output.
pub fn parse_language_list(text: &str) -> Vec<String> {
    let mut languages: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(str::to_string)
        .collect();
    languages.sort();
    languages.dedup();
    languages
}

/// Parse tesseract TSV output into tokens.
///
/// Columns: level, page, block, paragraph, line, word, left, top, width,
/// height, conf, text. Rows that do not parse are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedToken> {
    tsv.lines()
        .skip_while(|line| line.starts_with("level"))
        .filter_map(parse_tsv_row)
        .collect()
}

fn parse_tsv_row(line: &str) -> Option<RecognizedToken> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return None;
    }
    let int = |i: usize| fields[i].trim().parse::<i32>().ok();
    let num = |i: usize| fields[i].trim().parse::<u32>().ok();

    Some(RecognizedToken {
        text: fields.get(11).map(|t| t.to_string()).unwrap_or_default(),
        confidence: fields[10].trim().parse().ok()?,
        left: int(6)?,
        top: int(7)?,
        width: int(8)?,
        height: int(9)?,
        block: num(2)?,
        paragraph: num(3)?,
        line: num(4)?,
    })
}
