//! Error types for the undoc library.

use std::io;
use thiserror::Error;

/// Result type alias for undoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// The file kind is not recognized or not supported.
    #[error("Unsupported source type for '{filename}': {detail}")]
    UnsupportedSourceType {
        /// Filename hint of the rejected document
        filename: String,
        /// What was detected (extension and/or signature)
        detail: String,
    },

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The DOCX or PDF payload is malformed or corrupt.
    #[error("Invalid document data: {0}")]
    InvalidDocumentData(String),

    /// The image payload cannot be decoded.
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),

    /// The OCR engine is not installed or not reachable on this host.
    #[error("OCR engine unavailable: {0}")]
    OcrEngineUnavailable(String),

    /// The requested OCR language pack is not installed.
    #[error("OCR language '{language}' is not installed (available: {})", available.join(", "))]
    OcrLanguageUnsupported {
        /// Requested language code
        language: String,
        /// Language packs reported by the engine
        available: Vec<String>,
    },

    /// Any other internal fault.
    #[error("Unexpected extraction failure: {0}")]
    UnexpectedExtractionFailure(String),

    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a caller should surface an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is at fault
    Client,
    /// The deployment lacks a required capability
    NotImplemented,
    /// Internal fault
    Internal,
}

impl Error {
    /// Classify the error for the caller.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UnsupportedSourceType { .. }
            | Error::InvalidConfig(_)
            | Error::InvalidDocumentData(_)
            | Error::InvalidImageData(_)
            | Error::OcrLanguageUnsupported { .. } => ErrorClass::Client,
            Error::OcrEngineUnavailable(_) => ErrorClass::NotImplemented,
            Error::UnexpectedExtractionFailure(_) | Error::Io(_) => ErrorClass::Internal,
        }
    }

    /// HTTP status code a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnsupportedSourceType { .. } | Error::InvalidConfig(_) => 400,
            Error::InvalidDocumentData(_)
            | Error::InvalidImageData(_)
            | Error::OcrLanguageUnsupported { .. } => 422,
            Error::OcrEngineUnavailable(_) => 501,
            Error::UnexpectedExtractionFailure(_) | Error::Io(_) => 500,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => {
                Error::InvalidDocumentData("PDF is encrypted".to_string())
            }
            _ => Error::InvalidDocumentData(format!("PDF parsing error: {}", err)),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::InvalidDocumentData(format!("DOCX container error: {}", err))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::InvalidDocumentData(format!("DOCX XML error: {}", err))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::InvalidImageData(err.to_string())
    }
}
