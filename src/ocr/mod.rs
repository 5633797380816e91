//! OCR recognition: engine abstraction, Tesseract engine and the adapter
//! producing [`OcrContent`](crate::model::OcrContent).

mod adapter;
mod backend;
mod tesseract;

pub use adapter::OcrAdapter;
pub use backend::{OcrEngine, OcrRequest, RecognizedToken};
pub use tesseract::{parse_language_list, parse_tsv, TesseractEngine};
