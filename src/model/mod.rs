//! Document model types for extracted content.
//!
//! This module defines the representation shared by every extraction path:
//! walkers emit [`Fragment`]s, the weaver folds them into [`DocumentContent`],
//! and the normalizer wraps the result into a [`ProcessedDocument`].

mod content;
mod document;
mod fragment;
mod source;
mod table;

pub use content::{Content, DocumentContent, OcrContent, OcrSettingsUsed, WordDetail};
pub use document::{ProcessedDocument, ProcessingMethod};
pub use fragment::{Fragment, TextFragment};
pub use source::{SourceDocument, SourceType};
pub use table::{table_id, CellValue, RawTable, TableFragment, TableSequence};
