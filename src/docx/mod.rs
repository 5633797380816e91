//! DOCX extraction: body reader and structural walker.

mod backend;
mod walker;

pub use backend::{parse_body, BodyElement, DocxBackend, ZipDocxBackend};
pub use walker::{fragments, DocxWalker};
