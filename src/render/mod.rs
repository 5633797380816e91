//! Rendering of processed documents into response formats.

mod json;
mod text;

pub use json::{to_json, to_text_response, JsonFormat};
pub use text::{to_text, PlaceholderMode};
