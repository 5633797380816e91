//! Reading-order fragments emitted by the structural walkers.

use super::TableFragment;

/// A unit of prose text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFragment {
    /// Plain text, possibly empty
    pub text: String,
}

impl TextFragment {
    /// Create a text fragment.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Check if the fragment has no visible text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One element of a walker's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Prose
    Text(TextFragment),
    /// A numbered table
    Table(TableFragment),
    /// Boundary between two PDF pages
    PageBreak,
}

impl Fragment {
    /// Create a text fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text(TextFragment::new(text))
    }

    /// Get the table, if this is a table fragment.
    pub fn as_table(&self) -> Option<&TableFragment> {
        match self {
            Fragment::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<TableFragment> for Fragment {
    fn from(table: TableFragment) -> Self {
        Fragment::Table(table)
    }
}
