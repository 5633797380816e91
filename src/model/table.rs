//! Table types.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INTEGER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("valid integer regex"));
static DECIMAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)\.[0-9]+$").expect("valid decimal regex"));

/// Identifier of the n-th table of a document (1-based): `table001`, `table002`, ...
pub fn table_id(ordinal: usize) -> String {
    format!("table{:03}", ordinal)
}

/// A single table cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Whole number
    Integer(i64),
    /// Decimal number
    Float(f64),
    /// Any other text
    Text(String),
    /// No content (e.g. covered by a merged neighbour)
    Null,
}

impl CellValue {
    /// Type a cell from its text.
    ///
    /// Only unambiguous numbers become numeric: optional minus, digits without
    /// a leading zero, optional fraction. `"007"`, `"1,000"` or `"1e3"` stay text.
    /// A number must also render back to exactly what was written, so
    /// `"3.0"`, `"1.50"` and `"-0"` stay text too.
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        if INTEGER_PATTERN.is_match(trimmed) {
            if let Ok(n) = trimmed.parse::<i64>() {
                if n.to_string() == trimmed {
                    return CellValue::Integer(n);
                }
            }
        } else if DECIMAL_PATTERN.is_match(trimmed) {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() && n.to_string() == trimmed {
                    return CellValue::Float(n);
                }
            }
        }
        CellValue::Text(text.to_string())
    }

    /// Type an optional cell; `None` becomes [`CellValue::Null`].
    pub fn infer_optional(text: Option<&str>) -> Self {
        text.map(Self::infer).unwrap_or(CellValue::Null)
    }

    /// Check if the cell is null or whitespace only.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Float(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Null => Ok(()),
        }
    }
}

/// A table as found by a walker, before it is numbered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Cell texts row by row; `None` marks a cell with no content of its own
    pub rows: Vec<Vec<Option<String>>>,
    /// 1-based page the table was found on (PDF only)
    pub page_number: Option<u32>,
}

impl RawTable {
    /// Create a table from plain string rows.
    pub fn from_strings<S: Into<String>>(rows: impl IntoIterator<Item = Vec<S>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|c| Some(c.into())).collect())
                .collect(),
            page_number: None,
        }
    }

    /// Stamp the page number.
    pub fn on_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }
}

/// A numbered table in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFragment {
    /// Unique id, referenced by the `[[INSERT_TABLE:<id>]]` marker
    pub id: String,

    /// 1-based ordinal among the document's tables
    pub position: usize,

    /// Table caption
    pub caption: Option<String>,

    /// Header row (first row of the table)
    pub headers: Vec<String>,

    /// Data rows
    #[serde(rename = "data", alias = "rows")]
    pub rows: Vec<Vec<CellValue>>,

    /// 1-based page number (PDF only)
    pub page_number: Option<u32>,
}

impl TableFragment {
    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (header or widest row).
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Placeholder marker for this table.
    pub fn marker(&self) -> String {
        crate::weave::marker(&self.id)
    }

    /// Get plain text representation (tab-separated, header first).
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if !self.headers.is_empty() {
            lines.push(
                self.headers
                    .iter()
                    .map(|h| h.trim())
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        for row in &self.rows {
            lines.push(
                row.iter()
                    .map(|c| c.to_string().trim().to_string())
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        lines.join("\n")
    }
}

/// Hands out table ids and positions in document order.
#[derive(Debug, Default)]
pub struct TableSequence {
    assigned: usize,
}

impl TableSequence {
    /// Start a new sequence at `table001`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables assigned so far.
    pub fn len(&self) -> usize {
        self.assigned
    }

    /// Check if no table has been assigned.
    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Number the next table.
    ///
    /// The first row becomes the header. With `remove_empty_rows`, data rows
    /// whose cells are all blank are dropped; the header is always kept.
    pub fn assign(&mut self, raw: RawTable, remove_empty_rows: bool) -> TableFragment {
        self.assigned += 1;

        let mut rows = raw.rows.into_iter();
        let headers = rows
            .next()
            .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
            .unwrap_or_default();

        let rows: Vec<Vec<CellValue>> = rows
            .map(|row| {
                row.iter()
                    .map(|cell| CellValue::infer_optional(cell.as_deref()))
                    .collect::<Vec<_>>()
            })
            .filter(|row| !(remove_empty_rows && row.iter().all(CellValue::is_blank)))
            .collect();

        TableFragment {
            id: table_id(self.assigned),
            position: self.assigned,
            caption: None,
            headers,
            rows,
            page_number: raw.page_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_format() {
        assert_eq!(table_id(1), "table001");
        assert_eq!(table_id(42), "table042");
        assert_eq!(table_id(1000), "table1000");
    }

    #[test]
    fn test_cell_infer_numbers() {
        assert_eq!(CellValue::infer("1"), CellValue::Integer(1));
        assert_eq!(CellValue::infer(" -12 "), CellValue::Integer(-12));
        assert_eq!(CellValue::infer("0"), CellValue::Integer(0));
        assert_eq!(CellValue::infer("3.25"), CellValue::Float(3.25));
        assert_eq!(CellValue::infer("0.5"), CellValue::Float(0.5));
    }

    #[test]
    fn test_cell_infer_ambiguous_stays_text() {
        for text in ["007", "1,000", "1e3", "1.", ".5", "12a", "", "N/A", "$5"] {
            assert_eq!(CellValue::infer(text), CellValue::Text(text.to_string()), "{text}");
        }
        // Out of i64 range
        let huge = "99999999999999999999";
        assert_eq!(CellValue::infer(huge), CellValue::Text(huge.to_string()));
    }

    #[test]
    fn test_cell_infer_keeps_written_form() {
        for text in ["3.0", "1.50", "-0", "-0.0", "0.10"] {
            let value = CellValue::infer(text);
            assert_eq!(value, CellValue::Text(text.to_string()), "{text}");
            assert_eq!(value.to_string(), text);
        }
        assert_eq!(CellValue::infer("2.25").to_string(), "2.25");
        assert_eq!(CellValue::infer("-4").to_string(), "-4");
    }

    #[test]
    fn test_cell_blank() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::Text("  ".into()).is_blank());
        assert!(!CellValue::Integer(0).is_blank());
    }

    #[test]
    fn test_cell_serialization() {
        let row = vec![
            CellValue::Text("a".into()),
            CellValue::Integer(1),
            CellValue::Float(2.5),
            CellValue::Null,
        ];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"["a",1,2.5,null]"#);

        let back: Vec<CellValue> = serde_json::from_str(r#"["a",1,2.5,null]"#).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_sequence_assign() {
        let mut seq = TableSequence::new();
        let first = seq.assign(RawTable::from_strings(vec![vec!["H1", "H2"], vec!["a", "1"]]), false);
        assert_eq!(first.id, "table001");
        assert_eq!(first.position, 1);
        assert_eq!(first.headers, vec!["H1", "H2"]);
        assert_eq!(
            first.rows,
            vec![vec![CellValue::Text("a".into()), CellValue::Integer(1)]]
        );
        assert_eq!(first.page_number, None);

        let second = seq.assign(RawTable::default().on_page(3), false);
        assert_eq!(second.id, "table002");
        assert_eq!(second.position, 2);
        assert!(second.headers.is_empty());
        assert_eq!(second.page_number, Some(3));
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_remove_empty_rows_keeps_header() {
        let raw = RawTable {
            rows: vec![
                vec![None, Some(" ".into())],
                vec![Some("x".into()), None],
                vec![None, Some("".into())],
                vec![Some("  ".into()), None],
            ],
            page_number: Some(1),
        };

        let kept = TableSequence::new().assign(raw.clone(), false);
        assert_eq!(kept.rows.len(), 3);

        let trimmed = TableSequence::new().assign(raw, true);
        assert_eq!(trimmed.headers, vec!["", " "]);
        assert_eq!(
            trimmed.rows,
            vec![vec![CellValue::Text("x".into()), CellValue::Null]]
        );
    }

    #[test]
    fn test_table_json_shape() {
        let table = TableSequence::new()
            .assign(RawTable::from_strings(vec![vec!["H1", "H2"], vec!["a", "1"]]), false);
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "table001",
                "position": 1,
                "caption": null,
                "headers": ["H1", "H2"],
                "data": [["a", 1]],
                "page_number": null
            })
        );
    }

    #[test]
    fn test_plain_text() {
        let table = TableSequence::new()
            .assign(RawTable::from_strings(vec![vec!["Name", "Age"], vec!["Alice", "30"]]), false);
        assert_eq!(table.plain_text(), "Name\tAge\nAlice\t30");
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 1);
    }
}
