//! DOCX structural walker.

use crate::error::Result;
use crate::model::{Fragment, RawTable, TableSequence};

use super::backend::{BodyElement, DocxBackend};

/// Walks the body of a DOCX document in document order.
pub struct DocxWalker<'a> {
    backend: &'a dyn DocxBackend,
}

impl<'a> DocxWalker<'a> {
    /// Create a walker over a backend.
    pub fn new(backend: &'a dyn DocxBackend) -> Self {
        Self { backend }
    }

    /// Read a DOCX payload and return its fragment stream.
    pub fn walk(&self, data: &[u8]) -> Result<Vec<Fragment>> {
        let body = self.backend.body(data)?;
        Ok(fragments(body))
    }
}

/// Turn body elements into fragments.
///
/// Every paragraph becomes a text fragment, empty ones included, so blank
/// lines of the source survive. Tables are numbered in document order; a
/// table without rows is skipped.
pub fn fragments(body: Vec<BodyElement>) -> Vec<Fragment> {
    let mut sequence = TableSequence::new();
    let mut fragments = Vec::with_capacity(body.len());

    for element in body {
        match element {
            BodyElement::Paragraph(text) => fragments.push(Fragment::text(text)),
            BodyElement::Table(rows) if rows.is_empty() => {
                log::debug!("Skipping DOCX table without rows");
            }
            BodyElement::Table(rows) => {
                let table = sequence.assign(RawTable::from_strings(rows), false);
                log::debug!(
                    "DOCX {}: {} columns, {} data rows",
                    table.id,
                    table.column_count(),
                    table.row_count()
                );
                fragments.push(table.into());
            }
        }
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    struct FixedBody(Vec<BodyElement>);

    impl DocxBackend for FixedBody {
        fn body(&self, _data: &[u8]) -> Result<Vec<BodyElement>> {
            Ok(self.0.clone())
        }
    }

    fn table(rows: &[&[&str]]) -> BodyElement {
        BodyElement::Table(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_walk_order_and_numbering() {
        let backend = FixedBody(vec![
            BodyElement::Paragraph("Intro".into()),
            table(&[&["H1", "H2"], &["a", "1"]]),
            BodyElement::Paragraph(String::new()),
            table(&[&["Price"], &["2.50"], &["007"]]),
        ]);
        let fragments = DocxWalker::new(&backend).walk(b"").unwrap();

        assert_eq!(fragments.len(), 4);
        assert_eq!(fragments[0], Fragment::text("Intro"));
        assert_eq!(fragments[2], Fragment::text(""));

        let first = fragments[1].as_table().unwrap();
        assert_eq!(first.id, "table001");
        assert_eq!(first.headers, vec!["H1", "H2"]);
        assert_eq!(
            first.rows,
            vec![vec![CellValue::Text("a".into()), CellValue::Integer(1)]]
        );
        assert_eq!(first.page_number, None);

        let second = fragments[3].as_table().unwrap();
        assert_eq!(second.id, "table002");
        assert_eq!(second.position, 2);
        assert_eq!(
            second.rows,
            vec![
                vec![CellValue::Float(2.5)],
                vec![CellValue::Text("007".into())]
            ]
        );
    }

    #[test]
    fn test_empty_table_skipped() {
        let fragments = fragments(vec![
            BodyElement::Table(vec![]),
            table(&[&["only header"]]),
        ]);
        assert_eq!(fragments.len(), 1);
        let table = fragments[0].as_table().unwrap();
        assert_eq!(table.id, "table001");
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_empty_body() {
        assert!(fragments(vec![]).is_empty());
    }
}
