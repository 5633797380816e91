//! Placeholder weaving.
//!
//! Folds a walker's fragment stream into one text with inline
//! `[[INSERT_TABLE:<id>]]` markers plus the list of referenced tables.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{DocumentContent, Fragment, TableFragment};

/// Opening part of a table marker.
pub const MARKER_PREFIX: &str = "[[INSERT_TABLE:";
/// Closing part of a table marker.
pub const MARKER_SUFFIX: &str = "]]";

static MARKER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[INSERT_TABLE:([^\]]+)\]\]").expect("valid marker regex"));

/// Marker standing in for a table.
pub fn marker(id: &str) -> String {
    format!("{}{}{}", MARKER_PREFIX, id, MARKER_SUFFIX)
}

/// Table ids referenced by the markers of a text, left to right.
pub fn find_markers(text: &str) -> Vec<&str> {
    MARKER_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Remove every marker together with the line it occupies.
pub fn strip_markers(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            if !MARKER_PATTERN.is_match(line) {
                return Some(line.to_string());
            }
            let rest = MARKER_PATTERN.replace_all(line, "");
            if rest.trim().is_empty() {
                None
            } else {
                Some(rest.into_owned())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Break up marker look-alikes that occur in the document's own prose.
fn defuse(text: String) -> String {
    if !MARKER_PATTERN.is_match(&text) {
        return text;
    }
    log::warn!("Document text contains a table marker; neutralizing it");
    MARKER_PATTERN
        .replace_all(&text, |c: &regex::Captures<'_>| format!("[ [INSERT_TABLE:{}] ]", &c[1]))
        .into_owned()
}

/// Weave fragments into placeholder text and the ordered table list.
///
/// Fragments are joined with `\n`; a page break contributes one blank line.
/// Leading and trailing newlines are trimmed.
pub fn weave(fragments: Vec<Fragment>) -> Result<DocumentContent> {
    let mut parts: Vec<String> = Vec::with_capacity(fragments.len());
    let mut tables: Vec<TableFragment> = Vec::new();

    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => parts.push(defuse(text.text)),
            Fragment::Table(table) => {
                parts.push(table.marker());
                tables.push(table);
            }
            Fragment::PageBreak => parts.push(String::new()),
        }
    }

    let content = DocumentContent {
        extracted_text_with_placeholders: parts.join("\n").trim_matches('\n').to_string(),
        tables,
    };
    validate(&content)?;
    Ok(content)
}

/// Check the marker/table bijection of a document content.
///
/// Ids must be unique, positions strictly increasing, and the markers of the
/// text must name exactly the tables, in the same order.
pub fn validate(content: &DocumentContent) -> Result<()> {
    let mut seen = HashSet::new();
    for table in &content.tables {
        if !seen.insert(table.id.as_str()) {
            return Err(Error::UnexpectedExtractionFailure(format!(
                "duplicate table id '{}'",
                table.id
            )));
        }
    }

    if let Some(pair) = content
        .tables
        .windows(2)
        .find(|pair| pair[0].position >= pair[1].position)
    {
        return Err(Error::UnexpectedExtractionFailure(format!(
            "table positions out of order: {} ({}) before {} ({})",
            pair[0].id, pair[0].position, pair[1].id, pair[1].position
        )));
    }

    let markers = find_markers(&content.extracted_text_with_placeholders);
    let ids: Vec<&str> = content.tables.iter().map(|t| t.id.as_str()).collect();
    if markers != ids {
        return Err(Error::UnexpectedExtractionFailure(format!(
            "markers {:?} do not match tables {:?}",
            markers, ids
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawTable, TableSequence};

    fn tables(n: usize) -> Vec<TableFragment> {
        let mut seq = TableSequence::new();
        (0..n)
            .map(|_| seq.assign(RawTable::from_strings(vec![vec!["h"]]), false))
            .collect()
    }

    #[test]
    fn test_marker_format() {
        assert_eq!(marker("table001"), "[[INSERT_TABLE:table001]]");
        assert_eq!(
            find_markers("a [[INSERT_TABLE:table001]] b\n[[INSERT_TABLE:table002]]"),
            vec!["table001", "table002"]
        );
    }

    #[test]
    fn test_weave_docx_scenario() {
        let mut t = tables(1);
        let content = weave(vec![
            Fragment::text("Intro"),
            t.remove(0).into(),
            Fragment::text("Outro"),
        ])
        .unwrap();
        assert_eq!(
            content.extracted_text_with_placeholders,
            "Intro\n[[INSERT_TABLE:table001]]\nOutro"
        );
        assert_eq!(content.tables.len(), 1);
    }

    #[test]
    fn test_weave_page_break_and_trim() {
        let content = weave(vec![
            Fragment::text(""),
            Fragment::text("page one"),
            Fragment::PageBreak,
            Fragment::text("page two"),
            Fragment::text(""),
        ])
        .unwrap();
        assert_eq!(
            content.extracted_text_with_placeholders,
            "page one\n\npage two"
        );
    }

    #[test]
    fn test_weave_empty() {
        let content = weave(vec![]).unwrap();
        assert_eq!(content.extracted_text_with_placeholders, "");
        assert!(content.tables.is_empty());

        let content = weave(vec![Fragment::text("")]).unwrap();
        assert_eq!(content.extracted_text_with_placeholders, "");
    }

    #[test]
    fn test_prose_marker_is_defused() {
        let content = weave(vec![Fragment::text("see [[INSERT_TABLE:table009]]")]).unwrap();
        assert!(find_markers(&content.extracted_text_with_placeholders).is_empty());
        assert!(content.tables.is_empty());
    }

    #[test]
    fn test_validate_rejects_broken_streams() {
        let mut duplicated = tables(2);
        duplicated[1].id = "table001".to_string();
        let result = weave(duplicated.into_iter().map(Fragment::from).collect());
        assert!(matches!(result, Err(Error::UnexpectedExtractionFailure(_))));

        let mut reordered = tables(2);
        reordered.swap(0, 1);
        let result = weave(reordered.into_iter().map(Fragment::from).collect());
        assert!(matches!(result, Err(Error::UnexpectedExtractionFailure(_))));

        let orphan = DocumentContent {
            extracted_text_with_placeholders: "[[INSERT_TABLE:table001]]".to_string(),
            tables: vec![],
        };
        assert!(validate(&orphan).is_err());
    }

    #[test]
    fn test_strip_markers() {
        let text = "Intro\n[[INSERT_TABLE:table001]]\nOutro see [[INSERT_TABLE:table002]] here";
        assert_eq!(strip_markers(text), "Intro\nOutro see  here");
    }
}
