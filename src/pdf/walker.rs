//! PDF structural walker.
//!
//! Turns each page into prose blocks and detected tables in reading order,
//! then numbers tables across the whole document.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::config::{ErrorMode, PdfTableConfig};
use crate::error::Result;
use crate::model::{Fragment, RawTable, TableSequence};

use super::backend::{PageContent, PdfDocument};
use super::layout::LayoutAnalyzer;
use super::strategy::TableStrategySelector;

/// One reading-order item of a page, before table numbering.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// A prose block
    Text(String),
    /// A detected table
    Table(RawTable),
}

/// Walks the pages of a PDF document.
pub struct PdfWalker<'a> {
    config: &'a PdfTableConfig,
    error_mode: ErrorMode,
    parallel: bool,
}

impl<'a> PdfWalker<'a> {
    /// Create a walker for a table configuration.
    pub fn new(config: &'a PdfTableConfig) -> Self {
        Self {
            config,
            error_mode: ErrorMode::Strict,
            parallel: false,
        }
    }

    /// Set the page error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Analyze pages in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Walk every page and return the document's fragment stream.
    pub fn walk(&self, doc: &dyn PdfDocument) -> Result<Vec<Fragment>> {
        let pages = self.load_pages(doc)?;
        let selector = TableStrategySelector::from_config(self.config);

        let analyzed: Vec<Vec<PageItem>> = if self.parallel && pages.len() > 1 {
            pages
                .par_iter()
                .map(|page| analyze_page(page, &selector))
                .collect()
        } else {
            pages
                .iter()
                .map(|page| analyze_page(page, &selector))
                .collect()
        };

        let mut sequence = TableSequence::new();
        let mut fragments = Vec::new();
        for items in analyzed.into_iter().filter(|items| !items.is_empty()) {
            if !fragments.is_empty() {
                fragments.push(Fragment::PageBreak);
            }
            for item in items {
                fragments.push(match item {
                    PageItem::Text(text) => Fragment::text(text),
                    PageItem::Table(raw) => sequence
                        .assign(raw, self.config.remove_empty_rows)
                        .into(),
                });
            }
        }

        log::debug!(
            "PDF walk: {} pages, {} fragments, {} tables",
            pages.len(),
            fragments.len(),
            sequence.len()
        );
        Ok(fragments)
    }

    fn load_pages(&self, doc: &dyn PdfDocument) -> Result<Vec<PageContent>> {
        let mut pages = Vec::with_capacity(doc.page_count() as usize);
        for number in 1..=doc.page_count() {
            match doc.page(number) {
                Ok(page) => pages.push(page),
                Err(e) => {
                    if self.error_mode == ErrorMode::Strict {
                        return Err(e);
                    }
                    // In lenient mode, skip this page
                    log::warn!("Skipping page {}: {}", number, e);
                }
            }
        }
        Ok(pages)
    }
}

/// Split a page into prose blocks and tables, ordered for reading.
pub fn analyze_page(page: &PageContent, selector: &TableStrategySelector) -> Vec<PageItem> {
    let tables = selector.detect(page);

    // Text inside a table region belongs to the table only
    let prose: Vec<_> = page
        .spans
        .iter()
        .filter(|span| !tables.iter().any(|t| t.contains_span(span)))
        .cloned()
        .collect();
    let barriers: Vec<f32> = tables.iter().map(|t| (t.top + t.bottom) / 2.0).collect();
    let layout = LayoutAnalyzer::new().analyze_around(prose, &barriers);

    // (column, top, left, item)
    let mut keyed: Vec<(usize, f32, f32, PageItem)> = layout
        .blocks
        .iter()
        .filter(|block| !block.is_empty())
        .map(|block| {
            (
                block.column,
                block.top(),
                block.left(),
                PageItem::Text(block.text()),
            )
        })
        .collect();

    for table in tables {
        let column = layout.column_of(table.left, table.right);
        keyed.push((
            column,
            table.top,
            table.left,
            PageItem::Table(RawTable {
                rows: table.rows,
                page_number: Some(page.number),
            }),
        ));
    }

    keyed.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
            .then(a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
    });

    keyed.into_iter().map(|(_, _, _, item)| item).collect()
}
