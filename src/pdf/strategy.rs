//! Table strategy selection.
//!
//! Maps a [`TableStrategy`] and its tolerance onto one of the page-level
//! detectors: ruled-grid detection ([`LatticeDetector`]) or text-alignment
//! inference ([`AlignmentDetector`]).

use crate::config::{PdfTableConfig, TableStrategy};

use super::alignment::{AlignmentConfig, AlignmentDetector};
use super::backend::{PageContent, TextSpan};
use super::lattice::LatticeDetector;

/// Slack around a table's box when deciding what text it owns.
const REGION_SLACK: f32 = 1.0;

/// A table region found on a page, with its cell texts.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    /// Left X boundary
    pub left: f32,
    /// Right X boundary
    pub right: f32,
    /// Top Y boundary (PDF coordinates, larger is higher)
    pub top: f32,
    /// Bottom Y boundary
    pub bottom: f32,
    /// Cell texts row by row; `None` for cells covered by a merged neighbour
    pub rows: Vec<Vec<Option<String>>>,
}

impl DetectedTable {
    /// Check if a point lies inside the table region.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.left - REGION_SLACK
            && x <= self.right + REGION_SLACK
            && y >= self.bottom - REGION_SLACK
            && y <= self.top + REGION_SLACK
    }

    /// Check if a span's centre lies inside the table region.
    pub fn contains_span(&self, span: &TextSpan) -> bool {
        let (x, y) = span.center();
        self.contains_point(x, y)
    }

    /// Check if this region lies inside another one.
    pub fn is_within(&self, other: &DetectedTable) -> bool {
        other.contains_point(self.left, self.top) && other.contains_point(self.right, self.bottom)
    }
}

/// Runs the configured table strategy on a page.
#[derive(Debug, Clone)]
pub struct TableStrategySelector {
    strategy: TableStrategy,
    tolerance: f32,
}

impl TableStrategySelector {
    /// Create a selector for a strategy and text tolerance (points).
    pub fn new(strategy: TableStrategy, tolerance: f32) -> Self {
        Self {
            strategy,
            tolerance,
        }
    }

    /// Create a selector from the PDF table configuration.
    pub fn from_config(config: &PdfTableConfig) -> Self {
        Self::new(config.strategy, config.effective_text_tolerance())
    }

    /// The strategy this selector runs.
    pub fn strategy(&self) -> TableStrategy {
        self.strategy
    }

    /// Detect tables on a page, top to bottom.
    pub fn detect(&self, page: &PageContent) -> Vec<DetectedTable> {
        let tables = match self.strategy {
            TableStrategy::LinesStrict => {
                LatticeDetector::strict().detect(&page.segments, &page.spans)
            }
            TableStrategy::Lines => LatticeDetector::relaxed().detect(&page.segments, &page.spans),
            TableStrategy::Text => {
                AlignmentDetector::with_config(AlignmentConfig::with_tolerance(self.tolerance))
                    .detect(&page.spans)
            }
            TableStrategy::EngineDefault => {
                let ruled = LatticeDetector::relaxed().detect(&page.segments, &page.spans);
                if ruled.is_empty() {
                    AlignmentDetector::new().detect(&page.spans)
                } else {
                    ruled
                }
            }
        };

        log::debug!(
            "Page {}: strategy {} found {} tables",
            page.number,
            self.strategy,
            tables.len()
        );
        tables
    }
}
