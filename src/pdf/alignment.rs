//! Unruled table inference from text alignment.
//!
//! Rows are bands of spans that share a baseline. Column edges are left
//! edges that recur across rows. A run of consecutive rows that keeps to
//! those edges becomes a table; a span reaching across an edge or a
//! paragraph-sized vertical gap ends the run.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::backend::TextSpan;
use super::layout::TextLine;
use super::strategy::DetectedTable;
use crate::config::DEFAULT_TEXT_TOLERANCE;

/// Spans may start this far left of their column edge.
const COLUMN_LEAD_IN: f32 = 10.0;

static BULLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-–—•·*○▪◦▸▹►■●※□◆◇▶▷☞➤➜]$").expect("valid bullet regex")
});

/// `1`, `12.`, `3)`, `a.`, `B)`
static ENUMERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+[.)]?|\p{Alphabetic}[.)])$").expect("valid enumerator regex"));

/// Thresholds for alignment inference.
#[derive(Debug, Clone)]
pub struct AlignmentConfig {
    /// Fewest rows a table may have
    pub min_rows: usize,
    /// Fewest columns a table may have
    pub min_columns: usize,
    /// More columns than this is word-level splitting, not a table
    pub max_columns: usize,
    /// Row band half-height as a fraction of the font size
    pub band_factor: f32,
    /// Lower bound on the row band half-height (points)
    pub band_floor: f32,
    /// How far a left edge may sit from its column edge (points)
    pub edge_tolerance: f32,
    /// Share of a row's spans that must start on a column edge
    pub min_aligned_ratio: f32,
    /// Edges closer than this collapse into one column (points)
    pub min_column_gap: f32,
    /// Baseline distance, in font sizes, that separates two tables
    pub max_row_gap_factor: f32,
}

impl AlignmentConfig {
    /// Configuration for a text tolerance in points.
    ///
    /// The tolerance widens both the row band and the edge window, so larger
    /// values merge more.
    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            band_floor: tolerance,
            edge_tolerance: tolerance + 2.0,
            ..Self::default()
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        let tolerance = DEFAULT_TEXT_TOLERANCE as f32;
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            band_factor: 0.4,
            band_floor: tolerance,
            edge_tolerance: tolerance + 2.0,
            min_aligned_ratio: 0.3,
            min_column_gap: 15.0,
            max_row_gap_factor: 3.0,
        }
    }
}

/// Spans sharing a baseline, left to right.
#[derive(Debug, Clone)]
struct AlignedRow {
    baseline: f32,
    font_size: f32,
    spans: Vec<TextSpan>,
}

impl AlignedRow {
    fn new(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        let baseline = spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32;
        let font_size = spans.iter().map(|s| s.font_size).fold(0.0, f32::max);
        Self {
            baseline,
            font_size,
            spans,
        }
    }
}

enum ListMarker {
    Bullet,
    Enumerator,
}

fn list_marker(text: &str) -> Option<ListMarker> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if BULLET.is_match(&compact) {
        Some(ListMarker::Bullet)
    } else if ENUMERATOR.is_match(&compact) {
        Some(ListMarker::Enumerator)
    } else {
        None
    }
}

/// Infers tables from how text lines up on a page.
#[derive(Debug, Clone, Default)]
pub struct AlignmentDetector {
    config: AlignmentConfig,
}

impl AlignmentDetector {
    /// Create a detector with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with custom thresholds.
    pub fn with_config(config: AlignmentConfig) -> Self {
        Self { config }
    }

    /// Detect tables among a page's spans, top to bottom.
    pub fn detect(&self, spans: &[TextSpan]) -> Vec<DetectedTable> {
        let config = &self.config;
        if spans.len() < config.min_rows * config.min_columns {
            return Vec::new();
        }

        let rows = self.rows(spans);
        if rows.len() < config.min_rows {
            return Vec::new();
        }

        let edges = self.column_edges(&rows);
        log::debug!("Alignment: {} rows, column edges {:?}", rows.len(), edges);
        if edges.len() < config.min_columns {
            return Vec::new();
        }

        self.runs(&rows, &edges)
            .into_iter()
            .filter_map(|run| self.table(&rows[run]))
            .collect()
    }

    /// Band spans into rows, highest baseline first.
    fn rows(&self, spans: &[TextSpan]) -> Vec<AlignedRow> {
        let mut ordered: Vec<&TextSpan> = spans.iter().collect();
        ordered.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
        });

        let mut rows = Vec::new();
        let mut band: Vec<TextSpan> = Vec::new();
        let mut anchor = 0.0;
        for span in ordered {
            let reach = (span.font_size * self.config.band_factor).max(self.config.band_floor);
            if !band.is_empty() && (span.y - anchor).abs() > reach {
                rows.push(AlignedRow::new(std::mem::take(&mut band)));
            }
            if band.is_empty() {
                anchor = span.y;
            }
            band.push(span.clone());
        }
        if !band.is_empty() {
            rows.push(AlignedRow::new(band));
        }

        rows
    }

    /// Left edges shared by enough rows, left to right.
    ///
    /// Rows with two or more spans vote when there are enough of them;
    /// otherwise every row votes.
    fn column_edges(&self, rows: &[AlignedRow]) -> Vec<f32> {
        let config = &self.config;
        let multi: Vec<&AlignedRow> = rows.iter().filter(|r| r.spans.len() >= 2).collect();
        let voters = if multi.len() >= config.min_rows {
            multi
        } else {
            rows.iter().collect()
        };
        if voters.is_empty() {
            return Vec::new();
        }

        let width = config.edge_tolerance.max(1.0);
        let mut votes: BTreeMap<i32, usize> = BTreeMap::new();
        for row in &voters {
            let buckets: BTreeSet<i32> = row
                .spans
                .iter()
                .map(|s| (s.x / width).round() as i32)
                .collect();
            for bucket in buckets {
                *votes.entry(bucket).or_default() += 1;
            }
        }

        let quorum = ((voters.len() as f32 * config.min_aligned_ratio) as usize).max(2);
        let mut edges: Vec<f32> = Vec::new();
        for (bucket, count) in votes {
            if count < quorum {
                continue;
            }
            let edge = bucket as f32 * width;
            if edges.last().map_or(true, |last| edge - last >= config.min_column_gap) {
                edges.push(edge);
            }
        }

        edges
    }

    /// Runs of consecutive rows that fit the grid.
    fn runs(&self, rows: &[AlignedRow], edges: &[f32]) -> Vec<Range<usize>> {
        let min_rows = self.config.min_rows;
        let mut runs = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let fits = self.fits_grid(row, edges);
            let continues = fits && start.is_some() && !self.is_gap(&rows[i - 1], row);
            if continues {
                continue;
            }
            if let Some(s) = start.take() {
                if i - s >= min_rows {
                    runs.push(s..i);
                }
            }
            if fits {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= min_rows {
                runs.push(s..rows.len());
            }
        }

        runs
    }

    fn fits_grid(&self, row: &AlignedRow, edges: &[f32]) -> bool {
        if row.spans.is_empty() {
            return false;
        }
        let tolerance = self.config.edge_tolerance;

        let aligned = row
            .spans
            .iter()
            .filter(|s| edges.iter().any(|e| (s.x - e).abs() <= tolerance))
            .count();
        let straddles = row.spans.iter().any(|s| {
            edges
                .iter()
                .skip(1)
                .any(|&e| s.x < e - tolerance && s.right() > e + tolerance)
        });

        !straddles && aligned as f32 / row.spans.len() as f32 >= self.config.min_aligned_ratio
    }

    fn is_gap(&self, above: &AlignedRow, below: &AlignedRow) -> bool {
        let size = above
            .font_size
            .max(below.font_size)
            .max(self.config.band_floor);
        above.baseline - below.baseline > size * self.config.max_row_gap_factor
    }

    /// Build a table from a run, re-deriving columns for just those rows.
    fn table(&self, rows: &[AlignedRow]) -> Option<DetectedTable> {
        let edges = self.column_edges(rows);
        if edges.len() < self.config.min_columns {
            return None;
        }
        if edges.len() > self.config.max_columns {
            log::debug!(
                "Alignment: skipping run, too many columns ({} > {})",
                edges.len(),
                self.config.max_columns
            );
            return None;
        }
        if looks_like_list(rows, &edges) {
            log::debug!("Alignment: skipping run, rows read as a list");
            return None;
        }

        let spans = rows.iter().flat_map(|r| r.spans.iter());
        let left = spans.clone().map(|s| s.x).fold(f32::MAX, f32::min);
        let right = spans.clone().map(TextSpan::right).fold(f32::MIN, f32::max);
        let top = spans.clone().map(TextSpan::top).fold(f32::MIN, f32::max);
        let bottom = spans.map(TextSpan::bottom).fold(f32::MAX, f32::min);

        let cells = rows
            .iter()
            .map(|row| {
                let mut columns: Vec<Vec<TextSpan>> = vec![Vec::new(); edges.len()];
                for span in &row.spans {
                    columns[column_for(span.x, &edges)].push(span.clone());
                }
                columns
                    .into_iter()
                    .map(|spans| Some(TextLine::from_spans(spans).text().trim().to_string()))
                    .collect()
            })
            .collect();

        Some(DetectedTable {
            left,
            right,
            top,
            bottom,
            rows: cells,
        })
    }
}

/// Last column whose edge (less the lead-in) is at or before `x`.
fn column_for(x: f32, edges: &[f32]) -> usize {
    edges
        .iter()
        .rposition(|&edge| x >= edge - COLUMN_LEAD_IN)
        .unwrap_or(0)
}

/// A numbered or bulleted list splits into marker and text spans and then
/// lines up like a two-column table.
fn looks_like_list(rows: &[AlignedRow], edges: &[f32]) -> bool {
    let mut bullets = 0;
    let mut enumerated = 0;
    for row in rows {
        match row.spans.first().and_then(|s| list_marker(&s.text)) {
            Some(ListMarker::Bullet) => bullets += 1,
            Some(ListMarker::Enumerator) => enumerated += 1,
            None => {}
        }
    }

    let total = rows.len() as f32;
    bullets as f32 / total >= 0.5 || (edges.len() == 2 && (bullets + enumerated) as f32 / total >= 0.5)
}
