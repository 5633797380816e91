//! Reading-order layout for PDF pages.
//!
//! Spans sharing a baseline form lines, and lines separated by ordinary
//! leading form blocks. A page whose text leaves an empty vertical gutter
//! near the middle is read as two columns, left column first.

use std::cmp::Ordering;
use std::ops::Range;

use super::backend::TextSpan;

/// Pages narrower than this never split into columns.
const MIN_COLUMN_PAGE_WIDTH: f32 = 250.0;
/// Width of the vertical slices used to find a gutter.
const SLICE_WIDTH: f32 = 3.0;
/// Empty runs narrower than this are word gaps, not gutters.
const MIN_GAP_CANDIDATE: f32 = 10.0;
/// Minimum gutter width in points.
const MIN_GUTTER_WIDTH: f32 = 12.0;
/// Minimum width of each detected column.
const MIN_COLUMN_WIDTH: f32 = 80.0;
/// Columns extend this far past the outermost text.
const COLUMN_MARGIN: f32 = 10.0;
/// Baseline drift allowed within a line, as a fraction of the font size.
const LINE_BAND: f32 = 0.3;
/// Left margin shift that starts a new block.
const INDENT_BREAK: f32 = 20.0;

/// Top to bottom, then left to right.
fn reading_order(a: &TextSpan, b: &TextSpan) -> Ordering {
    b.y.partial_cmp(&a.y)
        .unwrap_or(Ordering::Equal)
        .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
}

/// A text line composed of spans sharing a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (baseline)
    pub y: f32,
    /// Leftmost X position
    pub x: f32,
    /// Font size, averaged over characters
    pub font_size: f32,
}

impl TextLine {
    /// Create a line from spans in any order.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

        let (y, x) = spans.first().map_or((0.0, 0.0), |s| (s.y, s.x));
        let chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();
        let font_size = if chars > 0 {
            spans
                .iter()
                .map(|s| s.font_size * s.text.chars().count() as f32)
                .sum::<f32>()
                / chars as f32
        } else {
            spans.first().map_or(0.0, |s| s.font_size)
        };

        Self {
            spans,
            y,
            x,
            font_size,
        }
    }

    /// Line text, with a space wherever neighbouring spans leave a word gap.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut prev: Option<&TextSpan> = None;
        for span in &self.spans {
            if prev.map_or(false, |p| needs_space(p, span)) {
                out.push(' ');
            }
            out.push_str(&span.text);
            prev = Some(span);
        }
        out
    }

    /// Top of the tallest span.
    pub fn top(&self) -> f32 {
        self.spans
            .iter()
            .map(TextSpan::top)
            .fold(self.y, f32::max)
    }
}

/// Whether a word space separates two neighbouring spans.
///
/// The gap is measured against the right span's average glyph width. Spans
/// that already carry a space, or that join two ideographic characters,
/// never get one.
fn needs_space(left: &TextSpan, right: &TextSpan) -> bool {
    let chars = right.text.chars().count();
    let glyph = if chars > 0 && right.width > 0.0 {
        right.width / chars as f32
    } else {
        right.font_size * 0.5
    };
    if right.x - left.right() <= glyph * 0.2 {
        return false;
    }

    let is_space = |c: char| c == ' ' || c == '\u{00A0}';
    let before = left.text.chars().last();
    let after = right.text.chars().next();
    if before.map_or(false, is_space) || after.map_or(false, is_space) {
        return false;
    }
    !(before.map_or(false, is_spaceless_script_char) && after.map_or(false, is_spaceless_script_char))
}

/// A block of consecutive lines (a paragraph).
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// The lines in this block, top to bottom
    pub lines: Vec<TextLine>,
    /// Index of the column the block belongs to
    pub column: usize,
}

impl TextBlock {
    /// Block text, one line per line.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the block has no visible text.
    pub fn is_empty(&self) -> bool {
        self.lines
            .iter()
            .all(|l| l.spans.iter().all(|s| s.text.trim().is_empty()))
    }

    /// Top edge of the first line.
    pub fn top(&self) -> f32 {
        self.lines.first().map(TextLine::top).unwrap_or(0.0)
    }

    /// Leftmost line start.
    pub fn left(&self) -> f32 {
        self.lines.iter().map(|l| l.x).fold(f32::MAX, f32::min)
    }
}

/// A detected column in the page layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl Column {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        (self.left..=self.right).contains(&x)
    }

    /// Check if a span starts or is centred in this column.
    pub fn contains_span(&self, span: &TextSpan) -> bool {
        self.contains(span.x) || self.contains(span.center().0)
    }
}

/// Blocks and columns of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    /// Detected columns, left to right
    pub columns: Vec<Column>,
    /// Blocks, column by column, each column top to bottom
    pub blocks: Vec<TextBlock>,
}

impl PageLayout {
    /// Column index for a horizontal extent.
    ///
    /// Anything straddling the gutter reads with the first column.
    pub fn column_of(&self, x0: f32, x1: f32) -> usize {
        self.columns
            .iter()
            .find(|c| c.contains(x0) && c.contains(x1))
            .map_or(0, |c| c.index)
    }
}

/// Groups page text into blocks in reading order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutAnalyzer;

impl LayoutAnalyzer {
    /// Create a new layout analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Group spans into blocks in reading order.
    pub fn analyze(&self, spans: Vec<TextSpan>) -> PageLayout {
        self.analyze_around(spans, &[])
    }

    /// Like [`analyze`](Self::analyze), but no block continues across any of
    /// the `barriers` (Y coordinates of removed regions such as tables).
    pub fn analyze_around(&self, spans: Vec<TextSpan>, barriers: &[f32]) -> PageLayout {
        if spans.is_empty() {
            return PageLayout::default();
        }

        let columns = self.detect_columns(&spans);
        log::debug!("Layout: {} column(s)", columns.len());

        let mut per_column: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len()];
        for span in spans {
            let index = columns
                .iter()
                .position(|c| c.contains_span(&span))
                .unwrap_or(0);
            per_column[index].push(span);
        }

        let blocks = per_column
            .into_iter()
            .enumerate()
            .flat_map(|(column, spans)| {
                let lines = self.group_spans_into_lines(spans);
                self.group_lines_into_blocks(lines, barriers)
                    .into_iter()
                    .map(move |lines| TextBlock { lines, column })
            })
            .collect();

        PageLayout { columns, blocks }
    }

    /// One column spanning all text, or two split at a central gutter.
    pub fn detect_columns(&self, spans: &[TextSpan]) -> Vec<Column> {
        if spans.is_empty() {
            return Vec::new();
        }

        let min_x = spans.iter().map(|s| s.x).fold(f32::MAX, f32::min);
        let max_x = spans.iter().map(TextSpan::right).fold(f32::MIN, f32::max);
        let single = vec![Column {
            left: min_x - COLUMN_MARGIN,
            right: max_x + COLUMN_MARGIN,
            index: 0,
        }];

        if max_x - min_x < MIN_COLUMN_PAGE_WIDTH {
            return single;
        }

        let gutter = match widest_gutter(&slice_occupancy(spans, min_x, max_x)) {
            Some(gutter) => gutter,
            None => return single,
        };
        if gutter.len() as f32 * SLICE_WIDTH < MIN_GUTTER_WIDTH {
            log::debug!("Layout: gutter too narrow, single column");
            return single;
        }

        let split = min_x + (gutter.start as f32 + gutter.len() as f32 / 2.0) * SLICE_WIDTH;
        if split - min_x < MIN_COLUMN_WIDTH || max_x - split < MIN_COLUMN_WIDTH {
            log::debug!("Layout: column too narrow, single column");
            return single;
        }

        // Each side needs a tenth of the spans
        let left = spans.iter().filter(|s| s.center().0 < split).count();
        let quorum = (spans.len() / 10).max(2);
        if left < quorum || spans.len() - left < quorum {
            log::debug!("Layout: spans too one-sided, single column");
            return single;
        }

        vec![
            Column {
                left: min_x - COLUMN_MARGIN,
                right: split,
                index: 0,
            },
            Column {
                left: split,
                right: max_x + COLUMN_MARGIN,
                index: 1,
            },
        ]
    }

    /// Band spans into lines, top to bottom.
    pub fn group_spans_into_lines(&self, mut spans: Vec<TextSpan>) -> Vec<TextLine> {
        spans.sort_by(reading_order);

        let mut lines = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        for span in spans {
            let same_line = current
                .first()
                .map_or(false, |first| (span.y - first.y).abs() <= span.font_size * LINE_BAND);
            if !same_line && !current.is_empty() {
                lines.push(TextLine::from_spans(std::mem::take(&mut current)));
            }
            current.push(span);
        }
        if !current.is_empty() {
            lines.push(TextLine::from_spans(current));
        }

        lines
    }

    /// Split lines into paragraphs at wide leading, size changes, indents
    /// and barriers.
    pub fn group_lines_into_blocks(
        &self,
        lines: Vec<TextLine>,
        barriers: &[f32],
    ) -> Vec<Vec<TextLine>> {
        let leading = typical_leading(&lines);
        let mut blocks: Vec<Vec<TextLine>> = Vec::new();

        for line in lines {
            let continues = blocks.last().and_then(|b| b.last()).map_or(false, |prev| {
                !is_paragraph_break(prev, &line, leading)
                    && !barriers.iter().any(|&b| prev.y > b && line.y < b)
            });
            match blocks.last_mut() {
                Some(block) if continues => block.push(line),
                _ => blocks.push(vec![line]),
            }
        }

        blocks
    }
}

/// Spans covering each vertical slice of the text area.
fn slice_occupancy(spans: &[TextSpan], min_x: f32, max_x: f32) -> Vec<usize> {
    let count = ((max_x - min_x) / SLICE_WIDTH) as usize + 1;
    let mut occupancy = vec![0usize; count];
    for span in spans {
        let first = ((span.x - min_x) / SLICE_WIDTH) as usize;
        let last = (((span.right() - min_x) / SLICE_WIDTH) as usize).min(count - 1);
        for slot in occupancy.iter_mut().take(last + 1).skip(first) {
            *slot += 1;
        }
    }
    occupancy
}

/// The widest empty run of slices in the central 70% of the page. Runs of
/// similar width go to the one nearer the centre.
fn widest_gutter(occupancy: &[usize]) -> Option<Range<usize>> {
    let n = occupancy.len();
    let (lo, hi) = (n * 15 / 100, n * 85 / 100);
    let centre = n as f32 / 2.0;
    let distance = |gap: &Range<usize>| ((gap.start + gap.len() / 2) as f32 - centre).abs();

    let mut gaps = Vec::new();
    let mut open: Option<usize> = None;
    for (i, &count) in occupancy.iter().enumerate().take(hi).skip(lo) {
        match (count == 0, open) {
            (true, None) => open = Some(i),
            (false, Some(start)) => {
                gaps.push(start..i);
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        gaps.push(start..hi);
    }

    let mut best: Option<Range<usize>> = None;
    for gap in gaps {
        let width = gap.len() as f32 * SLICE_WIDTH;
        if width < MIN_GAP_CANDIDATE {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                let current_width = current.len() as f32 * SLICE_WIDTH;
                width > current_width * 1.5
                    || (width >= current_width * 0.7 && distance(&gap) < distance(current))
            }
        };
        if better {
            best = Some(gap);
        }
    }
    best
}

/// Mean baseline distance between consecutive lines.
fn typical_leading(lines: &[TextLine]) -> f32 {
    let gaps: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[0].y - w[1].y).abs())
        .filter(|g| *g > 0.1)
        .collect();

    if gaps.is_empty() {
        12.0
    } else {
        gaps.iter().sum::<f32>() / gaps.len() as f32
    }
}

fn is_paragraph_break(prev: &TextLine, line: &TextLine, leading: f32) -> bool {
    (prev.y - line.y).abs() > leading * 1.5
        || (prev.font_size - line.font_size).abs() > 1.0
        || (prev.x - line.x).abs() > INDENT_BREAK
}

/// Check if a character belongs to a script written without word spaces
/// (Chinese and Japanese; Korean uses spaces).
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c,
        '\u{3000}'..='\u{303F}'     // CJK symbols and punctuation
            | '\u{3040}'..='\u{30FF}' // Hiragana, Katakana
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{20000}'..='\u{2EBEF}'
    )
}
