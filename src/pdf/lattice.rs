//! Table detection from ruling lines (lattice mode).
//!
//! Painted segments are split into horizontal and vertical edges, snapped and
//! joined, grouped into connected components by their intersections, and each
//! component is read as a grid. A grid is accepted when enough of its cell
//! borders are actually drawn.

use std::cmp::Ordering;

use super::backend::{Segment, SegmentKind, TextSpan};
use super::layout::LayoutAnalyzer;
use super::strategy::DetectedTable;

/// Maximum slope (points of drift) for a segment to count as axis-aligned.
const ORIENTATION_TOLERANCE: f32 = 1.0;
/// Edges closer than this snap to one coordinate and join across gaps.
const SNAP_TOLERANCE: f32 = 3.0;
/// Shorter edges are ignored.
const MIN_EDGE_LENGTH: f32 = 2.0;

/// An axis-aligned edge: `pos` is the fixed coordinate, `start..end` the span.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    pos: f32,
    start: f32,
    end: f32,
}

impl Edge {
    fn covers(&self, from: f32, to: f32) -> bool {
        self.start <= from + SNAP_TOLERANCE && self.end >= to - SNAP_TOLERANCE
    }
}

/// Ruled table detector.
#[derive(Debug, Clone)]
pub struct LatticeDetector {
    /// Segment kinds treated as rulings
    kinds: Vec<SegmentKind>,
    /// Fraction of cell borders that must be drawn
    min_closure: f32,
    /// Minimum number of rows
    min_rows: usize,
    /// Minimum number of columns
    min_columns: usize,
    /// Minimum number of cells
    min_cells: usize,
}

impl LatticeDetector {
    /// Closed grids of stroked lines and thin rules only.
    pub fn strict() -> Self {
        Self {
            kinds: vec![SegmentKind::Stroke, SegmentKind::ThinFill],
            min_closure: 0.9,
            min_rows: 2,
            min_columns: 2,
            min_cells: 4,
        }
    }

    /// Any ruling, including edges of filled rectangles.
    pub fn relaxed() -> Self {
        Self {
            kinds: vec![
                SegmentKind::Stroke,
                SegmentKind::ThinFill,
                SegmentKind::FillEdge,
            ],
            min_closure: 0.5,
            min_rows: 1,
            min_columns: 1,
            min_cells: 2,
        }
    }

    /// Detect ruled tables and fill their cells from the spans.
    pub fn detect(&self, segments: &[Segment], spans: &[TextSpan]) -> Vec<DetectedTable> {
        let (horizontal, vertical) = self.split_edges(segments);
        if horizontal.len() < 2 || vertical.len() < 2 {
            return vec![];
        }

        let horizontal = merge_edges(horizontal);
        let vertical = merge_edges(vertical);

        let mut tables: Vec<DetectedTable> = Vec::new();
        for (h_idx, v_idx) in connected_components(&horizontal, &vertical) {
            let h: Vec<Edge> = h_idx.iter().map(|&i| horizontal[i]).collect();
            let v: Vec<Edge> = v_idx.iter().map(|&i| vertical[i]).collect();
            if let Some(table) = self.read_grid(&h, &v, spans) {
                tables.push(table);
            }
        }

        // Largest first so nested boxes are dropped in favour of their container
        tables.sort_by(|a, b| {
            let area = |t: &DetectedTable| (t.right - t.left) * (t.top - t.bottom);
            area(b).partial_cmp(&area(a)).unwrap_or(Ordering::Equal)
        });
        let mut accepted: Vec<DetectedTable> = Vec::new();
        for table in tables {
            if accepted.iter().any(|outer| table.is_within(outer)) {
                continue;
            }
            accepted.push(table);
        }

        accepted.sort_by(|a, b| {
            b.top
                .partial_cmp(&a.top)
                .unwrap_or(Ordering::Equal)
                .then(a.left.partial_cmp(&b.left).unwrap_or(Ordering::Equal))
        });
        accepted
    }

    fn split_edges(&self, segments: &[Segment]) -> (Vec<Edge>, Vec<Edge>) {
        let mut horizontal = Vec::new();
        let mut vertical = Vec::new();

        for seg in segments.iter().filter(|s| self.kinds.contains(&s.kind)) {
            let (dx, dy) = ((seg.x1 - seg.x0).abs(), (seg.y1 - seg.y0).abs());
            if dy <= ORIENTATION_TOLERANCE && dx >= MIN_EDGE_LENGTH {
                horizontal.push(Edge {
                    pos: (seg.y0 + seg.y1) / 2.0,
                    start: seg.x0.min(seg.x1),
                    end: seg.x0.max(seg.x1),
                });
            } else if dx <= ORIENTATION_TOLERANCE && dy >= MIN_EDGE_LENGTH {
                vertical.push(Edge {
                    pos: (seg.x0 + seg.x1) / 2.0,
                    start: seg.y0.min(seg.y1),
                    end: seg.y0.max(seg.y1),
                });
            }
        }

        (horizontal, vertical)
    }

    fn read_grid(&self, h: &[Edge], v: &[Edge], spans: &[TextSpan]) -> Option<DetectedTable> {
        // Grid lines: ys top to bottom, xs left to right
        let mut ys = cluster_positions(h.iter().map(|e| e.pos));
        ys.reverse();
        let xs = cluster_positions(v.iter().map(|e| e.pos));
        if ys.len() < 2 || xs.len() < 2 {
            return None;
        }

        let rows = ys.len() - 1;
        let cols = xs.len() - 1;
        if rows < self.min_rows || cols < self.min_columns || rows * cols < self.min_cells {
            return None;
        }

        let has_h = |y: f32, x0: f32, x1: f32| {
            h.iter()
                .any(|e| (e.pos - y).abs() <= SNAP_TOLERANCE && e.covers(x0, x1))
        };
        let has_v = |x: f32, y_bottom: f32, y_top: f32| {
            v.iter()
                .any(|e| (e.pos - x).abs() <= SNAP_TOLERANCE && e.covers(y_bottom, y_top))
        };

        // h_border[r][c]: line above row r (r == rows is the bottom line)
        let h_border: Vec<Vec<bool>> = (0..=rows)
            .map(|r| (0..cols).map(|c| has_h(ys[r], xs[c], xs[c + 1])).collect())
            .collect();
        // v_border[r][c]: line left of column c (c == cols is the right line)
        let v_border: Vec<Vec<bool>> = (0..rows)
            .map(|r| (0..=cols).map(|c| has_v(xs[c], ys[r + 1], ys[r])).collect())
            .collect();

        let total = (rows + 1) * cols + rows * (cols + 1);
        let drawn = h_border.iter().flatten().filter(|b| **b).count()
            + v_border.iter().flatten().filter(|b| **b).count();
        let closure = drawn as f32 / total as f32;
        if closure < self.min_closure {
            log::debug!(
                "Lattice: {}x{} grid rejected, closure {:.2} < {:.2}",
                rows,
                cols,
                closure,
                self.min_closure
            );
            return None;
        }

        // Cells not separated from their left or upper neighbour continue it
        let mut anchor = vec![vec![(0usize, 0usize); cols]; rows];
        for r in 0..rows {
            for c in 0..cols {
                anchor[r][c] = if c > 0 && !v_border[r][c] {
                    anchor[r][c - 1]
                } else if r > 0 && !h_border[r][c] {
                    anchor[r - 1][c]
                } else {
                    (r, c)
                };
            }
        }

        let mut cell_spans: Vec<Vec<Vec<TextSpan>>> = vec![vec![Vec::new(); cols]; rows];
        for span in spans {
            let (x, y) = span.center();
            let col = (0..cols).find(|&c| x >= xs[c] && x <= xs[c + 1]);
            let row = (0..rows).find(|&r| y <= ys[r] && y >= ys[r + 1]);
            if let (Some(r), Some(c)) = (row, col) {
                let (ar, ac) = anchor[r][c];
                cell_spans[ar][ac].push(span.clone());
            }
        }

        let layout = LayoutAnalyzer::new();
        let cells: Vec<Vec<Option<String>>> = cell_spans
            .into_iter()
            .enumerate()
            .map(|(r, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(c, spans)| {
                        if anchor[r][c] != (r, c) {
                            return None;
                        }
                        let text = layout
                            .group_spans_into_lines(spans)
                            .iter()
                            .map(|line| line.text().trim().to_string())
                            .collect::<Vec<_>>()
                            .join("\n");
                        Some(text)
                    })
                    .collect()
            })
            .collect();

        log::debug!(
            "Lattice: accepted {}x{} grid at ({:.1}, {:.1}), closure {:.2}",
            rows,
            cols,
            xs[0],
            ys[0],
            closure
        );

        Some(DetectedTable {
            left: xs[0],
            right: xs[cols],
            top: ys[0],
            bottom: ys[rows],
            rows: cells,
        })
    }
}

/// Snap edges sharing a coordinate and join overlapping or touching runs.
fn merge_edges(mut edges: Vec<Edge>) -> Vec<Edge> {
    edges.sort_by(|a, b| a.pos.partial_cmp(&b.pos).unwrap_or(Ordering::Equal));

    let mut merged: Vec<Edge> = Vec::new();
    let mut group: Vec<Edge> = Vec::new();
    for edge in edges {
        if let Some(first) = group.first() {
            if edge.pos - first.pos > SNAP_TOLERANCE {
                merged.extend(join_runs(std::mem::take(&mut group)));
            }
        }
        group.push(edge);
    }
    merged.extend(join_runs(group));
    merged
}

fn join_runs(mut group: Vec<Edge>) -> Vec<Edge> {
    if group.is_empty() {
        return group;
    }
    let pos = group.iter().map(|e| e.pos).sum::<f32>() / group.len() as f32;
    group.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));

    let mut runs: Vec<Edge> = Vec::new();
    for edge in group {
        match runs.last_mut() {
            Some(run) if edge.start <= run.end + SNAP_TOLERANCE => run.end = run.end.max(edge.end),
            _ => runs.push(Edge { pos, ..edge }),
        }
    }
    runs
}

/// Group horizontal and vertical edges that touch into components.
fn connected_components(h: &[Edge], v: &[Edge]) -> Vec<(Vec<usize>, Vec<usize>)> {
    // Union-find over h edges (0..h.len()) then v edges
    let mut parent: Vec<usize> = (0..h.len() + v.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for (hi, he) in h.iter().enumerate() {
        for (vi, ve) in v.iter().enumerate() {
            let crosses = ve.pos >= he.start - SNAP_TOLERANCE
                && ve.pos <= he.end + SNAP_TOLERANCE
                && he.pos >= ve.start - SNAP_TOLERANCE
                && he.pos <= ve.end + SNAP_TOLERANCE;
            if crosses {
                let (a, b) = (find(&mut parent, hi), find(&mut parent, h.len() + vi));
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }

    let mut groups: std::collections::BTreeMap<usize, (Vec<usize>, Vec<usize>)> =
        std::collections::BTreeMap::new();
    for i in 0..h.len() + v.len() {
        let root = find(&mut parent, i);
        let entry = groups.entry(root).or_default();
        if i < h.len() {
            entry.0.push(i);
        } else {
            entry.1.push(i - h.len());
        }
    }

    groups
        .into_values()
        .filter(|(hs, vs)| hs.len() >= 2 && vs.len() >= 2)
        .collect()
}

/// Sorted distinct coordinates, snapping values within tolerance.
fn cluster_positions(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut values: Vec<f32> = values.collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for value in values {
        match clusters.last_mut() {
            Some(cluster) if value - cluster[0] <= SNAP_TOLERANCE => cluster.push(value),
            _ => clusters.push(vec![value]),
        }
    }
    clusters
        .iter()
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(xs: &[f32], ys: &[f32], kind: SegmentKind) -> Vec<Segment> {
        let (x0, x1) = (xs[0], xs[xs.len() - 1]);
        let (y0, y1) = (ys[ys.len() - 1], ys[0]);
        let mut segments: Vec<Segment> = ys
            .iter()
            .map(|&y| Segment::new(x0, y, x1, y, kind))
            .collect();
        segments.extend(xs.iter().map(|&x| Segment::new(x, y0, x, y1, kind)));
        segments
    }

    #[test]
    fn test_merge_edges_joins_collinear_runs() {
        let merged = merge_edges(vec![
            Edge { pos: 100.0, start: 0.0, end: 50.0 },
            Edge { pos: 101.0, start: 51.0, end: 100.0 },
            Edge { pos: 200.0, start: 0.0, end: 100.0 },
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start, 0.0);
        assert_eq!(merged[0].end, 100.0);
    }

    #[test]
    fn test_detect_grid_with_text() {
        let segments = grid(&[50.0, 150.0, 250.0], &[700.0, 680.0, 660.0], SegmentKind::Stroke);
        let spans = vec![
            TextSpan::new("Name", 55.0, 686.0, 10.0),
            TextSpan::new("Qty", 155.0, 686.0, 10.0),
            TextSpan::new("Apple", 55.0, 666.0, 10.0),
            TextSpan::new("3", 155.0, 666.0, 10.0),
            TextSpan::new("outside", 55.0, 600.0, 10.0),
        ];

        let tables = LatticeDetector::strict().detect(&segments, &spans);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].rows,
            vec![
                vec![Some("Name".into()), Some("Qty".into())],
                vec![Some("Apple".into()), Some("3".into())],
            ]
        );
        assert_eq!((tables[0].left, tables[0].right), (50.0, 250.0));
        assert_eq!((tables[0].top, tables[0].bottom), (700.0, 660.0));
    }

    #[test]
    fn test_multiline_cell() {
        let segments = grid(&[50.0, 150.0, 250.0], &[700.0, 650.0, 630.0], SegmentKind::Stroke);
        let spans = vec![
            TextSpan::new("first", 55.0, 688.0, 10.0),
            TextSpan::new("second", 55.0, 676.0, 10.0),
        ];
        let tables = LatticeDetector::strict().detect(&segments, &spans);
        assert_eq!(tables[0].rows[0][0], Some("first\nsecond".into()));
        assert_eq!(tables[0].rows[1][1], Some(String::new()));
    }

    #[test]
    fn test_merged_cell_is_null() {
        // 2x2 grid with the interior vertical line only in the bottom row
        let mut segments = Vec::new();
        for y in [700.0, 680.0, 660.0] {
            segments.push(Segment::new(50.0, y, 250.0, y, SegmentKind::Stroke));
        }
        segments.push(Segment::new(50.0, 660.0, 50.0, 700.0, SegmentKind::Stroke));
        segments.push(Segment::new(250.0, 660.0, 250.0, 700.0, SegmentKind::Stroke));
        segments.push(Segment::new(150.0, 660.0, 150.0, 680.0, SegmentKind::Stroke));

        let spans = vec![TextSpan::new("Title", 120.0, 686.0, 10.0)];
        let tables = LatticeDetector::relaxed().detect(&segments, &spans);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0], vec![Some("Title".into()), None]);

        // 11 of 12 borders drawn
        assert_eq!(LatticeDetector::strict().detect(&segments, &spans).len(), 1);
    }

    #[test]
    fn test_strict_ignores_filled_backgrounds() {
        let segments = grid(&[50.0, 150.0, 250.0], &[700.0, 680.0, 660.0], SegmentKind::FillEdge);
        assert!(LatticeDetector::strict().detect(&segments, &[]).is_empty());
        assert_eq!(LatticeDetector::relaxed().detect(&segments, &[]).len(), 1);
    }

    #[test]
    fn test_strict_requires_two_by_two() {
        let segments = grid(&[50.0, 250.0], &[700.0, 680.0, 660.0], SegmentKind::Stroke);
        assert!(LatticeDetector::strict().detect(&segments, &[]).is_empty());
        assert_eq!(LatticeDetector::relaxed().detect(&segments, &[]).len(), 1);
    }

    #[test]
    fn test_partially_ruled_grid() {
        let segments = vec![
            Segment::new(50.0, 700.0, 250.0, 700.0, SegmentKind::Stroke),
            Segment::new(50.0, 680.0, 150.0, 680.0, SegmentKind::Stroke),
            Segment::new(50.0, 660.0, 250.0, 660.0, SegmentKind::Stroke),
            Segment::new(50.0, 660.0, 50.0, 700.0, SegmentKind::Stroke),
            Segment::new(150.0, 680.0, 150.0, 700.0, SegmentKind::Stroke),
            Segment::new(250.0, 660.0, 250.0, 700.0, SegmentKind::Stroke),
        ];

        // 10 of 12 borders drawn
        assert!(LatticeDetector::strict().detect(&segments, &[]).is_empty());

        let relaxed = LatticeDetector::relaxed().detect(&segments, &[]);
        assert_eq!(relaxed.len(), 1);
        // Bottom-right cell continues its left neighbour
        assert_eq!(relaxed[0].rows[1], vec![Some(String::new()), None]);
    }
}
