//! PDF extraction: page geometry, layout, table strategies and the walker.

mod alignment;
pub mod backend;
mod lattice;
mod layout;
mod strategy;
mod walker;

pub use alignment::{AlignmentConfig, AlignmentDetector};
pub use backend::{
    decode_text_simple, LopdfBackend, LopdfPdf, PageContent, PdfBackend, PdfDocument, Segment,
    SegmentKind, TextSpan,
};
pub use lattice::LatticeDetector;
pub use layout::{Column, LayoutAnalyzer, PageLayout, TextBlock, TextLine};
pub use strategy::{DetectedTable, TableStrategySelector};
pub use walker::{analyze_page, PageItem, PdfWalker};
