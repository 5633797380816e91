//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for PDF access, isolating the concrete
//! PDF library (lopdf) from layout analysis and table detection. The backend
//! reduces each page to neutral geometry: positioned text spans and the
//! straight segments of painted paths.

use std::collections::BTreeMap;

use image::DynamicImage;
use lopdf::content::Content;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use unicode_normalization::UnicodeNormalization;

use super::layout::is_spaceless_script_char;
use crate::error::{Error, Result};

/// Letter size, used when a page has no usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);
/// Filled rectangles thinner than this are drawn rules, not backgrounds.
const THIN_RECT: f32 = 2.0;
/// TJ adjustment (thousandths of an em) treated as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// A text span with position and font information.
///
/// Coordinates are PDF user space: origin bottom-left, `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Advance width of the text
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
}

impl TextSpan {
    /// Create a span, estimating its width from the font size.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * 0.5;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name: String::new(),
        }
    }

    /// Set the width and return self.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the bottom Y coordinate (approximate, based on font size).
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2 // Approximate descender
    }

    /// Get the top Y coordinate (approximate, based on font size).
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8 // Approximate ascender
    }

    /// Centre point of the glyph box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, (self.top() + self.bottom()) / 2.0)
    }
}

/// How a segment was painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Stroked path or stroked rectangle edge
    Stroke,
    /// Centre line of a thin filled rectangle
    ThinFill,
    /// Edge of a fill-only shape (cell shading, backgrounds)
    FillEdge,
}

/// A straight segment of a painted path, in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start X
    pub x0: f32,
    /// Start Y
    pub y0: f32,
    /// End X
    pub x1: f32,
    /// End Y
    pub y1: f32,
    /// Paint operation that produced it
    pub kind: SegmentKind,
}

impl Segment {
    /// Create a segment.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32, kind: SegmentKind) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            kind,
        }
    }
}

/// Geometry of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    /// 1-based page number
    pub number: u32,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Text spans in content stream order
    pub spans: Vec<TextSpan>,
    /// Painted straight segments
    pub segments: Vec<Segment>,
}

/// PDF capability provider: opens documents from bytes.
pub trait PdfBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Parse a document.
    fn open(&self, data: &[u8]) -> Result<Box<dyn PdfDocument>>;
}

/// An opened PDF document.
pub trait PdfDocument {
    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Geometry of a 1-based page.
    fn page(&self, number: u32) -> Result<PageContent>;

    /// Largest raster image placed on a 1-based page, if it can be decoded.
    fn page_image(&self, number: u32) -> Result<Option<DynamicImage>>;
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // Try UTF-16BE first (BOM marker)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    // Try UTF-8
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Fallback: Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// LopdfBackend: concrete implementation backed by lopdf
// ---------------------------------------------------------------------------

/// [`PdfBackend`] backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn open(&self, data: &[u8]) -> Result<Box<dyn PdfDocument>> {
        Ok(Box::new(LopdfPdf::load_bytes(data)?))
    }
}

/// A document loaded with lopdf.
pub struct LopdfPdf {
    doc: LopdfDocument,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfPdf {
    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        // Reads from memory only fail on truncated or malformed input.
        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::IO(io) => {
                Error::InvalidDocumentData(format!("PDF parsing error: {}", io))
            }
            other => other.into(),
        })?;
        if doc.is_encrypted() {
            return Err(Error::InvalidDocumentData("PDF is encrypted".to_string()));
        }
        let pages = doc.get_pages();
        Ok(Self { doc, pages })
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_id(&self, number: u32) -> Result<ObjectId> {
        self.pages.get(&number).copied().ok_or_else(|| {
            Error::InvalidDocumentData(format!(
                "page {} is out of range (document has {} pages)",
                number,
                self.pages.len()
            ))
        })
    }

    /// Look up a page attribute, following the `Parent` chain for inherited keys.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        // Bounded walk guards against reference cycles.
        for _ in 0..32 {
            let dict = current?;
            if let Ok(value) = dict.get(key) {
                return Some(deref(&self.doc, value));
            }
            current = dict
                .get(b"Parent")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|id| self.doc.get_dictionary(id).ok());
        }
        None
    }

    fn page_size(&self, page_id: ObjectId) -> (f32, f32) {
        self.inherited(page_id, b"MediaBox")
            .and_then(|b| b.as_array().ok())
            .filter(|a| a.len() >= 4)
            .map(|a| {
                let n: Vec<f32> = a.iter().map(|o| get_number(o).unwrap_or(0.0)).collect();
                ((n[2] - n[0]).abs(), (n[3] - n[1]).abs())
            })
            .filter(|(w, h)| *w > 0.0 && *h > 0.0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Font dictionaries of a page keyed by resource name.
    fn page_fonts(&self, page_id: ObjectId) -> BTreeMap<Vec<u8>, &Dictionary> {
        self.inherited(page_id, b"Resources")
            .and_then(|r| r.as_dict().ok())
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|f| deref(&self.doc, f).as_dict().ok())
            .map(|fonts| {
                fonts
                    .iter()
                    .filter_map(|(name, font)| {
                        deref(&self.doc, font)
                            .as_dict()
                            .ok()
                            .map(|dict| (name.clone(), dict))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn page_content_bytes(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(c) => c,
            // A page without content is blank, not broken.
            Err(_) => return Ok(Vec::new()),
        };

        let streams: Vec<&Object> = match deref(&self.doc, contents) {
            Object::Array(arr) => arr.iter().map(|o| deref(&self.doc, o)).collect(),
            other => vec![other],
        };

        let mut content = Vec::new();
        for obj in streams {
            match obj {
                Object::Stream(s) => {
                    let data = s.decompressed_content().unwrap_or_else(|_| s.content.clone());
                    content.extend_from_slice(&data);
                    content.push(b'\n');
                }
                _ => {
                    return Err(Error::InvalidDocumentData(
                        "invalid content stream".to_string(),
                    ))
                }
            }
        }
        Ok(content)
    }

    fn image_from_xobject(&self, stream: &lopdf::Stream) -> Option<DynamicImage> {
        let dict = &stream.dict;
        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        let filters: Vec<String> = match dict.get(b"Filter").map(|f| deref(&self.doc, f)) {
            Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
            Ok(Object::Array(arr)) => arr
                .iter()
                .filter_map(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string())
                .collect(),
            _ => Vec::new(),
        };

        if filters.iter().any(|f| f == "DCTDecode") {
            // JPEG - data can be used directly
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .map_err(|e| log::debug!("Embedded JPEG could not be decoded: {}", e))
                .ok();
        }

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|b| b.as_i64().ok())
            .unwrap_or(8);
        let color_space = match dict.get(b"ColorSpace").map(|c| deref(&self.doc, c)) {
            Ok(Object::Name(n)) => String::from_utf8_lossy(n).to_string(),
            _ => String::new(),
        };
        if bits != 8 {
            log::debug!("Skipping embedded image with {} bits per component", bits);
            return None;
        }

        let data = stream.decompressed_content().ok()?;
        match color_space.as_str() {
            "DeviceGray" => image::GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            "DeviceRGB" => image::RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            other => {
                log::debug!("Skipping embedded image in color space '{}'", other);
                None
            }
        }
    }
}

impl PdfDocument for LopdfPdf {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> Result<PageContent> {
        let page_id = self.page_id(number)?;
        let (width, height) = self.page_size(page_id);

        let fonts = self.page_fonts(page_id);

        let raw = self.page_content_bytes(page_id)?;
        let content = Content::decode(&raw)
            .map_err(|e| Error::InvalidDocumentData(format!("page {}: {}", number, e)))?;

        let mut interpreter = ContentInterpreter::new(&self.doc, &fonts);
        for op in &content.operations {
            interpreter.apply(&op.operator, &op.operands);
        }

        let (spans, segments) = interpreter.finish();
        log::debug!(
            "Page {}: {} spans, {} segments",
            number,
            spans.len(),
            segments.len()
        );

        Ok(PageContent {
            number,
            width,
            height,
            spans,
            segments,
        })
    }

    fn page_image(&self, number: u32) -> Result<Option<DynamicImage>> {
        let page_id = self.page_id(number)?;

        let xobjects = match self
            .inherited(page_id, b"Resources")
            .and_then(|r| r.as_dict().ok())
            .and_then(|r| r.get(b"XObject").ok())
            .map(|x| deref(&self.doc, x))
            .and_then(|x| x.as_dict().ok())
        {
            Some(x) => x,
            None => return Ok(None),
        };

        let mut best: Option<(u64, &lopdf::Stream)> = None;
        for (_, obj) in xobjects.iter() {
            if let Object::Stream(stream) = deref(&self.doc, obj) {
                let is_image = stream
                    .dict
                    .get(b"Subtype")
                    .and_then(|s| s.as_name())
                    .map(|s| s == b"Image")
                    .unwrap_or(false);
                if !is_image {
                    continue;
                }
                let area = ["Width", "Height"]
                    .iter()
                    .filter_map(|k| stream.dict.get(k.as_bytes()).ok()?.as_i64().ok())
                    .map(|v| v.max(0) as u64)
                    .product::<u64>();
                if best.map_or(true, |(a, _)| area > a) {
                    best = Some((area, stream));
                }
            }
        }

        Ok(best.and_then(|(_, stream)| self.image_from_xobject(stream)))
    }
}

/// Follow a single indirect reference.
fn deref<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(ops: &[Object]) -> Option<Self> {
        if ops.len() < 6 {
            return None;
        }
        let n: Vec<f32> = ops[..6].iter().map(get_number).collect::<Option<_>>()?;
        Some(Matrix {
            a: n[0],
            b: n[1],
            c: n[2],
            d: n[3],
            e: n[4],
            f: n[5],
        })
    }

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn x_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn y_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

type Point = (f32, f32);

/// Walks content stream operators and collects spans and segments.
struct ContentInterpreter<'a> {
    doc: &'a LopdfDocument,
    fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    // Current path, already in user space
    edges: Vec<(Point, Point)>,
    rects: Vec<[Point; 4]>,
    current: Option<Point>,
    subpath_start: Option<Point>,
    spans: Vec<TextSpan>,
    segments: Vec<Segment>,
}

impl<'a> ContentInterpreter<'a> {
    fn new(doc: &'a LopdfDocument, fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>) -> Self {
        Self {
            doc,
            fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            edges: Vec::new(),
            rects: Vec::new(),
            current: None,
            subpath_start: None,
            spans: Vec::new(),
            segments: Vec::new(),
        }
    }

    fn finish(self) -> (Vec<TextSpan>, Vec<Segment>) {
        (self.spans, self.segments)
    }

    fn num(ops: &[Object], i: usize) -> f32 {
        ops.get(i).and_then(get_number).unwrap_or(0.0)
    }

    fn apply(&mut self, operator: &str, ops: &[Object]) {
        match operator {
            // Graphics state
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(ops) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }

            // Path construction
            "m" => {
                let p = self.user_point(Self::num(ops, 0), Self::num(ops, 1));
                self.current = Some(p);
                self.subpath_start = Some(p);
            }
            "l" => {
                let p = self.user_point(Self::num(ops, 0), Self::num(ops, 1));
                if let Some(from) = self.current {
                    self.edges.push((from, p));
                }
                self.current = Some(p);
            }
            // Curves move the current point but are never rulings
            "c" => self.current = Some(self.user_point(Self::num(ops, 4), Self::num(ops, 5))),
            "v" | "y" => self.current = Some(self.user_point(Self::num(ops, 2), Self::num(ops, 3))),
            "h" => self.close_subpath(),
            "re" => {
                let (x, y, w, h) = (
                    Self::num(ops, 0),
                    Self::num(ops, 1),
                    Self::num(ops, 2),
                    Self::num(ops, 3),
                );
                let corners = [
                    self.user_point(x, y),
                    self.user_point(x + w, y),
                    self.user_point(x + w, y + h),
                    self.user_point(x, y + h),
                ];
                self.rects.push(corners);
                self.current = Some(corners[0]);
                self.subpath_start = Some(corners[0]);
            }

            // Path painting
            "S" => self.paint(true),
            "s" => {
                self.close_subpath();
                self.paint(true);
            }
            "f" | "F" | "f*" => self.paint(false),
            "B" | "B*" => self.paint(true),
            "b" | "b*" => {
                self.close_subpath();
                self.paint(true);
            }
            "n" => self.clear_path(),

            // Text state
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = ops.first() {
                    self.state.font = name.clone();
                }
                if let Some(size) = ops.get(1).and_then(get_number) {
                    self.state.font_size = size;
                }
            }
            "Tc" => self.state.char_spacing = Self::num(ops, 0),
            "Tw" => self.state.word_spacing = Self::num(ops, 0),
            "Tz" => self.state.horizontal_scale = Self::num(ops, 0) / 100.0,
            "TL" => self.state.leading = Self::num(ops, 0),

            // Text positioning
            "Td" => self.move_line(Self::num(ops, 0), Self::num(ops, 1)),
            "TD" => {
                let ty = Self::num(ops, 1);
                self.state.leading = -ty;
                self.move_line(Self::num(ops, 0), ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(ops) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),

            // Text showing
            "Tj" => {
                if let Some(Object::String(bytes, _)) = ops.first() {
                    self.show(&[ShowItem::Bytes(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(arr)) = ops.first() {
                    let items: Vec<ShowItem<'_>> = arr
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(ShowItem::Bytes(bytes)),
                            other => get_number(other).map(ShowItem::Adjust),
                        })
                        .collect();
                    self.show(&items);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = ops.first() {
                    self.show(&[ShowItem::Bytes(bytes)]);
                }
            }
            "\"" => {
                self.state.word_spacing = Self::num(ops, 0);
                self.state.char_spacing = Self::num(ops, 1);
                self.next_line();
                if let Some(Object::String(bytes, _)) = ops.get(2) {
                    self.show(&[ShowItem::Bytes(bytes)]);
                }
            }
            _ => {}
        }
    }

    fn user_point(&self, x: f32, y: f32) -> Point {
        self.state.ctm.apply(x, y)
    }

    fn close_subpath(&mut self) {
        if let (Some(from), Some(start)) = (self.current, self.subpath_start) {
            if from != start {
                self.edges.push((from, start));
            }
            self.current = Some(start);
        }
    }

    fn clear_path(&mut self) {
        self.edges.clear();
        self.rects.clear();
        self.current = None;
        self.subpath_start = None;
    }

    fn paint(&mut self, stroked: bool) {
        let edge_kind = if stroked {
            SegmentKind::Stroke
        } else {
            SegmentKind::FillEdge
        };
        for &((x0, y0), (x1, y1)) in &self.edges {
            self.segments.push(Segment::new(x0, y0, x1, y1, edge_kind));
        }

        for corners in &self.rects {
            let xs = corners.iter().map(|p| p.0);
            let ys = corners.iter().map(|p| p.1);
            let (min_x, max_x) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
            let (min_y, max_y) = ys.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
            let (w, h) = (max_x - min_x, max_y - min_y);

            if !stroked && h <= THIN_RECT && w > h {
                let y = (min_y + max_y) / 2.0;
                self.segments
                    .push(Segment::new(min_x, y, max_x, y, SegmentKind::ThinFill));
            } else if !stroked && w <= THIN_RECT && h > w {
                let x = (min_x + max_x) / 2.0;
                self.segments
                    .push(Segment::new(x, min_y, x, max_y, SegmentKind::ThinFill));
            } else {
                for i in 0..4 {
                    let (a, b) = (corners[i], corners[(i + 1) % 4]);
                    self.segments
                        .push(Segment::new(a.0, a.1, b.0, b.1, edge_kind));
                }
            }
        }

        self.clear_path();
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.state.leading != 0.0 {
            self.state.leading
        } else {
            // No TL set: fall back to the usual 1.2 line height
            self.state.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let decoded = self
            .fonts
            .get(&self.state.font)
            .and_then(|font| font.get_font_encoding(self.doc).ok())
            .and_then(|enc| LopdfDocument::decode_text(&enc, bytes).ok())
            .unwrap_or_else(|| decode_text_simple(bytes));
        // Compatibility forms split ligatures such as "ﬁ"
        decoded.nfkc().collect()
    }

    /// Advance in unscaled text space for a string shown with the current font.
    fn advance(&self, bytes: &[u8], glyphs: usize) -> f32 {
        let size = self.state.font_size;
        let font = self.fonts.get(&self.state.font);
        let metrics = font.and_then(|f| SimpleWidths::from_font(self.doc, f));

        let mut tx = 0.0;
        match metrics {
            Some(widths) => {
                for &code in bytes {
                    tx += widths.width(code) / 1000.0 * size + self.state.char_spacing;
                    if code == b' ' {
                        tx += self.state.word_spacing;
                    }
                }
            }
            None => {
                let em = font
                    .and_then(|f| f.get(b"BaseFont").ok())
                    .and_then(|b| b.as_name().ok())
                    .map(|name| {
                        if String::from_utf8_lossy(name).contains("Courier") {
                            0.6
                        } else {
                            0.5
                        }
                    })
                    .unwrap_or(0.5);
                tx = glyphs as f32 * (em * size + self.state.char_spacing);
            }
        }
        tx * self.state.horizontal_scale
    }

    fn font_name(&self) -> String {
        self.fonts
            .get(&self.state.font)
            .and_then(|f| f.get(b"BaseFont").ok())
            .and_then(|b| b.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(&self.state.font).to_string())
    }

    fn show(&mut self, items: &[ShowItem<'_>]) {
        let start = self.text_matrix.then(&self.state.ctm);
        let mut text = String::new();
        let mut tx_total = 0.0;

        for item in items {
            match *item {
                ShowItem::Bytes(bytes) => {
                    let decoded = self.decode(bytes);
                    let glyphs = decoded.chars().count();
                    tx_total += self.advance(bytes, glyphs);
                    text.push_str(&decoded);
                }
                ShowItem::Adjust(n) => {
                    tx_total -= n / 1000.0 * self.state.font_size * self.state.horizontal_scale;
                    // Large negative values (like -200 to -300) often indicate word spaces
                    let spaced = text
                        .chars()
                        .last()
                        .map_or(true, |c| c == ' ' || c == '\u{00A0}' || is_spaceless_script_char(c));
                    if -n > TJ_SPACE_THRESHOLD && !spaced {
                        text.push(' ');
                    }
                }
            }
        }

        self.text_matrix = Matrix::translation(tx_total, 0.0).then(&self.text_matrix);

        if text.trim().is_empty() {
            return;
        }

        let (x, y) = start.apply(0.0, 0.0);
        let font_size = self.state.font_size * start.y_scale();
        let width = (tx_total * start.x_scale()).max(0.0);
        self.spans.push(TextSpan {
            text,
            x,
            y,
            width,
            font_size,
            font_name: self.font_name(),
        });
    }
}

/// One operand of a text-showing operator.
#[derive(Clone, Copy)]
enum ShowItem<'b> {
    Bytes(&'b [u8]),
    Adjust(f32),
}

/// `Widths` array of a simple (single-byte) font.
struct SimpleWidths {
    first_char: i64,
    widths: Vec<f32>,
    missing: f32,
}

impl SimpleWidths {
    fn from_font(doc: &LopdfDocument, font: &Dictionary) -> Option<Self> {
        let subtype = font.get(b"Subtype").ok()?.as_name().ok()?;
        if subtype == b"Type0" {
            return None;
        }
        let widths = deref(doc, font.get(b"Widths").ok()?).as_array().ok()?;
        let first_char = font.get(b"FirstChar").ok()?.as_i64().ok()?;
        let missing = font
            .get(b"FontDescriptor")
            .ok()
            .map(|d| deref(doc, d))
            .and_then(|d| d.as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(get_number)
            .unwrap_or(500.0);
        Some(Self {
            first_char,
            widths: widths
                .iter()
                .map(|w| get_number(deref(doc, w)).unwrap_or(missing))
                .collect(),
            missing,
        })
    }

    fn width(&self, code: u8) -> f32 {
        let index = code as i64 - self.first_char;
        if index < 0 {
            return self.missing;
        }
        self.widths
            .get(index as usize)
            .copied()
            .unwrap_or(self.missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_simple_utf8() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
    }

    #[test]
    fn test_decode_text_simple_latin1() {
        // 0xE9 = 'é' in Latin-1
        let bytes = vec![0x48, 0x65, 0x6C, 0x6C, 0xE9];
        assert_eq!(decode_text_simple(&bytes), "Hellé");
    }

    #[test]
    fn test_decode_text_simple_utf16be() {
        // UTF-16BE BOM + "Hi"
        let bytes = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_simple(&bytes), "Hi");
    }

    #[test]
    fn test_matrix_composition() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let moved = Matrix::translation(10.0, 5.0).then(&scale);
        assert_eq!(moved.apply(0.0, 0.0), (20.0, 10.0));
        assert_eq!(moved.apply(1.0, 1.0), (22.0, 12.0));
        assert_eq!(moved.x_scale(), 2.0);
    }

    #[test]
    fn test_span_geometry() {
        let span = TextSpan::new("abcd", 100.0, 700.0, 10.0);
        assert_eq!(span.width, 20.0);
        assert_eq!(span.right(), 120.0);
        assert!(span.top() > span.y && span.bottom() < span.y);
        let (cx, _) = span.center();
        assert_eq!(cx, 110.0);
    }

    #[test]
    fn test_open_rejects_garbage() {
        for data in [&b"%PDF-1.4\nthis is not a pdf"[..], b"%PDF-", b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog"] {
            let err = LopdfBackend.open(data).err().expect("garbage must not open");
            assert!(matches!(err, Error::InvalidDocumentData(_)), "{err:?}");
            assert_eq!(err.status_code(), 422);
        }
    }
}
