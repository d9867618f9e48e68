//! Primitive records emitted by the canvas.

use serde::{Deserialize, Serialize};

/// A colour as recorded on a primitive.
///
/// Colours found in the palette are stored by index; anything else keeps its
/// literal `#rrggbb` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaintColor {
    /// Palette index
    Palette(usize),
    /// Literal colour, `#rrggbb`
    Rgb(String),
}

/// Direction of a line primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Along the x axis
    Horizontal,
    /// Along the y axis
    Vertical,
}

/// An axis-aligned stroked segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Start x (the smaller coordinate along the line)
    pub x: f64,
    /// Start y
    pub y: f64,
    /// Length along the line
    pub length: f64,
    /// Stroke width
    pub width: f64,
    /// Direction
    pub orientation: Orientation,
    /// Stroke colour
    pub color: PaintColor,
    /// A dash pattern was in effect
    pub dashed: bool,
    /// The path was also used as a clipping path
    #[serde(default, skip_serializing_if = "is_false")]
    pub clip: bool,
}

/// Pattern a fill was painted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInfo {
    /// `tiling` or `shading`
    pub kind: String,
    /// Pattern space to page space, relative to the page's base transform
    pub matrix: [f64; 6],
}

/// The bounding box of a filled path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Left edge
    pub x: f64,
    /// Bottom edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Fill colour (representative colour for patterns)
    pub color: PaintColor,
    /// Pattern details, when the fill used one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternInfo>,
    /// The path was also used as a clipping path
    #[serde(default, skip_serializing_if = "is_false")]
    pub clip: bool,
}

/// Text drawn by one show operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Mapped text
    pub text: String,
    /// Origin x of the first glyph
    pub x: f64,
    /// Origin y of the first glyph (baseline, including rise)
    pub y: f64,
    /// Effective font size on the page
    pub size: f64,
    /// Horizontal scaling in percent
    pub horizontal_scale: f64,
    /// Identifier of the font used
    pub font_id: String,
    /// Colour of the painted glyphs (fill colour unless only stroked)
    pub color: PaintColor,
    /// Glyph interiors are painted
    pub fill: bool,
    /// Glyph outlines are painted
    pub stroke: bool,
    /// Glyph outlines are added to the clipping path
    #[serde(default, skip_serializing_if = "is_false")]
    pub clip: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Destination for primitives, in painting order.
pub trait PrimitiveSink {
    /// Receive a line.
    fn line(&mut self, line: Line);

    /// Receive a fill.
    fn fill(&mut self, fill: Fill);

    /// Receive a text run.
    fn text(&mut self, run: TextRun);
}

/// Primitives of one page, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagePrimitives {
    /// Zero-based page index
    pub page: usize,
    /// Page width (crop box)
    pub width: f64,
    /// Page height (crop box)
    pub height: f64,
    /// Horizontal and vertical lines
    pub lines: Vec<Line>,
    /// Filled areas
    pub fills: Vec<Fill>,
    /// Text runs
    pub texts: Vec<TextRun>,
}

impl PagePrimitives {
    /// Empty collection for a page of the given size.
    pub fn new(page: usize, width: f64, height: f64) -> Self {
        Self {
            page,
            width,
            height,
            ..Self::default()
        }
    }

    /// Total number of primitives.
    pub fn len(&self) -> usize {
        self.lines.len() + self.fills.len() + self.texts.len()
    }

    /// True if nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PrimitiveSink for PagePrimitives {
    fn line(&mut self, line: Line) {
        self.lines.push(line);
    }

    fn fill(&mut self, fill: Fill) {
        self.fills.push(fill);
    }

    fn text(&mut self, run: TextRun) {
        self.texts.push(run);
    }
}

impl<S: PrimitiveSink + ?Sized> PrimitiveSink for &mut S {
    fn line(&mut self, line: Line) {
        (**self).line(line)
    }

    fn fill(&mut self, fill: Fill) {
        (**self).fill(fill)
    }

    fn text(&mut self, run: TextRun) {
        (**self).text(run)
    }
}
