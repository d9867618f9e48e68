//! Content stream operators and the evaluator's output list.
//!
//! [`OpCode`] is the static operator table: every content operator with its
//! operand arity. [`Operation`] is the typed form the evaluator emits after
//! checking operands, mapping glyphs, converting colours and resolving
//! patterns and forms. An [`OperatorList`] collects operations for one page.

use crate::content::colorspace::Rgb;
use crate::content::graphics_state::Matrix;
use crate::content::pattern::PatternIr;
use crate::fonts::FontExport;
use crate::lexer::KnownSymbols;
use lazy_static::lazy_static;
use std::collections::BTreeSet;

/// Operand count accepted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many operands
    Fixed(usize),
    /// Up to this many operands
    Variadic(usize),
}

macro_rules! opcodes {
    ($($variant:ident => $symbol:literal, $arity:expr;)*) => {
        /// A content stream operator.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $(
                #[doc = concat!("`", $symbol, "`")]
                $variant,
            )*
        }

        impl OpCode {
            /// Every operator, in table order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant),*];

            /// Look up an operator by its symbol.
            pub fn from_symbol(symbol: &str) -> Option<OpCode> {
                match symbol {
                    $($symbol => Some(OpCode::$variant),)*
                    _ => None,
                }
            }

            /// Operator symbol as it appears in content streams.
            pub fn symbol(self) -> &'static str {
                match self {
                    $(OpCode::$variant => $symbol,)*
                }
            }

            /// Operand count from the static table.
            pub fn arity(self) -> Arity {
                match self {
                    $(OpCode::$variant => $arity,)*
                }
            }
        }
    };
}

opcodes! {
    // General graphics state
    SetLineWidth => "w", Arity::Fixed(1);
    SetLineCap => "J", Arity::Fixed(1);
    SetLineJoin => "j", Arity::Fixed(1);
    SetMiterLimit => "M", Arity::Fixed(1);
    SetDash => "d", Arity::Fixed(2);
    SetRenderingIntent => "ri", Arity::Fixed(1);
    SetFlatness => "i", Arity::Fixed(1);
    SetGState => "gs", Arity::Fixed(1);
    Save => "q", Arity::Fixed(0);
    Restore => "Q", Arity::Fixed(0);
    Transform => "cm", Arity::Fixed(6);

    // Path construction
    MoveTo => "m", Arity::Fixed(2);
    LineTo => "l", Arity::Fixed(2);
    CurveTo => "c", Arity::Fixed(6);
    CurveTo2 => "v", Arity::Fixed(4);
    CurveTo3 => "y", Arity::Fixed(4);
    ClosePath => "h", Arity::Fixed(0);
    Rectangle => "re", Arity::Fixed(4);

    // Path painting
    Stroke => "S", Arity::Fixed(0);
    CloseStroke => "s", Arity::Fixed(0);
    Fill => "f", Arity::Fixed(0);
    FillCompat => "F", Arity::Fixed(0);
    EoFill => "f*", Arity::Fixed(0);
    FillStroke => "B", Arity::Fixed(0);
    EoFillStroke => "B*", Arity::Fixed(0);
    CloseFillStroke => "b", Arity::Fixed(0);
    CloseEoFillStroke => "b*", Arity::Fixed(0);
    EndPath => "n", Arity::Fixed(0);

    // Clipping
    Clip => "W", Arity::Fixed(0);
    EoClip => "W*", Arity::Fixed(0);

    // Text objects and state
    BeginText => "BT", Arity::Fixed(0);
    EndText => "ET", Arity::Fixed(0);
    SetCharSpacing => "Tc", Arity::Fixed(1);
    SetWordSpacing => "Tw", Arity::Fixed(1);
    SetHScale => "Tz", Arity::Fixed(1);
    SetLeading => "TL", Arity::Fixed(1);
    SetFont => "Tf", Arity::Fixed(2);
    SetTextRenderingMode => "Tr", Arity::Fixed(1);
    SetTextRise => "Ts", Arity::Fixed(1);

    // Text positioning and showing
    MoveText => "Td", Arity::Fixed(2);
    SetLeadingMoveText => "TD", Arity::Fixed(2);
    SetTextMatrix => "Tm", Arity::Fixed(6);
    NextLine => "T*", Arity::Fixed(0);
    ShowText => "Tj", Arity::Fixed(1);
    ShowSpacedText => "TJ", Arity::Fixed(1);
    NextLineShowText => "'", Arity::Fixed(1);
    NextLineSetSpacingShowText => "\"", Arity::Fixed(3);

    // Type 3 glyphs
    SetCharWidth => "d0", Arity::Fixed(2);
    SetCharWidthAndBounds => "d1", Arity::Fixed(6);

    // Colour
    SetStrokeColorSpace => "CS", Arity::Fixed(1);
    SetFillColorSpace => "cs", Arity::Fixed(1);
    SetStrokeColor => "SC", Arity::Variadic(4);
    SetStrokeColorN => "SCN", Arity::Variadic(33);
    SetFillColor => "sc", Arity::Variadic(4);
    SetFillColorN => "scn", Arity::Variadic(33);
    SetStrokeGray => "G", Arity::Fixed(1);
    SetFillGray => "g", Arity::Fixed(1);
    SetStrokeRgb => "RG", Arity::Fixed(3);
    SetFillRgb => "rg", Arity::Fixed(3);
    SetStrokeCmyk => "K", Arity::Fixed(4);
    SetFillCmyk => "k", Arity::Fixed(4);

    // Shading, images, XObjects
    ShadingFill => "sh", Arity::Fixed(1);
    BeginInlineImage => "BI", Arity::Fixed(0);
    BeginImageData => "ID", Arity::Fixed(0);
    EndInlineImage => "EI", Arity::Fixed(1);
    PaintXObject => "Do", Arity::Fixed(1);

    // Marked content
    MarkPoint => "MP", Arity::Fixed(1);
    MarkPointProps => "DP", Arity::Fixed(2);
    BeginMarkedContent => "BMC", Arity::Fixed(1);
    BeginMarkedContentProps => "BDC", Arity::Fixed(2);
    EndMarkedContent => "EMC", Arity::Fixed(0);

    // Compatibility
    BeginCompat => "BX", Arity::Fixed(0);
    EndCompat => "EX", Arity::Fixed(0);
}

lazy_static! {
    /// Symbols the content lexer splits glued operators against.
    pub static ref CONTENT_SYMBOLS: KnownSymbols =
        KnownSymbols::new(OpCode::ALL.iter().map(|op| op.symbol()).chain(["true", "false", "null"]));
}

/// One glyph of a text-show operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Character code as read from the string operand
    pub code: u32,
    /// Mapped Unicode text (may be empty or several characters)
    pub unicode: String,
    /// Advance width in text space units per unit font size
    pub width: f64,
    /// The code is the single-byte space character (code 32)
    pub is_space: bool,
}

/// Element of a text-show operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TextItem {
    /// A mapped glyph
    Glyph(Glyph),
    /// TJ positioning adjustment in thousandths of text space
    Adjust(f64),
    /// Adjustment large enough to separate words
    WordBreak,
}

/// How a path is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOp {
    /// `S`
    Stroke,
    /// `s`
    CloseStroke,
    /// `f` / `F`
    Fill,
    /// `f*`
    EoFill,
    /// `B`
    FillStroke,
    /// `B*`
    EoFillStroke,
    /// `b`
    CloseFillStroke,
    /// `b*`
    CloseEoFillStroke,
    /// `n`
    EndPath,
}

impl PaintOp {
    /// The path interior is painted.
    pub fn fills(self) -> bool {
        matches!(
            self,
            PaintOp::Fill
                | PaintOp::EoFill
                | PaintOp::FillStroke
                | PaintOp::EoFillStroke
                | PaintOp::CloseFillStroke
                | PaintOp::CloseEoFillStroke
        )
    }

    /// The path outline is stroked.
    pub fn strokes(self) -> bool {
        matches!(
            self,
            PaintOp::Stroke
                | PaintOp::CloseStroke
                | PaintOp::FillStroke
                | PaintOp::EoFillStroke
                | PaintOp::CloseFillStroke
                | PaintOp::CloseEoFillStroke
        )
    }

    /// Subpaths are closed before painting.
    pub fn closes(self) -> bool {
        matches!(self, PaintOp::CloseStroke | PaintOp::CloseFillStroke | PaintOp::CloseEoFillStroke)
    }
}

/// A checked, typed content operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// `q`
    Save,
    /// `Q`
    Restore,
    /// `cm`
    Transform(Matrix),
    /// `w`
    SetLineWidth(f64),
    /// `J`
    SetLineCap(i64),
    /// `j`
    SetLineJoin(i64),
    /// `M`
    SetMiterLimit(f64),
    /// `d`
    SetDash {
        /// Dash lengths
        array: Vec<f64>,
        /// Dash phase
        phase: f64,
    },
    /// Any fill colour operator, converted
    SetFillRgb(Rgb),
    /// Any stroke colour operator, converted
    SetStrokeRgb(Rgb),
    /// `scn` naming a pattern
    SetFillPattern(PatternIr),
    /// `SCN` naming a pattern
    SetStrokePattern(PatternIr),
    /// `m`
    MoveTo(f64, f64),
    /// `l`
    LineTo(f64, f64),
    /// `c`, `v`, `y`; control points and end point
    CurveTo([f64; 6]),
    /// `re`
    Rectangle {
        /// Corner x
        x: f64,
        /// Corner y
        y: f64,
        /// Width (may be negative)
        width: f64,
        /// Height (may be negative)
        height: f64,
    },
    /// `h`
    ClosePath,
    /// Path painting operators
    Paint(PaintOp),
    /// `W` / `W*`
    Clip {
        /// Even-odd rule
        even_odd: bool,
    },
    /// `BT`
    BeginText,
    /// `ET`
    EndText,
    /// `Tc`
    SetCharSpacing(f64),
    /// `Tw`
    SetWordSpacing(f64),
    /// `Tz`
    SetHorizontalScaling(f64),
    /// `TL`
    SetLeading(f64),
    /// `Tf`, with the font replaced by its stable identifier
    SetFont {
        /// Font identifier
        font_id: String,
        /// Font size
        size: f64,
    },
    /// `Tr`
    SetRenderMode(i64),
    /// `Ts`
    SetTextRise(f64),
    /// `Td`
    MoveText(f64, f64),
    /// `TD`
    SetLeadingMoveText(f64, f64),
    /// `Tm`
    SetTextMatrix(Matrix),
    /// `T*`
    NextLine,
    /// `Tj`, `TJ`, `'`, `"` with mapped glyphs
    ShowText(Vec<TextItem>),
    /// Start of an inlined form XObject
    BeginForm {
        /// Form matrix
        matrix: Matrix,
        /// Form bounding box
        bbox: Option<[f64; 4]>,
    },
    /// End of an inlined form XObject
    EndForm,
    /// `sh`
    ShadingFill(PatternIr),
    /// Image XObject or inline image (not decoded)
    PaintImage {
        /// Inline (`BI ... EI`) rather than an XObject
        inline: bool,
    },
}

/// Ordered operations for one page, plus the fonts first seen on it.
#[derive(Debug, Clone, Default)]
pub struct OperatorList {
    operations: Vec<Operation>,
    new_fonts: Vec<FontExport>,
    dependencies: BTreeSet<String>,
    flushed: bool,
}

impl OperatorList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation. Ignored once the list is flushed.
    pub fn push(&mut self, op: Operation) {
        if self.flushed {
            log::warn!("Operation pushed after the operator list was flushed: {:?}", op);
            return;
        }
        self.operations.push(op);
    }

    /// Announce a font the consumer has not seen before.
    pub fn add_font(&mut self, font: FontExport) {
        self.new_fonts.push(font);
    }

    /// Record a font the page depends on.
    pub fn add_dependency(&mut self, font_id: &str) {
        self.dependencies.insert(font_id.to_string());
    }

    /// Mark the list complete.
    pub fn flush(&mut self) {
        self.flushed = true;
    }

    /// True once [`OperatorList::flush`] was called.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Operations in order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Fonts announced while building this list.
    pub fn new_fonts(&self) -> &[FontExport] {
        &self.new_fonts
    }

    /// Identifiers of every font the list uses.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|s| s.as_str())
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if no operation was recorded.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
