//! Graphics state tracked while a page's operator list is interpreted.
//!
//! The state holds the transform, text parameters, paint and stroke style
//! that the canvas needs to turn drawing intent into primitives. Saving and
//! restoring push and pop whole copies of it.

use crate::content::colorspace::Rgb;
use crate::content::pattern::PatternIr;

/// A 2D transformation matrix.
///
/// PDF uses matrices of the form:
/// ```text
/// [ a  b  0 ]
/// [ c  d  0 ]
/// [ e  f  1 ]
/// ```
///
/// Where (a,b,c,d) define scaling/rotation/skewing and (e,f) define translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Horizontal scaling component
    pub a: f64,
    /// Rotation/skew component
    pub b: f64,
    /// Rotation/skew component
    pub c: f64,
    /// Vertical scaling component
    pub d: f64,
    /// Horizontal translation
    pub e: f64,
    /// Vertical translation
    pub f: f64,
}

impl Matrix {
    /// Build a matrix from its six components.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Create an identity matrix.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_primitives::content::Matrix;
    ///
    /// let m = Matrix::identity();
    /// assert_eq!(m.transform_point(3.0, 4.0), (3.0, 4.0));
    /// ```
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Create a translation matrix.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Create a scaling matrix.
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Read a matrix from the first six numbers of a slice.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [a, b, c, d, e, f, ..] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    /// Multiply this matrix by another.
    ///
    /// `self.multiply(&other)` applies `self` first, then `other`. Setting a
    /// new CTM with `cm` is therefore `m.multiply(&ctm)`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform a point.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Transform a distance vector (translation ignored).
    pub fn transform_vector(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }

    /// Get the determinant of this matrix.
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// All six components are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Scale factor applied to lengths, taken as the mean of the two axis
    /// scales. Used for stroke widths.
    pub fn mean_scale(&self) -> f64 {
        let sx = (self.a * self.a + self.b * self.b).sqrt();
        let sy = (self.c * self.c + self.d * self.d).sqrt();
        (sx + sy) / 2.0
    }

    /// Components as an array, in `a b c d e f` order.
    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// A paint source for fills or strokes.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// Solid colour
    Color(Rgb),
    /// Pattern, with its placement already composed against the base transform
    Pattern {
        /// Resolved pattern
        pattern: PatternIr,
        /// Pattern space to device space
        placement: Matrix,
    },
}

impl Paint {
    /// The colour a primitive painted with this source is reported in.
    pub fn representative(&self) -> Rgb {
        match self {
            Paint::Color(rgb) => *rgb,
            Paint::Pattern { pattern, .. } => pattern.representative_color(),
        }
    }
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Color([0, 0, 0])
    }
}

/// Graphics state parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    /// Current transformation matrix
    pub ctm: Matrix,
    /// Text matrix (Tm)
    pub text_matrix: Matrix,
    /// Text line matrix
    pub text_line_matrix: Matrix,
    /// Character spacing (Tc)
    pub char_space: f64,
    /// Word spacing (Tw)
    pub word_space: f64,
    /// Horizontal scaling in percent (Tz)
    pub horizontal_scaling: f64,
    /// Leading (TL)
    pub leading: f64,
    /// Identifier of the selected font
    pub font_id: Option<String>,
    /// Font size (Tf)
    pub font_size: f64,
    /// Text rise (Ts)
    pub text_rise: f64,
    /// Text rendering mode (Tr)
    pub render_mode: i64,
    /// Fill paint
    pub fill: Paint,
    /// Stroke paint
    pub stroke: Paint,
    /// A fill colour or pattern was set explicitly
    pub fill_set: bool,
    /// A stroke colour or pattern was set explicitly
    pub stroke_set: bool,
    /// Line width (w)
    pub line_width: f64,
    /// A non-empty dash array is in effect
    pub dashed: bool,
    /// Line cap style (J)
    pub line_cap: i64,
    /// Line join style (j)
    pub line_join: i64,
    /// Miter limit (M)
    pub miter_limit: f64,
}

impl GraphicsState {
    /// Create a new graphics state with default values.
    pub fn new() -> Self {
        Self {
            ctm: Matrix::identity(),
            text_matrix: Matrix::identity(),
            text_line_matrix: Matrix::identity(),
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            font_id: None,
            font_size: 12.0,
            text_rise: 0.0,
            render_mode: 0,
            fill: Paint::default(),
            stroke: Paint::default(),
            fill_set: false,
            stroke_set: false,
            line_width: 1.0,
            dashed: false,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Stack of graphics states for save/restore operations.
///
/// The current state lives outside the saved list so the stack can never be
/// empty.
#[derive(Debug, Clone, Default)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl GraphicsStateStack {
    /// Create a stack holding one default state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack whose initial state uses `ctm`.
    pub fn with_ctm(ctm: Matrix) -> Self {
        let mut stack = Self::new();
        stack.current.ctm = ctm;
        stack
    }

    /// Current graphics state.
    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    /// Mutable access to the current graphics state.
    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    /// Save the current state (q).
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Restore the last saved state (Q). Returns false when nothing was saved,
    /// in which case the current state is kept.
    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            },
            None => false,
        }
    }

    /// Number of saved states.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Restore until at most `depth` states remain saved.
    pub fn unwind_to(&mut self, depth: usize) -> usize {
        let mut unwound = 0;
        while self.saved.len() > depth && self.restore() {
            unwound += 1;
        }
        unwound
    }
}
