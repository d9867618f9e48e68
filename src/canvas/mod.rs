//! Virtual canvas: executes an operator list and emits primitives.
//!
//! Paths are built in page space as they are constructed, the same way a
//! renderer would. Painting operators then reduce the path to what the
//! primitive model can describe:
//!
//! - stroked straight segments that are horizontal or vertical become
//!   [`Line`]s;
//! - filled paths become the [`Fill`] of their bounding box;
//! - every text-show operation becomes one [`TextRun`].
//!
//! Thin or tiny geometry is filtered according to [`CanvasConfig`].

pub mod palette;
pub mod primitives;

pub use palette::Palette;
pub use primitives::{Fill, Line, Orientation, PagePrimitives, PaintColor, PatternInfo, PrimitiveSink, TextRun};

use crate::config::CanvasConfig;
use crate::content::colorspace::Rgb;
use crate::content::graphics_state::{GraphicsStateStack, Matrix, Paint};
use crate::content::operators::{Operation, OperatorList, PaintOp, TextItem};
use crate::content::pattern::PatternIr;

/// Part of a path, in page space.
#[derive(Debug, Clone, Copy)]
enum Segment {
    Straight((f64, f64), (f64, f64)),
    Curve,
}

#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<Segment>,
    points: Vec<(f64, f64)>,
    current: Option<(f64, f64)>,
    start: Option<(f64, f64)>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f64, f64)) {
        self.points.push(p);
        self.current = Some(p);
        self.start = Some(p);
    }

    fn line_to(&mut self, p: (f64, f64)) {
        match self.current {
            Some(from) => self.segments.push(Segment::Straight(from, p)),
            None => self.start = Some(p),
        }
        self.points.push(p);
        self.current = Some(p);
    }

    fn curve_to(&mut self, control: [(f64, f64); 3]) {
        if self.current.is_none() {
            self.start = Some(control[0]);
        }
        self.points.extend_from_slice(&control);
        self.segments.push(Segment::Curve);
        self.current = Some(control[2]);
    }

    fn close(&mut self) {
        if let (Some(from), Some(to)) = (self.current, self.start) {
            if from != to {
                self.segments.push(Segment::Straight(from, to));
            }
            self.current = Some(to);
        }
    }

    fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        let init = (first.0, first.1, first.0, first.1);
        Some(self.points.iter().fold(init, |(x0, y0, x1, y1), &(x, y)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        }))
    }

    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn clear(&mut self) {
        *self = PathBuilder::default();
    }
}

/// Executes operations against a graphics state stack.
pub struct VirtualCanvas<'a> {
    config: &'a CanvasConfig,
    sink: &'a mut dyn PrimitiveSink,
    states: GraphicsStateStack,
    base_transforms: Vec<Matrix>,
    form_depths: Vec<usize>,
    path: PathBuilder,
    pending_clip: bool,
}

impl<'a> VirtualCanvas<'a> {
    /// Canvas with an identity base transform.
    pub fn new(sink: &'a mut dyn PrimitiveSink, config: &'a CanvasConfig) -> Self {
        Self::with_base_transform(sink, config, Matrix::identity())
    }

    /// Canvas whose page space is mapped through `base`.
    pub fn with_base_transform(sink: &'a mut dyn PrimitiveSink, config: &'a CanvasConfig, base: Matrix) -> Self {
        Self {
            config,
            sink,
            states: GraphicsStateStack::with_ctm(base),
            base_transforms: vec![base],
            form_depths: Vec::new(),
            path: PathBuilder::default(),
            pending_clip: false,
        }
    }

    /// Execute every operation of `list` in order.
    pub fn execute(&mut self, list: &OperatorList) {
        for op in list.operations() {
            self.execute_op(op);
        }
        if self.states.depth() > 0 {
            log::debug!("{} saved states left at the end of the page", self.states.depth());
        }
    }

    /// Execute one operation.
    pub fn execute_op(&mut self, op: &Operation) {
        match op {
            Operation::Save => self.states.save(),
            Operation::Restore => {
                // The save made by BeginForm belongs to the form bracket
                let floor = self.form_depths.last().map_or(0, |depth| depth + 1);
                if self.states.depth() <= floor || !self.states.restore() {
                    log::warn!("Restore without a saved state");
                }
            },
            Operation::Transform(m) => {
                let ctm = m.multiply(&self.states.current().ctm);
                self.set_ctm(ctm);
            },
            Operation::SetLineWidth(w) => self.states.current_mut().line_width = *w,
            Operation::SetLineCap(cap) => self.states.current_mut().line_cap = *cap,
            Operation::SetLineJoin(join) => self.states.current_mut().line_join = *join,
            Operation::SetMiterLimit(limit) => self.states.current_mut().miter_limit = *limit,
            Operation::SetDash { array, .. } => {
                self.states.current_mut().dashed = array.iter().any(|v| *v > 0.0);
            },
            Operation::SetFillRgb(rgb) => self.set_fill(Paint::Color(*rgb)),
            Operation::SetStrokeRgb(rgb) => self.set_stroke(Paint::Color(*rgb)),
            Operation::SetFillPattern(ir) => {
                let paint = self.place_pattern(ir);
                self.set_fill(paint);
            },
            Operation::SetStrokePattern(ir) => {
                let paint = self.place_pattern(ir);
                self.set_stroke(paint);
            },

            Operation::MoveTo(x, y) => {
                let p = self.to_page(*x, *y);
                self.path.move_to(p);
            },
            Operation::LineTo(x, y) => {
                let p = self.to_page(*x, *y);
                self.path.line_to(p);
            },
            Operation::CurveTo([x1, y1, x2, y2, x3, y3]) => {
                let control = [self.to_page(*x1, *y1), self.to_page(*x2, *y2), self.to_page(*x3, *y3)];
                self.path.curve_to(control);
            },
            Operation::Rectangle { x, y, width, height } => {
                let (x, y, w, h) = (*x, *y, *width, *height);
                let corners = [
                    self.to_page(x, y),
                    self.to_page(x + w, y),
                    self.to_page(x + w, y + h),
                    self.to_page(x, y + h),
                ];
                self.path.move_to(corners[0]);
                for corner in &corners[1..] {
                    self.path.line_to(*corner);
                }
                self.path.close();
            },
            Operation::ClosePath => self.path.close(),
            Operation::Paint(paint) => self.paint_path(*paint),
            Operation::Clip { even_odd } => {
                log::trace!("Clip (even-odd: {})", even_odd);
                self.pending_clip = true;
            },

            Operation::BeginText => {
                let state = self.states.current_mut();
                state.text_matrix = Matrix::identity();
                state.text_line_matrix = Matrix::identity();
            },
            Operation::EndText => {},
            Operation::SetCharSpacing(v) => self.states.current_mut().char_space = *v,
            Operation::SetWordSpacing(v) => self.states.current_mut().word_space = *v,
            Operation::SetHorizontalScaling(v) => self.states.current_mut().horizontal_scaling = *v,
            Operation::SetLeading(v) => self.states.current_mut().leading = *v,
            Operation::SetFont { font_id, size } => {
                let state = self.states.current_mut();
                state.font_id = Some(font_id.clone());
                state.font_size = *size;
            },
            Operation::SetRenderMode(mode) => self.states.current_mut().render_mode = *mode,
            Operation::SetTextRise(v) => self.states.current_mut().text_rise = *v,
            Operation::MoveText(tx, ty) => self.move_text(*tx, *ty),
            Operation::SetLeadingMoveText(tx, ty) => {
                self.states.current_mut().leading = -*ty;
                self.move_text(*tx, *ty);
            },
            Operation::SetTextMatrix(m) => {
                if !m.is_finite() {
                    log::warn!("Rejecting non-finite text matrix {:?}", m);
                    return;
                }
                let state = self.states.current_mut();
                state.text_matrix = *m;
                state.text_line_matrix = *m;
            },
            Operation::NextLine => {
                let leading = self.states.current().leading;
                self.move_text(0.0, -leading);
            },
            Operation::ShowText(items) => self.show_text(items),

            Operation::BeginForm { matrix, bbox } => {
                log::trace!("Begin form, bbox {:?}", bbox);
                self.form_depths.push(self.states.depth());
                self.states.save();
                let ctm = matrix.multiply(&self.states.current().ctm);
                self.set_ctm(ctm);
                self.base_transforms.push(self.states.current().ctm);
            },
            Operation::EndForm => {
                let Some(depth) = self.form_depths.pop() else {
                    log::warn!("End of form without a beginning");
                    return;
                };
                let unwound = self.states.unwind_to(depth);
                if unwound > 1 {
                    log::debug!("Form left {} unbalanced saves", unwound - 1);
                }
                self.base_transforms.pop();
            },
            Operation::ShadingFill(ir) => self.shading_fill(ir),
            Operation::PaintImage { inline } => {
                log::debug!("Image ({}) not converted to primitives", if *inline { "inline" } else { "XObject" });
            },
        }
    }

    fn set_ctm(&mut self, ctm: Matrix) {
        if !ctm.is_finite() {
            log::warn!("Rejecting non-finite transform {:?}", ctm);
            return;
        }
        self.states.current_mut().ctm = ctm;
    }

    fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        self.states.current().ctm.transform_point(x, y)
    }

    fn base_transform(&self) -> Matrix {
        self.base_transforms.last().copied().unwrap_or_default()
    }

    /// Patterns live in the space of the page (or the form being painted),
    /// not of the current transform.
    fn place_pattern(&self, ir: &PatternIr) -> Paint {
        Paint::Pattern {
            pattern: ir.clone(),
            placement: ir.matrix().multiply(&self.base_transform()),
        }
    }

    fn color(&self, rgb: Rgb) -> PaintColor {
        self.config.palette.lookup(rgb)
    }

    fn paint_path(&mut self, op: PaintOp) {
        let clip = std::mem::take(&mut self.pending_clip);
        if op.closes() {
            self.path.close();
        }
        if !self.path.is_empty() {
            if op.fills() {
                self.emit_fill(clip);
            }
            if op.strokes() {
                self.emit_strokes(clip);
            }
        }
        self.path.clear();
    }

    fn set_fill(&mut self, paint: Paint) {
        let state = self.states.current_mut();
        state.fill = paint;
        state.fill_set = true;
    }

    fn set_stroke(&mut self, paint: Paint) {
        let state = self.states.current_mut();
        state.stroke = paint;
        state.stroke_set = true;
    }

    /// Paint used for filled areas. A page that only ever chose a stroke
    /// colour fills with it instead of the initial black.
    fn fill_paint(&self) -> Paint {
        let state = self.states.current();
        if !state.fill_set && state.stroke_set {
            state.stroke.clone()
        } else {
            state.fill.clone()
        }
    }

    fn emit_fill(&mut self, clip: bool) {
        let Some((x0, y0, x1, y1)) = self.path.bounds() else {
            return;
        };
        let (width, height) = (x1 - x0, y1 - y0);
        let min = self.config.min_fill_size;
        let paint = self.fill_paint();
        let color = self.color(paint.representative());

        if width < min && height < min {
            log::trace!("Dropping {}x{} fill", width, height);
            return;
        }
        if height < min {
            self.emit_line(x0, y0 + height / 2.0, width, height, Orientation::Horizontal, color, false, clip);
            return;
        }
        if width < min {
            self.emit_line(x0 + width / 2.0, y0, height, width, Orientation::Vertical, color, false, clip);
            return;
        }

        let pattern = match &paint {
            Paint::Pattern { pattern, placement } => Some(PatternInfo {
                kind: pattern.kind().to_string(),
                matrix: placement.to_array(),
            }),
            Paint::Color(_) => None,
        };
        self.sink.fill(Fill {
            x: x0,
            y: y0,
            width,
            height,
            color,
            pattern,
            clip,
        });
    }

    fn emit_strokes(&mut self, clip: bool) {
        let state = self.states.current();
        let width = state.line_width * state.ctm.mean_scale();
        let dashed = state.dashed;
        let color = self.color(state.stroke.representative());
        let tolerance = self.config.axis_tolerance;

        let segments = std::mem::take(&mut self.path.segments);
        for segment in &segments {
            let Segment::Straight((ax, ay), (bx, by)) = *segment else {
                continue;
            };
            let (dx, dy) = ((bx - ax).abs(), (by - ay).abs());
            if dy <= tolerance && dx > tolerance {
                self.emit_line(ax.min(bx), ay, dx, width, Orientation::Horizontal, color.clone(), dashed, clip);
            } else if dx <= tolerance && dy > tolerance {
                self.emit_line(ax, ay.min(by), dy, width, Orientation::Vertical, color.clone(), dashed, clip);
            }
        }
        self.path.segments = segments;
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_line(
        &mut self,
        x: f64,
        y: f64,
        length: f64,
        width: f64,
        orientation: Orientation,
        color: PaintColor,
        dashed: bool,
        clip: bool,
    ) {
        if !self.config.keeps_line(length, width) {
            log::trace!("Dropping line of length {} and width {}", length, width);
            return;
        }
        self.sink.line(Line {
            x,
            y,
            length,
            width,
            orientation,
            color,
            dashed,
            clip,
        });
    }

    fn shading_fill(&mut self, ir: &PatternIr) {
        let PatternIr::Shading { bbox: Some([bx0, by0, bx1, by1]), .. } = ir else {
            log::debug!("Shading without a bounding box not converted");
            return;
        };
        let corners = [
            self.to_page(*bx0, *by0),
            self.to_page(*bx1, *by0),
            self.to_page(*bx1, *by1),
            self.to_page(*bx0, *by1),
        ];
        self.path.clear();
        self.path.move_to(corners[0]);
        for corner in &corners[1..] {
            self.path.line_to(*corner);
        }
        let saved = {
            let state = self.states.current();
            (state.fill.clone(), state.fill_set)
        };
        let paint = self.place_pattern(ir);
        self.set_fill(paint);
        self.emit_fill(false);
        let state = self.states.current_mut();
        (state.fill, state.fill_set) = saved;
        self.path.clear();
    }

    fn move_text(&mut self, tx: f64, ty: f64) {
        let state = self.states.current_mut();
        let line = Matrix::translation(tx, ty).multiply(&state.text_line_matrix);
        state.text_line_matrix = line;
        state.text_matrix = line;
    }

    fn show_text(&mut self, items: &[TextItem]) {
        let state = self.states.current();
        let render = state.text_matrix.multiply(&state.ctm);
        let (x, y) = render.transform_point(0.0, state.text_rise);
        let size = state.font_size * (render.c * render.c + render.d * render.d).sqrt();
        let h_scale = state.horizontal_scaling / 100.0;

        let mut text = String::new();
        let mut advance = 0.0;
        let mut first_glyph = true;
        for item in items {
            match item {
                TextItem::Glyph(glyph) => {
                    let mut tx = glyph.width * state.font_size + state.char_space;
                    if first_glyph && glyph.is_space {
                        tx += state.word_space;
                    }
                    advance += tx * h_scale;
                    text.push_str(&glyph.unicode);
                    first_glyph = false;
                },
                TextItem::Adjust(adjust) => advance -= adjust / 1000.0 * state.font_size * h_scale,
                TextItem::WordBreak => {
                    if !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                },
            }
        }

        let mode = state.render_mode;
        let fill = matches!(mode, 0 | 2 | 4 | 6);
        let stroke = matches!(mode, 1 | 2 | 5 | 6);
        let paint = if !fill && stroke { &state.stroke } else { &state.fill };
        let run = TextRun {
            text,
            x,
            y,
            size,
            horizontal_scale: state.horizontal_scaling,
            font_id: state.font_id.clone().unwrap_or_default(),
            color: self.color(paint.representative()),
            fill,
            stroke,
            clip: mode >= 4,
        };

        let state = self.states.current_mut();
        state.text_matrix = Matrix::translation(advance, 0.0).multiply(&state.text_matrix);

        if run.text.is_empty() {
            log::trace!("Empty text run skipped");
            return;
        }
        self.sink.text(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::operators::Glyph;

    fn run(ops: Vec<Operation>) -> PagePrimitives {
        run_with(ops, &CanvasConfig::default())
    }

    fn run_with(ops: Vec<Operation>, config: &CanvasConfig) -> PagePrimitives {
        let mut page = PagePrimitives::default();
        let mut list = OperatorList::new();
        for op in ops {
            list.push(op);
        }
        VirtualCanvas::new(&mut page, config).execute(&list);
        page
    }

    fn rect(x: f64, y: f64, width: f64, height: f64) -> Operation {
        Operation::Rectangle { x, y, width, height }
    }

    fn glyph(c: char, width: f64) -> TextItem {
        TextItem::Glyph(Glyph {
            code: c as u32,
            unicode: c.to_string(),
            width,
            is_space: c == ' ',
        })
    }

    // ========================================================================
    // Fills
    // ========================================================================

    #[test]
    fn test_fill_reports_bounding_box() {
        let page = run(vec![
            Operation::SetFillRgb([255, 0, 0]),
            rect(10.0, 10.0, 100.0, 20.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert_eq!(page.fills.len(), 1);
        let fill = &page.fills[0];
        assert_eq!((fill.x, fill.y, fill.width, fill.height), (10.0, 10.0, 100.0, 20.0));
        assert_eq!(fill.color, PaintColor::Palette(24));
    }

    #[test]
    fn test_fill_size_thresholds() {
        // Both sides at the minimum: kept
        assert_eq!(run(vec![rect(0.0, 0.0, 2.0, 2.0), Operation::Paint(PaintOp::Fill)]).fills.len(), 1);
        // Both sides below: dropped
        let page = run(vec![rect(0.0, 0.0, 1.9, 1.9), Operation::Paint(PaintOp::Fill)]);
        assert!(page.is_empty());
    }

    #[test]
    fn test_thin_fill_becomes_line() {
        let page = run(vec![rect(10.0, 10.0, 100.0, 1.0), Operation::Paint(PaintOp::Fill)]);
        assert!(page.fills.is_empty());
        assert_eq!(page.lines.len(), 1);
        let line = &page.lines[0];
        assert_eq!(line.orientation, Orientation::Horizontal);
        assert_eq!((line.x, line.y, line.length, line.width), (10.0, 10.5, 100.0, 1.0));

        let page = run(vec![rect(10.0, 10.0, 1.0, 50.0), Operation::Paint(PaintOp::Fill)]);
        assert_eq!(page.lines[0].orientation, Orientation::Vertical);
        assert_eq!(page.lines[0].length, 50.0);
    }

    #[test]
    fn test_thin_short_fill_is_dropped_by_line_filter() {
        // 3 x 1: length/width = 3 < 4 and width 1 < 4
        let page = run(vec![rect(0.0, 0.0, 3.0, 1.0), Operation::Paint(PaintOp::Fill)]);
        assert!(page.is_empty());
    }

    #[test]
    fn test_fill_uses_transformed_coordinates() {
        let page = run(vec![
            Operation::Transform(Matrix::new(2.0, 0.0, 0.0, 2.0, 5.0, 5.0)),
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        let fill = &page.fills[0];
        assert_eq!((fill.x, fill.y, fill.width, fill.height), (5.0, 5.0, 20.0, 20.0));
    }

    #[test]
    fn test_fill_of_curve_uses_control_points() {
        let page = run(vec![
            Operation::MoveTo(0.0, 0.0),
            Operation::CurveTo([0.0, 10.0, 10.0, 10.0, 10.0, 0.0]),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert_eq!(page.fills[0].height, 10.0);
    }

    // ========================================================================
    // Strokes
    // ========================================================================

    #[test]
    fn test_stroked_rectangle_gives_four_lines() {
        let page = run(vec![
            Operation::SetLineWidth(1.0),
            rect(0.0, 0.0, 100.0, 50.0),
            Operation::Paint(PaintOp::Stroke),
        ]);
        assert_eq!(page.lines.len(), 4);
        let horizontal = page.lines.iter().filter(|l| l.orientation == Orientation::Horizontal).count();
        assert_eq!(horizontal, 2);
        assert!(page.fills.is_empty());
    }

    #[test]
    fn test_diagonal_segments_are_not_lines() {
        let page = run(vec![
            Operation::MoveTo(0.0, 0.0),
            Operation::LineTo(50.0, 50.0),
            Operation::Paint(PaintOp::Stroke),
        ]);
        assert!(page.is_empty());
    }

    #[test]
    fn test_line_threshold_both_sides() {
        let stroke = |length: f64, width: f64| {
            run(vec![
                Operation::SetLineWidth(width),
                Operation::MoveTo(0.0, 0.0),
                Operation::LineTo(length, 0.0),
                Operation::Paint(PaintOp::Stroke),
            ])
            .lines
            .len()
        };
        // L/W exactly 4: kept
        assert_eq!(stroke(8.0, 2.0), 1);
        // L/W just below 4 with a thin stroke: dropped
        assert_eq!(stroke(7.9, 2.0), 0);
        // Width exactly 4: kept even when short
        assert_eq!(stroke(4.0, 4.0), 1);
        // Width just below 4 and short: dropped
        assert_eq!(stroke(3.0, 3.9), 0);
    }

    #[test]
    fn test_dash_and_colour_recorded() {
        let page = run(vec![
            Operation::SetStrokeRgb([1, 2, 3]),
            Operation::SetDash { array: vec![3.0, 1.0], phase: 0.0 },
            Operation::MoveTo(0.0, 0.0),
            Operation::LineTo(0.0, 40.0),
            Operation::Paint(PaintOp::Stroke),
        ]);
        let line = &page.lines[0];
        assert!(line.dashed);
        assert_eq!(line.color, PaintColor::Rgb("#010203".to_string()));
        assert_eq!(line.orientation, Orientation::Vertical);
    }

    #[test]
    fn test_clip_flag_applies_to_next_paint() {
        let page = run(vec![
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Clip { even_odd: false },
            Operation::Paint(PaintOp::Fill),
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert!(page.fills[0].clip);
        assert!(!page.fills[1].clip);
    }

    #[test]
    fn test_end_path_emits_nothing() {
        let page = run(vec![
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Clip { even_odd: true },
            Operation::Paint(PaintOp::EndPath),
        ]);
        assert!(page.is_empty());
    }

    // ========================================================================
    // State and forms
    // ========================================================================

    #[test]
    fn test_non_finite_transform_rejected() {
        let page = run(vec![
            Operation::Transform(Matrix::new(f64::NAN, 0.0, 0.0, 1.0, 0.0, 0.0)),
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert_eq!(page.fills[0].width, 10.0);
    }

    #[test]
    fn test_restore_reverts_colour() {
        let page = run(vec![
            Operation::Save,
            Operation::SetFillRgb([255, 0, 0]),
            Operation::Restore,
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert_eq!(page.fills[0].color, PaintColor::Palette(0));
    }

    #[test]
    fn test_form_unwinds_unbalanced_saves() {
        let page = run(vec![
            Operation::BeginForm {
                matrix: Matrix::translation(100.0, 0.0),
                bbox: None,
            },
            Operation::Save,
            Operation::Save,
            Operation::SetFillRgb([255, 0, 0]),
            Operation::EndForm,
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        let fill = &page.fills[0];
        assert_eq!(fill.x, 0.0);
        assert_eq!(fill.color, PaintColor::Palette(0));
    }

    #[test]
    fn test_extra_restore_in_form_keeps_outer_state() {
        let page = run(vec![
            Operation::Save,
            Operation::SetFillRgb([255, 0, 0]),
            Operation::Save,
            Operation::BeginForm {
                matrix: Matrix::identity(),
                bbox: None,
            },
            Operation::Restore,
            Operation::Restore,
            Operation::Restore,
            Operation::EndForm,
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
            Operation::Restore,
            Operation::Restore,
        ]);
        assert_eq!(page.fills[0].color, PaintColor::Palette(24));
    }

    #[test]
    fn test_fill_uses_stroke_colour_when_only_stroke_set() {
        let page = run(vec![
            Operation::SetStrokeRgb([255, 0, 0]),
            rect(10.0, 10.0, 100.0, 2.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert_eq!(page.fills[0].color, PaintColor::Palette(24));

        // An explicit fill colour wins, even black
        let page = run(vec![
            Operation::SetStrokeRgb([255, 0, 0]),
            Operation::SetFillRgb([0, 0, 0]),
            rect(10.0, 10.0, 100.0, 2.0),
            Operation::Paint(PaintOp::Fill),
        ]);
        assert_eq!(page.fills[0].color, PaintColor::Palette(0));
    }

    #[test]
    fn test_pattern_placed_against_base_transform() {
        let pattern = PatternIr::Tiling {
            paint_type: 1,
            tiling_type: 1,
            bbox: [0.0, 0.0, 10.0, 10.0],
            x_step: 10.0,
            y_step: 10.0,
            matrix: Matrix::translation(1.0, 1.0),
            color: [0, 0, 0],
        };
        let page = run(vec![
            Operation::Transform(Matrix::scaling(3.0, 3.0)),
            Operation::SetFillPattern(pattern.clone()),
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
            Operation::BeginForm {
                matrix: Matrix::translation(50.0, 0.0),
                bbox: None,
            },
            Operation::SetFillPattern(pattern),
            rect(0.0, 0.0, 10.0, 10.0),
            Operation::Paint(PaintOp::Fill),
            Operation::EndForm,
        ]);
        let first = page.fills[0].pattern.as_ref().unwrap();
        assert_eq!(first.kind, "tiling");
        // The page transform is not applied to the pattern
        assert_eq!(first.matrix, [1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        // Inside the form, the form's space is the base
        let second = page.fills[1].pattern.as_ref().unwrap();
        assert_eq!(second.matrix, [3.0, 0.0, 0.0, 3.0, 153.0, 3.0]);
    }

    // ========================================================================
    // Text
    // ========================================================================

    #[test]
    fn test_text_run_position_and_size() {
        let page = run(vec![
            Operation::BeginText,
            Operation::SetFont { font_id: "font_1_0".to_string(), size: 12.0 },
            Operation::MoveText(72.0, 700.0),
            Operation::ShowText(vec![glyph('H', 0.722), glyph('i', 0.222)]),
            Operation::EndText,
        ]);
        assert_eq!(page.texts.len(), 1);
        let text = &page.texts[0];
        assert_eq!(text.text, "Hi");
        assert_eq!((text.x, text.y), (72.0, 700.0));
        assert_eq!(text.size, 12.0);
        assert_eq!(text.font_id, "font_1_0");
        assert!(text.fill && !text.stroke);
    }

    #[test]
    fn test_consecutive_runs_advance() {
        let page = run(vec![
            Operation::BeginText,
            Operation::SetFont { font_id: "f".to_string(), size: 10.0 },
            Operation::ShowText(vec![glyph('a', 0.5), TextItem::Adjust(-1000.0)]),
            Operation::ShowText(vec![glyph('b', 0.5)]),
        ]);
        // 0.5 * 10 for the glyph plus 1000/1000 * 10 for the adjustment
        assert!((page.texts[1].x - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_spacing_only_for_leading_space() {
        let page = run(vec![
            Operation::BeginText,
            Operation::SetFont { font_id: "f".to_string(), size: 10.0 },
            Operation::SetWordSpacing(5.0),
            Operation::ShowText(vec![glyph('a', 0.5), glyph(' ', 0.25)]),
            Operation::ShowText(vec![glyph(' ', 0.25), glyph('b', 0.5)]),
            Operation::ShowText(vec![glyph('c', 0.5)]),
        ]);
        // First run: 5 + 2.5, no word spacing
        assert!((page.texts[1].x - 7.5).abs() < 1e-9);
        // Second run: 2.5 + 5 (word spacing) + 5
        assert!((page.texts[2].x - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_break_inserts_space() {
        let page = run(vec![
            Operation::BeginText,
            Operation::ShowText(vec![glyph('a', 0.5), TextItem::Adjust(-300.0), TextItem::WordBreak, glyph('b', 0.5)]),
        ]);
        assert_eq!(page.texts[0].text, "a b");
    }

    #[test]
    fn test_render_modes() {
        let mode = |m: i64| {
            let page = run(vec![
                Operation::BeginText,
                Operation::SetStrokeRgb([255, 0, 0]),
                Operation::SetRenderMode(m),
                Operation::ShowText(vec![glyph('x', 0.5)]),
            ]);
            page.texts[0].clone()
        };
        let invisible = mode(3);
        assert!(!invisible.fill && !invisible.stroke && !invisible.clip);
        let stroked = mode(1);
        assert!(stroked.stroke && !stroked.fill);
        assert_eq!(stroked.color, PaintColor::Palette(24));
        assert!(mode(7).clip);
    }

    #[test]
    fn test_next_line_uses_leading() {
        let page = run(vec![
            Operation::BeginText,
            Operation::SetLeadingMoveText(10.0, -14.0),
            Operation::ShowText(vec![glyph('a', 0.5)]),
            Operation::NextLine,
            Operation::ShowText(vec![glyph('b', 0.5)]),
        ]);
        assert_eq!((page.texts[0].x, page.texts[0].y), (10.0, -14.0));
        assert_eq!((page.texts[1].x, page.texts[1].y), (10.0, -28.0));
    }
}
