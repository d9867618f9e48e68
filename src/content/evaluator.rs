//! Content evaluator.
//!
//! Reads a content stream with the content-operator symbol table and turns
//! it into an [`OperatorList`]:
//!
//! - operand counts are checked against the static [`OpCode`] table; short
//!   operators are skipped, long ones keep their last operands;
//! - `Tf` binds a font through the document's [`FontCache`] and string
//!   operands are mapped to glyphs immediately, while the font is known;
//! - colour operators are converted to RGB in the active colour space;
//! - pattern and shading operands are replaced by a [`PatternIr`];
//! - `gs` is expanded into the individual operations it stands for;
//! - form XObjects are inlined between `BeginForm` / `EndForm`.
//!
//! Forms are evaluated through an explicit frame stack, so nesting depth is
//! bounded by [`ParserOptions::max_form_depth`] rather than the call stack,
//! and a form that (directly or not) paints itself is skipped.

use crate::content::colorspace::ColorSpace;
use crate::content::graphics_state::Matrix;
use crate::content::operators::{
    Arity, OpCode, Operation, OperatorList, PaintOp, TextItem, CONTENT_SYMBOLS,
};
use crate::content::pattern::{pattern_ir, shading_ir, PatternIr};
use crate::error::{Error, Result};
use crate::fonts::{Font, FontCache};
use crate::lexer::Lexer;
use crate::object::{Dictionary, Object, ObjectRef, Resolve, Stream};
use crate::object_loader::{ObjectLoader, RESOURCE_KEYS};
use crate::parser::Parser;
use crate::parser_config::ParserOptions;
use crate::source::ByteSource;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

/// Evaluator-side state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct EvalState {
    font: Option<Arc<Font>>,
    fill_cs: ColorSpace,
    stroke_cs: ColorSpace,
}

impl Default for EvalState {
    fn default() -> Self {
        Self {
            font: None,
            fill_cs: ColorSpace::Gray,
            stroke_cs: ColorSpace::Gray,
        }
    }
}

/// A content stream being read.
struct Frame<'a> {
    parser: Parser<'a>,
    resources: Option<Rc<Dictionary>>,
    form: Option<FormMark>,
}

/// Bookkeeping for an inlined form.
struct FormMark {
    key: Option<ObjectRef>,
    state_depth: usize,
}

/// A `Do` that named a form XObject.
struct PendingForm {
    key: Option<ObjectRef>,
    stream: Stream,
}

/// Builds operator lists for pages (and the forms they paint).
pub struct Evaluator<'a> {
    resolver: &'a dyn Resolve,
    fonts: &'a mut FontCache,
    options: ParserOptions,
    state: EvalState,
    saved: Vec<EvalState>,
    /// Saved-state depth each open form started from; `Q` never pops below it
    state_floors: Vec<usize>,
    compat_depth: usize,
    default_font: Option<Arc<Font>>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator reading objects through `resolver` and sharing
    /// `fonts` with every other page of the document.
    pub fn new(resolver: &'a dyn Resolve, fonts: &'a mut FontCache, options: ParserOptions) -> Self {
        Self {
            resolver,
            fonts,
            options,
            state: EvalState::default(),
            saved: Vec::new(),
            state_floors: Vec::new(),
            compat_depth: 0,
            default_font: None,
        }
    }

    /// Evaluate one content stream against its resources.
    pub fn get_operator_list(&mut self, content: ByteSource, resources: Option<&Dictionary>) -> Result<OperatorList> {
        let mut list = OperatorList::new();

        if let Some(res) = resources {
            let summary = ObjectLoader::new(self.resolver).load(res, RESOURCE_KEYS)?;
            log::debug!("Resources preloaded: {} objects ({} failed)", summary.fetched, summary.failed);
        }

        let parser = Parser::new(
            Lexer::with_known_symbols(content, &CONTENT_SYMBOLS),
            None,
            false,
            self.options,
        )?;
        let mut frames = vec![Frame {
            parser,
            resources: resources.cloned().map(Rc::new),
            form: None,
        }];
        let mut active_forms: HashSet<ObjectRef> = HashSet::new();
        let mut operands: Vec<Object> = Vec::new();

        while let Some(frame) = frames.last_mut() {
            if frame.parser.is_eof() {
                self.end_frame(&mut frames, &mut active_forms, &mut operands, &mut list);
                continue;
            }

            let offset = frame.parser.lexer_position();
            let obj = match frame.parser.get_obj() {
                Ok(obj) => obj,
                Err(e) if !self.options.strict => {
                    log::warn!("Content stream error at byte {}: {}; skipping the rest of the stream", offset, e);
                    self.end_frame(&mut frames, &mut active_forms, &mut operands, &mut list);
                    continue;
                },
                Err(e) => return Err(e),
            };

            let op = match obj {
                Object::Operator(op) => op,
                other => {
                    operands.push(other);
                    continue;
                },
            };

            let Some(code) = OpCode::from_symbol(op.as_str()) else {
                self.unknown_operator(op.as_str(), offset)?;
                operands.clear();
                continue;
            };
            let Some(args) = self.check_arity(code, &mut operands, offset)? else {
                continue;
            };

            let resources = frames.last().and_then(|f| f.resources.clone());
            if let Some(form) = self.execute(code, args, resources.as_deref(), &mut list)? {
                self.begin_form(form, resources, &mut frames, &mut active_forms, &mut list)?;
            }
        }

        list.flush();
        log::debug!("Operator list with {} operations", list.len());
        Ok(list)
    }

    fn unknown_operator(&self, symbol: &str, offset: usize) -> Result<()> {
        if self.compat_depth > 0 {
            log::trace!("Ignoring operator {} inside BX/EX", symbol);
            return Ok(());
        }
        if self.options.strict {
            return Err(Error::ParseError {
                offset,
                reason: format!("unknown operator {}", symbol),
            });
        }
        log::warn!("Unknown operator {} at byte {}", symbol, offset);
        Ok(())
    }

    /// Apply the arity table. Returns `None` when the operator must be skipped.
    fn check_arity(&self, code: OpCode, operands: &mut Vec<Object>, offset: usize) -> Result<Option<Vec<Object>>> {
        let (min, max) = match code.arity() {
            Arity::Fixed(n) => (n, n),
            Arity::Variadic(max) => (0, max),
        };
        let got = operands.len();

        if got < min || got > max {
            let reason = format!("operator {} expects {} operands, got {}", code.symbol(), max, got);
            if self.options.strict {
                return Err(Error::ParseError { offset, reason });
            }
            if got < min {
                log::warn!("Skipping {}", reason);
                operands.clear();
                return Ok(None);
            }
            log::info!("Truncating {}", reason);
            operands.drain(..got - max);
        }
        Ok(Some(std::mem::take(operands)))
    }

    fn end_frame(
        &mut self,
        frames: &mut Vec<Frame<'a>>,
        active_forms: &mut HashSet<ObjectRef>,
        operands: &mut Vec<Object>,
        list: &mut OperatorList,
    ) {
        let Some(frame) = frames.pop() else {
            return;
        };
        if !operands.is_empty() {
            log::debug!("Discarding {} operands left at the end of a content stream", operands.len());
            operands.clear();
        }
        if let Some(mark) = frame.form {
            self.state_floors.pop();
            while self.saved.len() > mark.state_depth {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            if let Some(key) = mark.key {
                active_forms.remove(&key);
            }
            list.push(Operation::EndForm);
        }
    }

    fn begin_form(
        &mut self,
        form: PendingForm,
        inherited: Option<Rc<Dictionary>>,
        frames: &mut Vec<Frame<'a>>,
        active_forms: &mut HashSet<ObjectRef>,
        list: &mut OperatorList,
    ) -> Result<()> {
        if let Some(key) = form.key {
            if active_forms.contains(&key) {
                if self.options.strict {
                    return Err(Error::CircularReference(key));
                }
                log::warn!("Form {} paints itself; skipping", key);
                return Ok(());
            }
        }
        let depth = frames.len().saturating_sub(1);
        if depth >= self.options.max_form_depth {
            if self.options.strict {
                return Err(Error::RecursionLimitExceeded(self.options.max_form_depth as u32));
            }
            log::warn!("Form nesting deeper than {}; skipping", self.options.max_form_depth);
            return Ok(());
        }

        let dict = &form.stream.dict;
        let matrix = dict
            .get("Matrix")
            .and_then(|m| m.as_number_array())
            .and_then(|v| Matrix::from_slice(&v))
            .unwrap_or_default();
        let bbox = dict.get("BBox").and_then(|b| b.as_number_array()).and_then(|v| match v[..] {
            [x0, y0, x1, y1, ..] => Some([x0, y0, x1, y1]),
            _ => None,
        });
        let resources = match dict.get_resolved("Resources", self.resolver)? {
            Some(Object::Dictionary(d)) => Some(Rc::new(d)),
            _ => inherited,
        };

        let data = match form.stream.decode_with_options(&self.options) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Form content failed to decode: {}; skipping", e);
                return Ok(());
            },
        };
        let parser = Parser::new(
            Lexer::with_known_symbols(ByteSource::new(data), &CONTENT_SYMBOLS),
            None,
            false,
            self.options,
        )?;

        list.push(Operation::BeginForm { matrix, bbox });
        let state_depth = self.saved.len();
        self.saved.push(self.state.clone());
        self.state_floors.push(self.saved.len());
        if let Some(key) = form.key {
            active_forms.insert(key);
        }
        log::trace!("Entering form {:?} at depth {}", form.key, depth + 1);
        frames.push(Frame {
            parser,
            resources,
            form: Some(FormMark { key: form.key, state_depth }),
        });
        Ok(())
    }

    /// Run one checked operator. Returns a form to inline for `Do`.
    fn execute(
        &mut self,
        code: OpCode,
        args: Vec<Object>,
        resources: Option<&Dictionary>,
        list: &mut OperatorList,
    ) -> Result<Option<PendingForm>> {
        let n = |i: usize| number(args.get(i));

        match code {
            OpCode::SetLineWidth => list.push(Operation::SetLineWidth(n(0))),
            OpCode::SetLineCap => list.push(Operation::SetLineCap(n(0) as i64)),
            OpCode::SetLineJoin => list.push(Operation::SetLineJoin(n(0) as i64)),
            OpCode::SetMiterLimit => list.push(Operation::SetMiterLimit(n(0))),
            OpCode::SetDash => list.push(Operation::SetDash {
                array: args.first().and_then(|a| a.as_number_array()).unwrap_or_default(),
                phase: n(1),
            }),
            OpCode::SetGState => self.set_gstate(args.first(), resources, list)?,
            OpCode::Save => {
                self.saved.push(self.state.clone());
                list.push(Operation::Save);
            },
            OpCode::Restore => {
                let floor = self.state_floors.last().copied().unwrap_or(0);
                if self.saved.len() <= floor {
                    log::warn!("Q without matching q");
                } else if let Some(state) = self.saved.pop() {
                    self.state = state;
                    list.push(Operation::Restore);
                }
            },
            OpCode::Transform => list.push(Operation::Transform(Matrix::new(n(0), n(1), n(2), n(3), n(4), n(5)))),

            OpCode::MoveTo => list.push(Operation::MoveTo(n(0), n(1))),
            OpCode::LineTo => list.push(Operation::LineTo(n(0), n(1))),
            OpCode::CurveTo => list.push(Operation::CurveTo([n(0), n(1), n(2), n(3), n(4), n(5)])),
            // The implicit control point of `v` is the current point, which
            // is already on the path; repeating the explicit one keeps the
            // same hull.
            OpCode::CurveTo2 => list.push(Operation::CurveTo([n(0), n(1), n(0), n(1), n(2), n(3)])),
            OpCode::CurveTo3 => list.push(Operation::CurveTo([n(0), n(1), n(2), n(3), n(2), n(3)])),
            OpCode::ClosePath => list.push(Operation::ClosePath),
            OpCode::Rectangle => list.push(Operation::Rectangle {
                x: n(0),
                y: n(1),
                width: n(2),
                height: n(3),
            }),

            OpCode::Stroke => list.push(Operation::Paint(PaintOp::Stroke)),
            OpCode::CloseStroke => list.push(Operation::Paint(PaintOp::CloseStroke)),
            OpCode::Fill | OpCode::FillCompat => list.push(Operation::Paint(PaintOp::Fill)),
            OpCode::EoFill => list.push(Operation::Paint(PaintOp::EoFill)),
            OpCode::FillStroke => list.push(Operation::Paint(PaintOp::FillStroke)),
            OpCode::EoFillStroke => list.push(Operation::Paint(PaintOp::EoFillStroke)),
            OpCode::CloseFillStroke => list.push(Operation::Paint(PaintOp::CloseFillStroke)),
            OpCode::CloseEoFillStroke => list.push(Operation::Paint(PaintOp::CloseEoFillStroke)),
            OpCode::EndPath => list.push(Operation::Paint(PaintOp::EndPath)),
            OpCode::Clip => list.push(Operation::Clip { even_odd: false }),
            OpCode::EoClip => list.push(Operation::Clip { even_odd: true }),

            OpCode::BeginText => list.push(Operation::BeginText),
            OpCode::EndText => list.push(Operation::EndText),
            OpCode::SetCharSpacing => list.push(Operation::SetCharSpacing(n(0))),
            OpCode::SetWordSpacing => list.push(Operation::SetWordSpacing(n(0))),
            OpCode::SetHScale => list.push(Operation::SetHorizontalScaling(n(0))),
            OpCode::SetLeading => list.push(Operation::SetLeading(n(0))),
            OpCode::SetFont => {
                let name = args.first().and_then(|o| o.as_name()).unwrap_or("");
                self.set_font(name, n(1), resources, list)?;
            },
            OpCode::SetTextRenderingMode => list.push(Operation::SetRenderMode(n(0) as i64)),
            OpCode::SetTextRise => list.push(Operation::SetTextRise(n(0))),
            OpCode::MoveText => list.push(Operation::MoveText(n(0), n(1))),
            OpCode::SetLeadingMoveText => list.push(Operation::SetLeadingMoveText(n(0), n(1))),
            OpCode::SetTextMatrix => {
                list.push(Operation::SetTextMatrix(Matrix::new(n(0), n(1), n(2), n(3), n(4), n(5))))
            },
            OpCode::NextLine => list.push(Operation::NextLine),
            OpCode::ShowText => {
                let items = self.show_string(args.first());
                list.push(Operation::ShowText(items));
            },
            OpCode::ShowSpacedText => {
                let items = self.show_array(args.first());
                list.push(Operation::ShowText(items));
            },
            OpCode::NextLineShowText => {
                let items = self.show_string(args.first());
                list.push(Operation::NextLine);
                list.push(Operation::ShowText(items));
            },
            OpCode::NextLineSetSpacingShowText => {
                let items = self.show_string(args.get(2));
                list.push(Operation::SetWordSpacing(n(0)));
                list.push(Operation::SetCharSpacing(n(1)));
                list.push(Operation::NextLine);
                list.push(Operation::ShowText(items));
            },
            OpCode::SetCharWidth | OpCode::SetCharWidthAndBounds => {
                log::trace!("Type3 glyph metrics operator {} ignored", code.symbol());
            },

            OpCode::SetStrokeColorSpace | OpCode::SetFillColorSpace => {
                let cs = match args.first() {
                    Some(value) => ColorSpace::parse(value, resources, self.resolver)?,
                    None => ColorSpace::Gray,
                };
                let initial = cs.initial_color();
                let is_pattern = matches!(cs, ColorSpace::Pattern(_));
                if code == OpCode::SetFillColorSpace {
                    self.state.fill_cs = cs;
                    if !is_pattern {
                        list.push(Operation::SetFillRgb(initial));
                    }
                } else {
                    self.state.stroke_cs = cs;
                    if !is_pattern {
                        list.push(Operation::SetStrokeRgb(initial));
                    }
                }
            },
            OpCode::SetFillColor | OpCode::SetFillColorN => self.set_color(true, &args, resources, list)?,
            OpCode::SetStrokeColor | OpCode::SetStrokeColorN => self.set_color(false, &args, resources, list)?,
            OpCode::SetFillGray => self.set_device_color(true, ColorSpace::Gray, &args, list),
            OpCode::SetStrokeGray => self.set_device_color(false, ColorSpace::Gray, &args, list),
            OpCode::SetFillRgb => self.set_device_color(true, ColorSpace::Rgb, &args, list),
            OpCode::SetStrokeRgb => self.set_device_color(false, ColorSpace::Rgb, &args, list),
            OpCode::SetFillCmyk => self.set_device_color(true, ColorSpace::Cmyk, &args, list),
            OpCode::SetStrokeCmyk => self.set_device_color(false, ColorSpace::Cmyk, &args, list),

            OpCode::ShadingFill => {
                let name = args.first().and_then(|o| o.as_name()).unwrap_or("");
                match lookup_resource(resources, "Shading", name, self.resolver)? {
                    Some(shading) => {
                        let ir = shading_ir(&shading, Matrix::identity(), resources, self.resolver)?;
                        list.push(Operation::ShadingFill(ir));
                    },
                    None => log::warn!("Shading /{} not found in resources", name),
                }
            },
            OpCode::BeginInlineImage | OpCode::BeginImageData => {
                log::warn!("Stray {} operator", code.symbol());
            },
            OpCode::EndInlineImage => {
                log::debug!("Inline image skipped");
                list.push(Operation::PaintImage { inline: true });
            },
            OpCode::PaintXObject => {
                let name = args.first().and_then(|o| o.as_name()).unwrap_or("");
                return self.paint_xobject(name, resources, list);
            },

            OpCode::BeginCompat => self.compat_depth += 1,
            OpCode::EndCompat => self.compat_depth = self.compat_depth.saturating_sub(1),
            OpCode::SetRenderingIntent
            | OpCode::SetFlatness
            | OpCode::MarkPoint
            | OpCode::MarkPointProps
            | OpCode::BeginMarkedContent
            | OpCode::BeginMarkedContentProps
            | OpCode::EndMarkedContent => {},
        }
        Ok(None)
    }

    fn set_font(&mut self, name: &str, size: f64, resources: Option<&Dictionary>, list: &mut OperatorList) -> Result<()> {
        let entry = match resources {
            Some(res) => match res.get_resolved("Font", self.resolver)? {
                Some(Object::Dictionary(fonts)) => fonts.get(name).cloned(),
                _ => None,
            },
            None => None,
        };
        let font = match entry {
            Some(value) => {
                let (font, first_use) = self.fonts.load(&value, self.resolver);
                if first_use {
                    list.add_font(font.export());
                }
                font
            },
            None => {
                log::warn!("Font /{} not found in resources; using the default font", name);
                self.default_font(list)
            },
        };
        list.add_dependency(font.id());
        list.push(Operation::SetFont {
            font_id: font.id().to_string(),
            size,
        });
        self.state.font = Some(font);
        Ok(())
    }

    fn default_font(&mut self, list: &mut OperatorList) -> Arc<Font> {
        if let Some(font) = &self.default_font {
            return Arc::clone(font);
        }
        let font = Arc::new(Font::fallback("font_default"));
        list.add_font(font.export());
        self.default_font = Some(Arc::clone(&font));
        font
    }

    fn active_font(&mut self) -> Arc<Font> {
        match &self.state.font {
            Some(font) => Arc::clone(font),
            None => {
                log::warn!("Text shown before any Tf; using the default font");
                // Announced by the page's first Tf fallback, if any
                Arc::clone(self.default_font.get_or_insert_with(|| Arc::new(Font::fallback("font_default"))))
            },
        }
    }

    fn show_string(&mut self, operand: Option<&Object>) -> Vec<TextItem> {
        let font = self.active_font();
        match operand.and_then(|o| o.as_string()) {
            Some(bytes) => font.decode(bytes).into_iter().map(TextItem::Glyph).collect(),
            None => {
                log::warn!("Text operator without a string operand");
                Vec::new()
            },
        }
    }

    fn show_array(&mut self, operand: Option<&Object>) -> Vec<TextItem> {
        let font = self.active_font();
        let Some(items) = operand.and_then(|o| o.as_array()) else {
            log::warn!("TJ without an array operand");
            return Vec::new();
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Object::String(bytes) => out.extend(font.decode(bytes).into_iter().map(TextItem::Glyph)),
                Object::Integer(_) | Object::Real(_) => {
                    let adjust = item.as_number().unwrap_or(0.0);
                    out.push(TextItem::Adjust(adjust));
                    if -adjust >= self.options.word_break_threshold {
                        out.push(TextItem::WordBreak);
                    }
                },
                other => log::warn!("Unexpected {} in TJ array", other.type_name()),
            }
        }
        out
    }

    fn set_device_color(&mut self, fill: bool, cs: ColorSpace, args: &[Object], list: &mut OperatorList) {
        let comps: Vec<f64> = args.iter().map(|o| number(Some(o))).collect();
        let rgb = cs.to_rgb(&comps);
        if fill {
            self.state.fill_cs = cs;
            list.push(Operation::SetFillRgb(rgb));
        } else {
            self.state.stroke_cs = cs;
            list.push(Operation::SetStrokeRgb(rgb));
        }
    }

    /// `sc`/`scn`/`SC`/`SCN` in the current colour space; a trailing name
    /// selects a pattern.
    fn set_color(&mut self, fill: bool, args: &[Object], resources: Option<&Dictionary>, list: &mut OperatorList) -> Result<()> {
        let cs = if fill { &self.state.fill_cs } else { &self.state.stroke_cs };

        if let Some(Object::Name(pattern_name)) = args.last() {
            let underlying = match cs {
                ColorSpace::Pattern(under) => under.as_deref(),
                _ => None,
            };
            let comps: Vec<f64> = args[..args.len() - 1].iter().map(|o| number(Some(o))).collect();
            let ir = match lookup_resource(resources, "Pattern", pattern_name.as_str(), self.resolver)? {
                Some(pattern) => pattern_ir(&pattern, &comps, underlying, resources, self.resolver)?,
                None => {
                    log::warn!("Pattern /{} not found in resources", pattern_name);
                    return Ok(());
                },
            };
            list.push(pattern_op(fill, ir));
            return Ok(());
        }

        let comps: Vec<f64> = args.iter().map(|o| number(Some(o))).collect();
        let rgb = cs.to_rgb(&comps);
        list.push(if fill { Operation::SetFillRgb(rgb) } else { Operation::SetStrokeRgb(rgb) });
        Ok(())
    }

    fn set_gstate(&mut self, operand: Option<&Object>, resources: Option<&Dictionary>, list: &mut OperatorList) -> Result<()> {
        let name = operand.and_then(|o| o.as_name()).unwrap_or("");
        let gstate = match lookup_resource(resources, "ExtGState", name, self.resolver)? {
            Some(Object::Dictionary(d)) => d,
            Some(other) => {
                log::warn!("ExtGState /{} is a {}", name, other.type_name());
                return Ok(());
            },
            None => {
                log::warn!("ExtGState /{} not found in resources", name);
                return Ok(());
            },
        };

        for (key, value) in gstate.iter() {
            let value = self.resolver.resolve(value)?;
            match key.as_str() {
                "LW" => list.push(Operation::SetLineWidth(number(Some(&value)))),
                "LC" => list.push(Operation::SetLineCap(number(Some(&value)) as i64)),
                "LJ" => list.push(Operation::SetLineJoin(number(Some(&value)) as i64)),
                "ML" => list.push(Operation::SetMiterLimit(number(Some(&value)))),
                "D" => {
                    if let Some(parts) = value.as_array() {
                        list.push(Operation::SetDash {
                            array: parts.first().and_then(|a| a.as_number_array()).unwrap_or_default(),
                            phase: number(parts.get(1)),
                        });
                    }
                },
                "Font" => {
                    if let Some([font_ref, size]) = value.as_array().map(|v| v.as_slice()) {
                        let (font, first_use) = self.fonts.load(font_ref, self.resolver);
                        if first_use {
                            list.add_font(font.export());
                        }
                        list.add_dependency(font.id());
                        list.push(Operation::SetFont {
                            font_id: font.id().to_string(),
                            size: number(Some(size)),
                        });
                        self.state.font = Some(font);
                    }
                },
                "Type" => {},
                other => log::trace!("ExtGState entry /{} ignored", other),
            }
        }
        Ok(())
    }

    fn paint_xobject(&mut self, name: &str, resources: Option<&Dictionary>, list: &mut OperatorList) -> Result<Option<PendingForm>> {
        let raw = match resources {
            Some(res) => match res.get_resolved("XObject", self.resolver)? {
                Some(Object::Dictionary(xobjects)) => xobjects.get(name).cloned(),
                _ => None,
            },
            None => None,
        };
        let Some(raw) = raw else {
            log::warn!("XObject /{} not found in resources", name);
            return Ok(None);
        };
        let key = raw.as_reference();
        let stream = match self.resolver.resolve(&raw)? {
            Object::Stream(stream) => stream,
            other => {
                log::warn!("XObject /{} is a {}", name, other.type_name());
                return Ok(None);
            },
        };

        match stream.dict.get_name("Subtype") {
            Some("Form") => return Ok(Some(PendingForm { key, stream })),
            Some("Image") => {
                log::debug!("Image XObject /{} skipped", name);
                list.push(Operation::PaintImage { inline: false });
            },
            other => log::debug!("XObject /{} of subtype {:?} ignored", name, other),
        }
        Ok(None)
    }
}

fn pattern_op(fill: bool, ir: PatternIr) -> Operation {
    if fill {
        Operation::SetFillPattern(ir)
    } else {
        Operation::SetStrokePattern(ir)
    }
}

/// Entry `name` of the resource category `category`.
fn lookup_resource(
    resources: Option<&Dictionary>,
    category: &str,
    name: &str,
    resolver: &dyn Resolve,
) -> Result<Option<Object>> {
    let Some(res) = resources else {
        return Ok(None);
    };
    match res.get_resolved(category, resolver)? {
        Some(Object::Dictionary(entries)) => entries.get_resolved(name, resolver),
        _ => Ok(None),
    }
}

fn number(operand: Option<&Object>) -> f64 {
    match operand.and_then(|o| o.as_number()) {
        Some(v) => v,
        None => {
            log::warn!("Expected a number operand, got {:?}", operand.map(|o| o.type_name()));
            0.0
        },
    }
}
