//! Content streams: operators, graphics state and evaluation.
//!
//! The [`Evaluator`] turns a page's content stream into an
//! [`OperatorList`]; the canvas then executes that list.

pub mod colorspace;
pub mod evaluator;
pub mod graphics_state;
pub mod operators;
pub mod pattern;

pub use colorspace::{ColorSpace, Rgb};
pub use evaluator::Evaluator;
pub use graphics_state::{GraphicsState, GraphicsStateStack, Matrix, Paint};
pub use operators::{Arity, Glyph, OpCode, Operation, OperatorList, PaintOp, TextItem};
pub use pattern::PatternIr;
