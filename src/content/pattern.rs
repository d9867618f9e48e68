//! Resolved pattern representation.
//!
//! Pattern operands (`scn /P0`, `sh /Sh0`) are replaced by a [`PatternIr`]
//! during evaluation. The canvas only needs the pattern's placement matrix
//! and a representative colour for the primitives it paints.

use crate::content::colorspace::{ColorSpace, Rgb};
use crate::content::graphics_state::Matrix;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, Resolve};

/// Function nesting followed when looking for a representative colour.
const MAX_FUNCTION_DEPTH: usize = 4;

/// A resolved tiling or shading pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternIr {
    /// PatternType 1
    Tiling {
        /// 1 = coloured, 2 = uncoloured
        paint_type: i64,
        /// Spacing adjustment mode
        tiling_type: i64,
        /// Cell bounding box in pattern space
        bbox: [f64; 4],
        /// Horizontal cell spacing
        x_step: f64,
        /// Vertical cell spacing
        y_step: f64,
        /// Pattern matrix
        matrix: Matrix,
        /// Colour the tile is reported in
        color: Rgb,
    },
    /// PatternType 2, or a shading painted directly with `sh`
    Shading {
        /// ShadingType (1 to 7)
        shading_type: i64,
        /// Pattern matrix (identity for `sh`)
        matrix: Matrix,
        /// Starting colour of the shading
        color: Rgb,
        /// Shading bounding box, when declared
        bbox: Option<[f64; 4]>,
    },
}

impl PatternIr {
    /// Pattern matrix.
    pub fn matrix(&self) -> Matrix {
        match self {
            PatternIr::Tiling { matrix, .. } | PatternIr::Shading { matrix, .. } => *matrix,
        }
    }

    /// Colour primitives painted with this pattern are reported in.
    pub fn representative_color(&self) -> Rgb {
        match self {
            PatternIr::Tiling { color, .. } | PatternIr::Shading { color, .. } => *color,
        }
    }

    /// Short kind label, used in exported primitives.
    pub fn kind(&self) -> &'static str {
        match self {
            PatternIr::Tiling { .. } => "tiling",
            PatternIr::Shading { .. } => "shading",
        }
    }
}

/// Resolve a pattern resource into its IR.
///
/// `components` are the colour operands preceding the pattern name; they
/// colour uncoloured tiling patterns through `underlying`.
pub fn pattern_ir(
    pattern: &Object,
    components: &[f64],
    underlying: Option<&ColorSpace>,
    resources: Option<&Dictionary>,
    resolver: &dyn Resolve,
) -> Result<PatternIr> {
    let pattern = resolver.resolve(pattern)?;
    let dict = match &pattern {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "pattern dictionary".to_string(),
                found: other.type_name().to_string(),
            });
        },
    };
    let matrix = dict
        .get("Matrix")
        .and_then(|m| m.as_number_array())
        .and_then(|v| Matrix::from_slice(&v))
        .unwrap_or_default();

    match dict.get_integer("PatternType").unwrap_or(0) {
        1 => {
            let paint_type = dict.get_integer("PaintType").unwrap_or(1);
            let color = if paint_type == 2 {
                underlying.map_or([0, 0, 0], |cs| cs.to_rgb(components))
            } else {
                [0, 0, 0]
            };
            let bbox = dict
                .get("BBox")
                .and_then(|b| b.as_number_array())
                .and_then(|v| rect(&v))
                .unwrap_or([0.0, 0.0, 0.0, 0.0]);
            Ok(PatternIr::Tiling {
                paint_type,
                tiling_type: dict.get_integer("TilingType").unwrap_or(1),
                bbox,
                x_step: dict.get_number("XStep").unwrap_or(0.0),
                y_step: dict.get_number("YStep").unwrap_or(0.0),
                matrix,
                color,
            })
        },
        2 => {
            let shading = dict
                .get("Shading")
                .ok_or_else(|| Error::InvalidPdf("shading pattern without /Shading".to_string()))?;
            shading_ir(shading, matrix, resources, resolver)
        },
        other => Err(Error::UnknownPatternType(other)),
    }
}

/// Resolve a shading dictionary (or stream) into a shading IR.
pub fn shading_ir(
    shading: &Object,
    matrix: Matrix,
    resources: Option<&Dictionary>,
    resolver: &dyn Resolve,
) -> Result<PatternIr> {
    let shading = resolver.resolve(shading)?;
    let dict = match &shading {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "shading dictionary".to_string(),
                found: other.type_name().to_string(),
            });
        },
    };

    let cs = match dict.get("ColorSpace") {
        Some(value) => ColorSpace::parse(value, resources, resolver)?,
        None => ColorSpace::Gray,
    };
    let comps = match dict.get("Function") {
        Some(f) => first_color(f, resolver, 0)?,
        None => None,
    }
    .or_else(|| dict.get("Background").and_then(|b| b.as_number_array()));
    let color = match comps {
        Some(values) => cs.to_rgb(&values),
        None => cs.initial_color(),
    };

    Ok(PatternIr::Shading {
        shading_type: dict.get_integer("ShadingType").unwrap_or(0),
        matrix,
        color,
        bbox: dict.get("BBox").and_then(|b| b.as_number_array()).and_then(|v| rect(&v)),
    })
}

/// Output of a shading function at its domain start, for exponential
/// functions and stitching functions built from them.
fn first_color(function: &Object, resolver: &dyn Resolve, depth: usize) -> Result<Option<Vec<f64>>> {
    if depth > MAX_FUNCTION_DEPTH {
        return Ok(None);
    }
    let function = resolver.resolve(function)?;
    let dict = match &function {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        Object::Array(parts) => {
            // One function per colour component
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                match first_color(part, resolver, depth + 1)? {
                    Some(v) => out.push(v.first().copied().unwrap_or(0.0)),
                    None => return Ok(None),
                }
            }
            return Ok(Some(out));
        },
        _ => return Ok(None),
    };

    match dict.get_integer("FunctionType") {
        Some(2) => Ok(Some(
            dict.get("C0").and_then(|c| c.as_number_array()).unwrap_or_else(|| vec![0.0]),
        )),
        Some(3) => match dict.get_resolved("Functions", resolver)? {
            Some(Object::Array(functions)) => match functions.first() {
                Some(first) => first_color(first, resolver, depth + 1),
                None => Ok(None),
            },
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

fn rect(v: &[f64]) -> Option<[f64; 4]> {
    match v {
        [x0, y0, x1, y1, ..] => Some([x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]),
        _ => None,
    }
}
