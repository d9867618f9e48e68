//! Colour spaces and conversion to 8-bit RGB.
//!
//! The evaluator converts every colour operand to RGB while it still knows
//! the active colour space, so the canvas only ever sees triples.

use crate::error::Result;
use crate::object::{Dictionary, Object, Resolve};

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// Nesting limit for colour spaces naming other colour spaces.
const MAX_CS_DEPTH: usize = 8;

/// A colour space the evaluator can convert from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    /// DeviceGray, CalGray, or a one-component ICC profile
    Gray,
    /// DeviceRGB, CalRGB, or a three-component ICC profile
    Rgb,
    /// DeviceCMYK or a four-component ICC profile
    Cmyk,
    /// CIE L*a*b*, approximated from the lightness channel
    Lab,
    /// Palette lookup into a base space
    Indexed {
        /// Space the palette entries are expressed in
        base: Box<ColorSpace>,
        /// Highest valid index
        hival: usize,
        /// Packed palette, `base.components()` bytes per entry
        lookup: Vec<u8>,
    },
    /// Separation or DeviceN; tint transforms are not evaluated and the
    /// first tint is shown as gray
    Tint {
        /// Number of colourants
        components: usize,
    },
    /// Pattern space, optionally with the space of uncoloured tiles
    Pattern(Option<Box<ColorSpace>>),
}

impl ColorSpace {
    /// Number of colour components an operand list carries.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb | ColorSpace::Lab => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Tint { components } => *components,
            ColorSpace::Pattern(under) => under.as_ref().map_or(0, |cs| cs.components()),
        }
    }

    /// Colour selected right after `cs`/`CS`.
    pub fn initial_color(&self) -> Rgb {
        match self {
            ColorSpace::Cmyk => self.to_rgb(&[0.0, 0.0, 0.0, 1.0]),
            ColorSpace::Indexed { .. } => self.to_rgb(&[0.0]),
            ColorSpace::Tint { components } => self.to_rgb(&vec![1.0; *components]),
            _ => [0, 0, 0],
        }
    }

    /// Convert component values to RGB. Missing components read as 0.
    pub fn to_rgb(&self, comps: &[f64]) -> Rgb {
        let c = |i: usize| comps.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::Gray => {
                let g = to_byte(c(0));
                [g, g, g]
            },
            ColorSpace::Rgb => [to_byte(c(0)), to_byte(c(1)), to_byte(c(2))],
            ColorSpace::Cmyk => {
                let (r, g, b) = cmyk_to_rgb(c(0), c(1), c(2), c(3));
                [to_byte(r), to_byte(g), to_byte(b)]
            },
            ColorSpace::Lab => {
                let l = to_byte(c(0) / 100.0);
                [l, l, l]
            },
            ColorSpace::Indexed { base, hival, lookup } => {
                let index = (c(0).round().max(0.0) as usize).min(*hival);
                let n = base.components();
                let start = index * n;
                match lookup.get(start..start + n) {
                    Some(entry) => {
                        let values: Vec<f64> = entry.iter().map(|&b| b as f64 / 255.0).collect();
                        base.to_rgb(&values)
                    },
                    None => {
                        log::warn!("Indexed colour {} outside the lookup table", index);
                        [0, 0, 0]
                    },
                }
            },
            ColorSpace::Tint { .. } => {
                let g = to_byte(1.0 - c(0));
                [g, g, g]
            },
            ColorSpace::Pattern(under) => under.as_ref().map_or([0, 0, 0], |cs| cs.to_rgb(comps)),
        }
    }

    /// Read a colour space from an operand or resource value.
    ///
    /// Names other than the device families are looked up in the
    /// `/ColorSpace` sub-dictionary of `resources`.
    pub fn parse(value: &Object, resources: Option<&Dictionary>, resolver: &dyn Resolve) -> Result<ColorSpace> {
        parse_at_depth(value, resources, resolver, 0)
    }
}

fn parse_at_depth(
    value: &Object,
    resources: Option<&Dictionary>,
    resolver: &dyn Resolve,
    depth: usize,
) -> Result<ColorSpace> {
    if depth > MAX_CS_DEPTH {
        log::warn!("Colour space nesting too deep, using DeviceGray");
        return Ok(ColorSpace::Gray);
    }
    let value = resolver.resolve(value)?;

    match &value {
        Object::Name(name) => match name.as_str() {
            "DeviceGray" | "G" | "CalGray" => Ok(ColorSpace::Gray),
            "DeviceRGB" | "RGB" | "CalRGB" => Ok(ColorSpace::Rgb),
            "DeviceCMYK" | "CMYK" => Ok(ColorSpace::Cmyk),
            "Pattern" => Ok(ColorSpace::Pattern(None)),
            other => {
                let named = match resources {
                    Some(res) => match res.get_resolved("ColorSpace", resolver)? {
                        Some(Object::Dictionary(spaces)) => spaces.get(other).cloned(),
                        _ => None,
                    },
                    None => None,
                };
                match named {
                    Some(definition) => parse_at_depth(&definition, resources, resolver, depth + 1),
                    None => {
                        log::warn!("Unknown colour space /{}, using DeviceGray", other);
                        Ok(ColorSpace::Gray)
                    },
                }
            },
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| o.as_name()).unwrap_or("");
            match family {
                "DeviceGray" | "CalGray" | "G" => Ok(ColorSpace::Gray),
                "DeviceRGB" | "CalRGB" | "RGB" => Ok(ColorSpace::Rgb),
                "DeviceCMYK" | "CMYK" => Ok(ColorSpace::Cmyk),
                "Lab" => Ok(ColorSpace::Lab),
                "ICCBased" => {
                    let n = match items.get(1).map(|o| resolver.resolve(o)).transpose()? {
                        Some(Object::Stream(s)) => s.dict.get_integer("N"),
                        Some(Object::Dictionary(d)) => d.get_integer("N"),
                        _ => None,
                    };
                    Ok(match n {
                        Some(1) => ColorSpace::Gray,
                        Some(4) => ColorSpace::Cmyk,
                        Some(3) => ColorSpace::Rgb,
                        other => {
                            log::warn!("ICCBased colour space with /N {:?}, using DeviceRGB", other);
                            ColorSpace::Rgb
                        },
                    })
                },
                "Indexed" | "I" => {
                    let base = match items.get(1) {
                        Some(b) => parse_at_depth(b, resources, resolver, depth + 1)?,
                        None => ColorSpace::Rgb,
                    };
                    let hival = items
                        .get(2)
                        .and_then(|o| o.as_integer())
                        .and_then(|v| usize::try_from(v).ok())
                        .unwrap_or(0);
                    let lookup = match items.get(3).map(|o| resolver.resolve(o)).transpose()? {
                        Some(Object::String(bytes)) => bytes,
                        Some(Object::Stream(s)) => s.decode()?.to_vec(),
                        _ => {
                            log::warn!("Indexed colour space without a lookup table");
                            Vec::new()
                        },
                    };
                    Ok(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    })
                },
                "Separation" => Ok(ColorSpace::Tint { components: 1 }),
                "DeviceN" => {
                    let components = match items.get(1).map(|o| resolver.resolve(o)).transpose()? {
                        Some(Object::Array(names)) => names.len().max(1),
                        _ => 1,
                    };
                    Ok(ColorSpace::Tint { components })
                },
                "Pattern" => {
                    let under = match items.get(1) {
                        Some(u) => Some(Box::new(parse_at_depth(u, resources, resolver, depth + 1)?)),
                        None => None,
                    };
                    Ok(ColorSpace::Pattern(under))
                },
                other => {
                    log::warn!("Unsupported colour space family /{}, using DeviceGray", other);
                    Ok(ColorSpace::Gray)
                },
            }
        },
        other => {
            log::warn!("Colour space is a {}, using DeviceGray", other.type_name());
            Ok(ColorSpace::Gray)
        },
    }
}

fn to_byte(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert CMYK color to RGB color.
///
/// Conversion formula: R = 1 - min(1, C*(1-K) + K)
fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> (f64, f64, f64) {
    let r = 1.0 - (c * (1.0 - k) + k).min(1.0);
    let g = 1.0 - (m * (1.0 - k) + k).min(1.0);
    let b = 1.0 - (y * (1.0 - k) + k).min(1.0);
    (r, g, b)
}
