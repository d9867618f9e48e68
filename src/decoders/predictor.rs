//! PNG and TIFF predictors for Flate-compressed streams.
//!
//! Cross-reference streams are nearly always written with PNG Up (12), so
//! this is needed just to read the xref of most modern files.

use crate::error::{Error, Result};
use crate::object::Dictionary;

/// Decode parameters relevant to predictors.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read `/Predictor`, `/Columns`, `/Colors`, `/BitsPerComponent`.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let get = |key: &str, default: usize| {
            dict.get_integer(key)
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(default)
        };
        Self {
            predictor: dict.get_integer("Predictor").unwrap_or(1),
            columns: get("Columns", 1),
            colors: get("Colors", 1),
            bits_per_component: get("BitsPerComponent", 8),
        }
    }

    /// Bytes per row of sample data, without the PNG tag byte.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least one.
    pub fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(decode_tiff(data, params)),
        10..=15 => Ok(decode_png(data, params)),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.row_bytes().max(1);
    let bpp = params.pixel_bytes();
    let mut out = data.to_vec();
    if params.bits_per_component != 8 {
        log::warn!(
            "TIFF predictor with {} bits per component is not supported, leaving data as is",
            params.bits_per_component
        );
        return out;
    }
    for row in out.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    out
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.row_bytes();
    let bpp = params.pixel_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut prior = vec![0u8; row_len];
    let mut current = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let tag = chunk[0];
        let encoded = &chunk[1..];
        if encoded.len() < row_len {
            log::debug!("PNG predictor: short final row of {} bytes", encoded.len());
        }
        current.fill(0);

        for i in 0..encoded.len() {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prior[i];
            let up_left = if i >= bpp { prior[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    log::warn!("Unknown PNG predictor tag {}, treating row as unfiltered", other);
                    0
                },
            };
            current[i] = encoded[i].wrapping_add(predicted);
        }

        out.extend_from_slice(&current[..encoded.len()]);
        std::mem::swap(&mut prior, &mut current);
    }

    out
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
