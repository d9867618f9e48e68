//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses flate2. Corrupt streams are common, so decoding falls back through
//! raw deflate and a skipped zlib header, and any output produced before an
//! error is kept.

use super::predictor::{decode_predictor, DecodeParams};
use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use crate::object::Dictionary;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl FlateDecoder {
    fn inflate(input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };
        if !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: kept {} bytes before corruption: {}",
                output.len(),
                err
            );
            return Ok(output);
        }

        // Some producers write raw deflate data, or a broken zlib header
        for (skip, label) in [(0usize, "raw deflate"), (2, "deflate after header skip")] {
            if input.len() <= skip {
                continue;
            }
            output.clear();
            match DeflateDecoder::new(&input[skip..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::info!("FlateDecode recovered {} bytes via {}", output.len(), label);
                    return Ok(output);
                },
                Err(_) if !output.is_empty() => {
                    log::warn!("FlateDecode partial recovery via {}: {} bytes", label, output.len());
                    return Ok(output);
                },
                _ => {},
            }
        }

        Err(Error::Decode(format!("FlateDecode failed: {}", err)))
    }
}

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let inflated = Self::inflate(input)?;
        match params.map(DecodeParams::from_dict) {
            Some(p) if p.predictor > 1 => decode_predictor(&inflated, &p),
            _ => Ok(inflated),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
