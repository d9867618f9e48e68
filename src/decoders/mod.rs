//! Stream filter pipeline.
//!
//! Only FlateDecode is implemented. Any other filter name is logged and the
//! bytes pass through unchanged, so consumers must tolerate partially
//! undecoded streams. Predictors from `/DecodeParms` are applied after Flate.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, Resolve};
use crate::parser_config::ParserOptions;
use bytes::Bytes;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// One entry of a stream's filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Filter name (`FlateDecode`, `Fl`, ...)
    pub name: String,
    /// Matching `/DecodeParms` dictionary, if any
    pub params: Option<Dictionary>,
}

impl FilterSpec {
    /// Filter without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: None,
        }
    }
}

fn decoder_for(name: &str) -> Option<Box<dyn StreamDecoder>> {
    match name {
        "FlateDecode" | "Fl" => Some(Box::new(FlateDecoder)),
        _ => None,
    }
}

/// Read the filter chain declared by a stream dictionary.
///
/// `/Filter` may be a single name or an array of names; `/DecodeParms` is
/// then a single dictionary or a parallel array (null entries allowed).
/// Abbreviated inline-image keys `/F` and `/DP` are accepted too.
pub fn filter_chain(dict: &Dictionary, resolver: Option<&dyn Resolve>) -> Result<Vec<FilterSpec>> {
    let filter = dict.get_any_resolved(&["Filter", "F"], resolver)?;
    let params = dict.get_any_resolved(&["DecodeParms", "DP"], resolver)?;

    let names: Vec<String> = match &filter {
        None | Some(Object::Null) => return Ok(Vec::new()),
        Some(Object::Name(n)) => vec![n.as_str().to_string()],
        Some(Object::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                let item = match resolver {
                    Some(r) => r.resolve(item)?,
                    None => item.clone(),
                };
                match item.as_name() {
                    Some(n) => names.push(n.to_string()),
                    None => log::warn!("Ignoring non-name filter entry: {}", item.type_name()),
                }
            }
            names
        },
        Some(other) => {
            log::warn!("Ignoring /Filter of type {}", other.type_name());
            return Ok(Vec::new());
        },
    };

    let param_list: Vec<Option<Dictionary>> = match params {
        Some(Object::Dictionary(d)) => vec![Some(d)],
        Some(Object::Array(items)) => {
            let mut list = Vec::with_capacity(items.len());
            for item in &items {
                let item = match resolver {
                    Some(r) => r.resolve(item)?,
                    None => item.clone(),
                };
                list.push(match item {
                    Object::Dictionary(d) => Some(d),
                    _ => None,
                });
            }
            list
        },
        _ => Vec::new(),
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterSpec {
            name,
            params: param_list.get(i).cloned().flatten(),
        })
        .collect())
}

/// Apply one named filter.
///
/// Unknown filters are logged and the input is returned unchanged.
pub fn decode(raw: &[u8], filter_name: &str, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    match decoder_for(filter_name) {
        Some(decoder) => decoder.decode(raw, params),
        None => {
            log::warn!("Unsupported filter /{}, passing {} bytes through", filter_name, raw.len());
            Ok(raw.to_vec())
        },
    }
}

/// Apply a whole filter chain, enforcing the decompressed size limit.
pub fn decode_chain(raw: &Bytes, filters: &[FilterSpec], options: &ParserOptions) -> Result<Bytes> {
    let mut current = raw.clone();
    for filter in filters {
        let decoded = decode(&current, &filter.name, filter.params.as_ref())?;
        if options.max_decompressed_size > 0 && decoded.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                decoded.len(),
                options.max_decompressed_size
            )));
        }
        current = Bytes::from(decoded);
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Name;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_unknown_filter_passes_through() {
        let out = decode(b"abc", "DCTDecode", None).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_flate_abbreviation() {
        let data = deflate(b"hello");
        assert_eq!(decode(&data, "Fl", None).unwrap(), b"hello");
    }

    #[test]
    fn test_filter_chain_single_name() {
        let mut dict = Dictionary::new();
        dict.insert("Filter", Object::Name(Name::new("FlateDecode")));
        let chain = filter_chain(&dict, None).unwrap();
        assert_eq!(chain, vec![FilterSpec::new("FlateDecode")]);
    }

    #[test]
    fn test_filter_chain_parallel_arrays() {
        let mut parms = Dictionary::new();
        parms.insert("Predictor", Object::Integer(12));
        let mut dict = Dictionary::new();
        dict.insert(
            "Filter",
            Object::Array(vec![
                Object::Name(Name::new("ASCIIHexDecode")),
                Object::Name(Name::new("FlateDecode")),
            ]),
        );
        dict.insert("DecodeParms", Object::Array(vec![Object::Null, Object::Dictionary(parms.clone())]));

        let chain = filter_chain(&dict, None).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].params, None);
        assert_eq!(chain[1].params, Some(parms));
    }

    #[test]
    fn test_decode_chain_applies_in_order() {
        let raw = Bytes::from(deflate(b"content"));
        let chain = vec![FilterSpec::new("FlateDecode"), FilterSpec::new("Crypt")];
        let out = decode_chain(&raw, &chain, &ParserOptions::default()).unwrap();
        assert_eq!(&out[..], b"content");
    }

    #[test]
    fn test_decode_chain_size_limit() {
        let raw = Bytes::from(deflate(&[0u8; 4096]));
        let options = ParserOptions {
            max_decompressed_size: 100,
            ..ParserOptions::default()
        };
        let result = decode_chain(&raw, &[FilterSpec::new("FlateDecode")], &options);
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
