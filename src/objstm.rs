//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) bundle several indirect objects in one
//! compressed stream. The decoded data starts with `N` pairs of integers
//! (object number, offset relative to `/First`) followed by the objects:
//!
//! ```text
//! 10 0 11 15 12 28        % Pairs: (obj_num, offset)
//! << /Type /Font ... >>   % Object 10 at offset 0
//! [ 0 0 612 792 ]         % Object 11 at offset 15
//! ...
//! ```
//!
//! Streams are not allowed inside a container, so embedded objects are parsed
//! with `allow_streams` off.

use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::object::{Object, Resolve, Stream};
use crate::parser::Parser;
use crate::parser_config::ParserOptions;
use bytes::Bytes;

/// One object unpacked from a container.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedObject {
    /// Object number declared in the header table
    pub number: u32,
    /// Position within the container
    pub index: u32,
    /// The parsed object
    pub object: Object,
}

/// Parse every object of an object stream in one pass.
///
/// `container` is the container's own object number, used for error
/// reporting. Invalid `/N` or `/First` values are fatal.
pub fn parse_object_stream(
    container: u32,
    stream: &Stream,
    resolver: Option<&dyn Resolve>,
    options: &ParserOptions,
) -> Result<Vec<EmbeddedObject>> {
    let first = stream
        .dict
        .get_integer("First")
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::InvalidObjectStream(container, "invalid /First".to_string()))?;
    let n = stream
        .dict
        .get_integer("N")
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| Error::InvalidObjectStream(container, "invalid /N".to_string()))?;

    let data = stream.decode_with_options(options)?;
    log::trace!("Object stream {}: {} objects, /First {}, {} decoded bytes", container, n, first, data.len());

    let header = read_header_table(container, &data, n, options)?;

    let mut objects = Vec::with_capacity(n);
    for (i, &(number, offset)) in header.iter().enumerate() {
        let start = first + offset;
        let end = match header.get(i + 1) {
            Some(&(_, next)) if next < offset => {
                return Err(Error::InvalidObjectStream(
                    container,
                    format!("offsets not increasing at index {}", i),
                ));
            },
            Some(&(_, next)) => first + next,
            None => data.len(),
        };
        if start > data.len() {
            return Err(Error::InvalidObjectStream(
                container,
                format!("object {} starts past end of data", number),
            ));
        }

        let slice: Bytes = data.slice(start..end.min(data.len()));
        let mut parser = Parser::new(Lexer::new(slice), resolver, false, *options)?;
        let object = if parser.is_eof() {
            log::warn!("Object {} in stream {} is empty", number, container);
            Object::Null
        } else {
            parser.get_obj()?
        };
        objects.push(EmbeddedObject {
            number,
            index: i as u32,
            object,
        });
    }

    Ok(objects)
}

fn read_header_table(container: u32, data: &Bytes, n: usize, options: &ParserOptions) -> Result<Vec<(u32, usize)>> {
    let mut parser = Parser::new(Lexer::new(data.clone()), None, false, *options)?;
    let mut header = Vec::with_capacity(n.min(data.len() / 2 + 1));
    for i in 0..n {
        let number = parser
            .get_obj()
            .ok()
            .and_then(|o| o.as_integer())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::InvalidObjectStream(container, format!("invalid object number at index {}", i)))?;
        let offset = parser
            .get_obj()
            .ok()
            .and_then(|o| o.as_integer())
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| Error::InvalidObjectStream(container, format!("invalid object offset at index {}", i)))?;
        header.push((number, offset));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::FilterSpec;
    use crate::object::{Dictionary, Name};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn container(body: &[u8], n: i64, first: i64, compress: bool) -> Stream {
        let mut dict = Dictionary::new();
        dict.insert("Type", Object::Name(Name::new("ObjStm")));
        dict.insert("N", Object::Integer(n));
        dict.insert("First", Object::Integer(first));
        if compress {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(body).unwrap();
            Stream::new(dict, Bytes::from(enc.finish().unwrap()), vec![FilterSpec::new("FlateDecode")])
        } else {
            Stream::new(dict, Bytes::copy_from_slice(body), Vec::new())
        }
    }

    #[test]
    fn test_parse_all_members() {
        let body = b"10 0 11 11 << /A 1 >> [1 2 3]";
        let objects = parse_object_stream(5, &container(body, 2, 11, true), None, &ParserOptions::default())
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].number, 10);
        assert_eq!(objects[0].object.as_dict().unwrap().get_integer("A"), Some(1));
        assert_eq!(objects[1].number, 11);
        assert_eq!(objects[1].index, 1);
        assert_eq!(objects[1].object.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_n_is_fatal() {
        let mut stream = container(b"", 0, 0, false);
        stream.dict.remove("N");
        let err = parse_object_stream(5, &stream, None, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidObjectStream(5, _)));
    }

    #[test]
    fn test_negative_first_is_fatal() {
        let stream = container(b"1 0 null", 1, -3, false);
        assert!(matches!(
            parse_object_stream(7, &stream, None, &ParserOptions::default()),
            Err(Error::InvalidObjectStream(7, _))
        ));
    }

    #[test]
    fn test_short_header_table_is_fatal() {
        let stream = container(b"10 0", 2, 4, false);
        assert!(matches!(
            parse_object_stream(7, &stream, None, &ParserOptions::default()),
            Err(Error::InvalidObjectStream(7, _))
        ));
    }

    #[test]
    fn test_streams_are_not_parsed_inside_container() {
        let body = b"3 0 << /Length 1 >> stream\nx\nendstream";
        let objects = parse_object_stream(9, &container(body, 1, 4, false), None, &ParserOptions::default())
            .unwrap();
        assert!(matches!(objects[0].object, Object::Dictionary(_)));
    }
}
