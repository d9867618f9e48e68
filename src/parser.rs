//! Structural parser.
//!
//! Builds [`Object`]s from lexer tokens using a two-token lookahead
//! (`buf1`, `buf2`). The lookahead is what makes `10 0 R` recognisable as a
//! reference and `>> stream` recognisable as the start of a stream body.
//!
//! Streams are only produced when the parser is created with
//! `allow_streams`; inside content streams and object-stream containers a
//! dictionary followed by `stream` is returned as a plain dictionary.

use crate::decoders;
use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, Lexer, Token};
use crate::object::{Dictionary, Object, ObjectRef, Operator, Resolve, Stream};
use crate::parser_config::ParserOptions;
use bytes::Bytes;

const ENDSTREAM: &[u8] = b"endstream";

/// Lookahead state of a parser: enough to resume parsing later at the same
/// spot without re-reading anything before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserState {
    /// Lexer position after `buf2`
    pub position: usize,
    /// Byte offset where `buf1` starts
    pub token_start: usize,
    /// Source length when the state was saved
    pub source_len: usize,
    /// First lookahead token
    pub buf1: Token,
    /// Second lookahead token
    pub buf2: Token,
}

/// Parser over a lexer with two tokens of lookahead.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    resolver: Option<&'a dyn Resolve>,
    allow_streams: bool,
    options: ParserOptions,
    buf1: Token,
    buf2: Token,
    buf1_start: usize,
    buf2_start: usize,
    depth: usize,
    in_inline_image: bool,
    id_end: Option<usize>,
}

fn read_token(lexer: &mut Lexer<'_>) -> Result<(usize, Token)> {
    lexer.skip_whitespace();
    let start = lexer.position();
    Ok((start, lexer.next_token()?))
}

impl<'a> Parser<'a> {
    /// Create a parser and fill the lookahead buffer.
    ///
    /// `resolver` is used to dereference indirect `/Length`, `/Filter` and
    /// `/DecodeParms` values of streams.
    pub fn new(
        lexer: Lexer<'a>,
        resolver: Option<&'a dyn Resolve>,
        allow_streams: bool,
        options: ParserOptions,
    ) -> Result<Self> {
        let mut parser = Self {
            lexer,
            resolver,
            allow_streams,
            options,
            buf1: Token::Eof,
            buf2: Token::Eof,
            buf1_start: 0,
            buf2_start: 0,
            depth: 0,
            in_inline_image: false,
            id_end: None,
        };
        parser.refill()?;
        Ok(parser)
    }

    /// Create a parser whose lookahead is restored from a saved state.
    ///
    /// When the lookahead had reached the end of a source that has grown
    /// since, the saved tokens may be truncated, so they are read again from
    /// the start of `buf1`.
    pub fn from_state(
        mut lexer: Lexer<'a>,
        state: ParserState,
        resolver: Option<&'a dyn Resolve>,
        allow_streams: bool,
        options: ParserOptions,
    ) -> Result<Self> {
        if state.position >= state.source_len && lexer.source().len() > state.source_len {
            lexer.set_position(state.token_start);
            return Self::new(lexer, resolver, allow_streams, options);
        }
        lexer.set_position(state.position);
        let source_len = lexer.source().len();
        Ok(Self {
            lexer,
            resolver,
            allow_streams,
            options,
            buf1: state.buf1,
            buf2: state.buf2,
            buf1_start: state.token_start,
            buf2_start: state.position.min(source_len),
            depth: 0,
            in_inline_image: false,
            id_end: None,
        })
    }

    /// Snapshot the lookahead so parsing can resume at this point.
    pub fn save_state(&self) -> ParserState {
        ParserState {
            position: self.lexer.position(),
            token_start: self.buf1_start,
            source_len: self.lexer.source().len(),
            buf1: self.buf1.clone(),
            buf2: self.buf2.clone(),
        }
    }

    /// Read both lookahead tokens from the current lexer position.
    fn refill(&mut self) -> Result<()> {
        let (start1, tok1) = read_token(&mut self.lexer)?;
        let (start2, tok2) = read_token(&mut self.lexer)?;
        self.buf1 = tok1;
        self.buf1_start = start1;
        self.buf2 = tok2;
        self.buf2_start = start2;
        Ok(())
    }

    /// The next token that `get_obj` will consume.
    pub fn peek(&self) -> &Token {
        &self.buf1
    }

    /// The token after [`Parser::peek`].
    pub fn peek2(&self) -> &Token {
        &self.buf2
    }

    /// True once every token has been consumed.
    pub fn is_eof(&self) -> bool {
        self.buf1 == Token::Eof
    }

    /// Byte position of the lexer (just after the second lookahead token).
    pub fn lexer_position(&self) -> usize {
        self.lexer.position()
    }

    /// Access the lexer.
    pub fn lexer(&self) -> &Lexer<'a> {
        &self.lexer
    }

    /// Options this parser was created with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Drop `buf1` and read one more token.
    pub fn shift(&mut self) -> Result<()> {
        if self.in_inline_image && self.buf2.is_operator("ID") {
            // Image data follows; it must not go through the lexer
            self.id_end = Some(self.lexer.position());
            self.buf1 = std::mem::replace(&mut self.buf2, Token::Null);
            self.buf1_start = self.buf2_start;
            return Ok(());
        }
        let (start, next) = if self.buf2 == Token::Eof {
            (self.lexer.source().len(), Token::Eof)
        } else {
            read_token(&mut self.lexer)?
        };
        self.buf1 = std::mem::replace(&mut self.buf2, next);
        self.buf1_start = std::mem::replace(&mut self.buf2_start, start);
        Ok(())
    }

    /// Parse the next object.
    pub fn get_obj(&mut self) -> Result<Object> {
        let buf1 = self.buf1.clone();
        self.shift()?;

        match buf1 {
            Token::Eof => Err(Error::UnexpectedEof),
            Token::ArrayStart => self.nested(Self::parse_array_body),
            Token::DictStart => self.nested(Self::parse_dict_body),
            Token::Integer(num) => {
                let gen = match (&self.buf1, self.buf2.is_operator("R")) {
                    (Token::Integer(gen), true) => Some(*gen),
                    _ => None,
                };
                if let Some(gen) = gen {
                    let r = make_ref(num, gen);
                    self.shift()?;
                    self.shift()?;
                    return match r {
                        Some(r) => Ok(Object::Reference(r)),
                        None => {
                            log::warn!("Reference {} {} R out of range, using null", num, gen);
                            Ok(Object::Null)
                        },
                    };
                }
                Ok(Object::Integer(num))
            },
            Token::Real(r) => Ok(Object::Real(r)),
            Token::String(s) => Ok(Object::String(s)),
            Token::Name(n) => Ok(Object::Name(n)),
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Null => Ok(Object::Null),
            Token::Operator(op) if op.as_str() == "BI" => self.make_inline_image(),
            Token::Operator(op) => Ok(Object::Operator(op)),
            Token::ArrayEnd => Ok(Object::Operator(Operator::intern("]"))),
            Token::DictEnd => Ok(Object::Operator(Operator::intern(">>"))),
            Token::BraceStart => Ok(Object::Operator(Operator::intern("{"))),
            Token::BraceEnd => Ok(Object::Operator(Operator::intern("}"))),
        }
    }

    fn nested(&mut self, body: fn(&mut Self) -> Result<Object>) -> Result<Object> {
        if self.depth >= self.options.max_nesting {
            return Err(Error::ParseError {
                offset: self.lexer.position(),
                reason: format!("nesting deeper than {}", self.options.max_nesting),
            });
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn parse_array_body(&mut self) -> Result<Object> {
        let mut items = Vec::new();
        while self.buf1 != Token::ArrayEnd {
            if self.is_eof() {
                return Err(Error::ParseError {
                    offset: self.lexer.position(),
                    reason: "End of file inside array".to_string(),
                });
            }
            items.push(self.get_obj()?);
        }
        self.shift()?;
        Ok(Object::Array(items))
    }

    fn parse_dict_entries(&mut self, terminator: &Token) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        while &self.buf1 != terminator && !self.is_eof() {
            let Token::Name(key) = self.buf1.clone() else {
                if self.options.strict {
                    return Err(Error::ParseError {
                        offset: self.lexer.position(),
                        reason: format!("dictionary key must be a name, found {:?}", self.buf1),
                    });
                }
                log::warn!("Malformed dictionary: key must be a name object, skipping {:?}", self.buf1);
                self.shift()?;
                continue;
            };
            self.shift()?;
            if self.is_eof() {
                break;
            }
            let value = self.get_obj()?;
            dict.insert(key, value);
        }
        Ok(dict)
    }

    fn parse_dict_body(&mut self) -> Result<Object> {
        let dict = self.parse_dict_entries(&Token::DictEnd)?;
        if self.is_eof() {
            return Err(Error::ParseError {
                offset: self.lexer.position(),
                reason: "End of file inside dictionary".to_string(),
            });
        }

        if self.buf2.is_operator("stream") && self.allow_streams {
            return self.make_stream(dict).map(Object::Stream);
        }
        self.shift()?;
        Ok(Object::Dictionary(dict))
    }

    /// Skip to just after the end of the current line.
    fn skip_to_next_line(&mut self) {
        let source = self.lexer.source();
        let mut pos = self.lexer.position();
        while let Some(b) = source.byte_at(pos) {
            pos += 1;
            if b == b'\r' {
                if source.byte_at(pos) == Some(b'\n') {
                    pos += 1;
                }
                break;
            }
            if b == b'\n' {
                break;
            }
        }
        self.lexer.set_position(pos);
    }

    fn stream_length(&self, dict: &Dictionary) -> usize {
        let length = match (dict.get("Length"), self.resolver) {
            (Some(Object::Reference(r)), Some(resolver)) => resolver.fetch(*r).ok(),
            (Some(obj), _) => Some(obj.clone()),
            (None, _) => None,
        };
        match length.as_ref().and_then(Object::as_integer) {
            Some(len) if len >= 0 => len as usize,
            _ => {
                log::info!("Bad /Length {:?} in stream, treating as 0", length);
                0
            },
        }
    }

    /// Scan forward from `start` in fixed-size blocks for `signature`.
    fn find_stream_end(&self, start: usize, signature: &[u8]) -> Option<usize> {
        let source = self.lexer.source();
        let block = self.options.endstream_scan_block.max(signature.len() * 2);
        let mut pos = start;
        while pos < source.len() {
            // Overlap blocks so a signature split across two is still found
            if let Some(found) = source.find(pos, signature, Some(block)) {
                return Some(found);
            }
            pos += block - signature.len() + 1;
        }
        None
    }

    fn make_stream(&mut self, dict: Dictionary) -> Result<Stream> {
        // buf1 is '>>', buf2 is 'stream', the lexer sits just after 'stream'
        self.skip_to_next_line();
        let start = self.lexer.position();
        let declared = self.stream_length(&dict);

        let mut length = declared;
        let end_ok = {
            let mut probe = self.lexer.clone();
            probe.set_position(start.saturating_add(declared));
            matches!(probe.next_token(), Ok(t) if t.is_operator("endstream"))
        };

        if !end_ok {
            let found = [ENDSTREAM, &ENDSTREAM[..8], &ENDSTREAM[..7], &ENDSTREAM[..6]]
                .iter()
                .find_map(|sig| self.find_stream_end(start, sig));
            let Some(end) = found else {
                return Err(Error::ParseError {
                    offset: start,
                    reason: "Missing endstream command".to_string(),
                });
            };
            let mut actual = end - start;
            // The EOL before endstream is not part of the data
            let source = self.lexer.source();
            if actual > 0 && source.byte_at(start + actual - 1) == Some(b'\n') {
                actual -= 1;
            }
            if actual > 0 && source.byte_at(start + actual - 1) == Some(b'\r') {
                actual -= 1;
            }
            log::warn!(
                "Stream /Length {} is wrong, recovered length {} by scanning for endstream",
                declared,
                actual
            );
            length = actual;
        }

        let data: Bytes = if length == 0 {
            Bytes::new()
        } else {
            self.lexer.source().slice(start, start + length)
        };

        // Reposition after the data and consume 'endstream' if present
        self.lexer.set_position(start + length);
        self.refill()?;
        if self.buf1.is_operator("endstream") {
            self.shift()?;
        } else if matches!(&self.buf1, Token::Operator(op) if op.as_str().starts_with("endstr")) {
            // Truncated signature such as 'endstrea'
            self.shift()?;
        }

        let filters = decoders::filter_chain(&dict, self.resolver)?;
        Ok(Stream::new(dict, data, filters))
    }

    fn make_inline_image(&mut self) -> Result<Object> {
        let id = Token::Operator(Operator::intern("ID"));
        self.in_inline_image = true;
        self.id_end = None;
        let dict = self.parse_dict_entries(&id);
        self.in_inline_image = false;
        let dict = dict?;
        if self.is_eof() {
            return Err(Error::ParseError {
                offset: self.lexer.position(),
                reason: "End of file inside inline image dictionary".to_string(),
            });
        }

        let source = self.lexer.source().clone();
        let id_end = self.find_id_end(&source)?;
        let mut start = id_end;
        if source.byte_at(start).is_some_and(is_whitespace) {
            start += 1;
        }

        let (data_end, ei_pos) = find_inline_image_end(&source, start).unwrap_or_else(|| {
            log::warn!("Inline image at byte {} has no EI terminator", start);
            (source.len(), source.len())
        });

        let data = source.slice(start, data_end);
        let filters = decoders::filter_chain(&dict, self.resolver)?;

        self.lexer.set_position((ei_pos + 2).min(source.len()));
        self.buf1 = Token::Operator(Operator::intern("EI"));
        self.buf1_start = ei_pos;
        let (start, next) = read_token(&mut self.lexer)?;
        self.buf2 = next;
        self.buf2_start = start;
        Ok(Object::Stream(Stream::new(dict, data, filters)))
    }

    /// Position just after the `ID` keyword that `buf1` holds.
    fn find_id_end(&mut self, source: &crate::source::ByteSource) -> Result<usize> {
        if let Some(end) = self.id_end.take() {
            return Ok(end);
        }
        // 'ID' came straight after 'BI', so one data token was already read
        let before = self.lexer.position();
        source
            .rfind(before, b"ID")
            .map(|p| p + 2)
            .ok_or_else(|| Error::ParseError {
                offset: before,
                reason: "ID keyword not found".to_string(),
            })
    }
}

/// Locate the `EI` that ends inline image data starting at `start`.
///
/// Returns `(end_of_data, position_of_EI)`. `EI` only counts when it is
/// preceded by whitespace, followed by whitespace or end of input, and the
/// next five bytes are printable ASCII or CR/LF; image bytes can contain
/// `EI` by chance.
fn find_inline_image_end(source: &crate::source::ByteSource, start: usize) -> Option<(usize, usize)> {
    const LOOKAHEAD: usize = 5;
    let mut pos = start;
    while pos + 1 < source.len() {
        let is_ei = source.byte_at(pos) == Some(b'E') && source.byte_at(pos + 1) == Some(b'I');
        let preceded = pos > start && source.byte_at(pos - 1).is_some_and(is_whitespace);
        let followed = source.byte_at(pos + 2).map_or(true, is_whitespace);
        if is_ei && preceded && followed {
            let plausible = (pos + 3..pos + 3 + LOOKAHEAD)
                .filter_map(|i| source.byte_at(i))
                .all(|b| b == b'\r' || b == b'\n' || (0x20..=0x7E).contains(&b));
            if plausible {
                return Some((pos - 1, pos));
            }
        }
        pos += 1;
    }
    None
}

fn make_ref(num: i64, gen: i64) -> Option<ObjectRef> {
    let id = u32::try_from(num).ok()?;
    let gen = u16::try_from(gen).ok()?;
    Some(ObjectRef::new(id, gen))
}

/// Parse a single object from a byte slice. Streams are allowed.
pub fn parse_object(data: &[u8]) -> Result<Object> {
    let lexer = Lexer::new(Bytes::copy_from_slice(data));
    let mut parser = Parser::new(lexer, None, true, ParserOptions::default())?;
    parser.get_obj()
}
