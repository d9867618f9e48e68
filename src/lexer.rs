//! PDF lexer (tokenizer).
//!
//! Turns a [`ByteSource`] into primitive tokens. The lexer knows nothing about
//! document structure: it produces numbers, strings, names, operators and the
//! punctuation markers `[ ] << >> { }`.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.
//!
//! Two leniencies are worth knowing about:
//! - a `-` in the middle of a number is dropped with a warning (`1-2` reads as `12`);
//! - content streams glue operators to their neighbours (`QBT`, `cm0`). When a
//!   [`KnownSymbols`] table is attached, operator accumulation stops as soon as
//!   the next byte would turn a known symbol into an unknown one.

use crate::error::{Error, Result};
use crate::object::{Name, Operator};
use crate::source::ByteSource;
use std::collections::HashSet;

/// Longest operator token accepted before giving up.
const MAX_OPERATOR_LEN: usize = 128;

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Literal or hexadecimal string, escapes already decoded
    String(Vec<u8>),
    /// Name without the leading slash, `#XX` escapes decoded
    Name(Name),
    /// Bare keyword: `obj`, `R`, `stream`, content operators, ...
    Operator(Operator),
    /// `true` / `false`
    Boolean(bool),
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `{`
    BraceStart,
    /// `}`
    BraceEnd,
    /// End of input
    Eof,
}

impl Token {
    /// True if this token is the operator `op`.
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self, Token::Operator(o) if o.as_str() == op)
    }

    /// Integer value, if this is an integer token.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Token::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Table of known operator symbols and all of their prefixes.
///
/// Used to split operators that are glued to the following token.
#[derive(Debug, Clone, Default)]
pub struct KnownSymbols {
    symbols: HashSet<String>,
    prefixes: HashSet<String>,
}

impl KnownSymbols {
    /// Build a table from a list of symbols. Every proper prefix of a symbol
    /// is recorded as a prefix entry.
    pub fn new<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        let mut table = Self::default();
        for symbol in symbols {
            for (i, _) in symbol.char_indices().skip(1) {
                table.prefixes.insert(symbol[..i].to_string());
            }
            table.symbols.insert(symbol.to_string());
        }
        table
    }

    /// True if `candidate` is a symbol or the prefix of one.
    pub fn is_known(&self, candidate: &str) -> bool {
        self.symbols.contains(candidate) || self.prefixes.contains(candidate)
    }

    /// True if `candidate` is a complete symbol.
    pub fn is_symbol(&self, candidate: &str) -> bool {
        self.symbols.contains(candidate)
    }
}

/// PDF whitespace characters.
#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

/// PDF delimiter characters.
#[inline]
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

#[inline]
fn is_special(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Stateful tokenizer over a byte source.
#[derive(Debug, Clone)]
pub struct Lexer<'k> {
    source: ByteSource,
    pos: usize,
    known: Option<&'k KnownSymbols>,
}

impl<'k> Lexer<'k> {
    /// Create a lexer positioned at the start of `source`.
    pub fn new(source: impl Into<ByteSource>) -> Self {
        Self {
            source: source.into(),
            pos: 0,
            known: None,
        }
    }

    /// Create a lexer that splits glued operators using `known`.
    pub fn with_known_symbols(source: impl Into<ByteSource>, known: &'k KnownSymbols) -> Self {
        Self {
            source: source.into(),
            pos: 0,
            known: Some(known),
        }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an absolute byte offset.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.source.len());
    }

    /// The underlying byte source.
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.source.byte_at(self.pos)
    }

    #[inline]
    fn bump(&mut self) -> Option<u8> {
        let b = self.source.byte_at(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    /// Skip whitespace and comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.bump() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Read the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(b) = self.bump() else {
                return Ok(Token::Eof);
            };

            return match b {
                b'0'..=b'9' | b'+' | b'-' | b'.' => self.read_number(b),
                b'(' => Ok(Token::String(self.read_literal_string())),
                b'/' => self.read_name().map(Token::Name),
                b'[' => Ok(Token::ArrayStart),
                b']' => Ok(Token::ArrayEnd),
                b'{' => Ok(Token::BraceStart),
                b'}' => Ok(Token::BraceEnd),
                b'<' => {
                    if self.peek() == Some(b'<') {
                        self.pos += 1;
                        Ok(Token::DictStart)
                    } else {
                        Ok(Token::String(self.read_hex_string()))
                    }
                },
                b'>' => {
                    if self.peek() == Some(b'>') {
                        self.pos += 1;
                        Ok(Token::DictEnd)
                    } else {
                        Ok(Token::Operator(Operator::intern(">")))
                    }
                },
                b')' => {
                    log::warn!("Stray ')' at byte {}, skipping", start);
                    continue;
                },
                _ => Ok(self.read_operator(b)),
            };
        }
    }

    fn read_number(&mut self, first: u8) -> Result<Token> {
        let start = self.pos - 1;
        let mut text = String::new();
        let mut c = Some(first);

        if first == b'-' || first == b'+' {
            if first == b'-' {
                text.push('-');
            }
            c = self.bump();
            // Double negative is read as a single one
            if first == b'-' && c == Some(b'-') {
                c = self.bump();
            }
            // Line breaks between sign and digits are ignored
            while matches!(c, Some(b'\r') | Some(b'\n')) {
                c = self.bump();
            }
        }

        match c {
            Some(d @ (b'0'..=b'9' | b'.')) => text.push(d as char),
            other => {
                // Step back so the terminator is seen again
                if other.is_some() {
                    self.pos -= 1;
                }
                if other.is_none() || other.is_some_and(is_special) {
                    log::debug!("Lone sign or dot at byte {} treated as zero", start);
                    return Ok(Token::Integer(0));
                }
                return Err(Error::ParseError {
                    offset: start,
                    reason: format!("Invalid number starting with {:?}", text),
                });
            },
        }

        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' | b'.' | b'e' | b'E' => {
                    text.push(b as char);
                    self.pos += 1;
                },
                b'-' => {
                    log::warn!("Badly formatted number at byte {}: minus sign in the middle", start);
                    self.pos += 1;
                },
                _ => break,
            }
        }

        Ok(number_from_text(&text))
    }

    fn read_literal_string(&mut self) -> Vec<u8> {
        let start = self.pos;
        let mut out = Vec::new();
        let mut depth = 1usize;

        loop {
            let Some(b) = self.bump() else {
                log::warn!("Unterminated string starting at byte {}", start);
                return out;
            };
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                },
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return out;
                    }
                    out.push(b);
                },
                b'\\' => {
                    let Some(e) = self.bump() else {
                        log::warn!("Unterminated string starting at byte {}", start);
                        return out;
                    };
                    match e {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'(' | b')' | b'\\' => out.push(e),
                        b'0'..=b'7' => {
                            let mut value = u32::from(e - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    },
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        },
                        b'\r' => {
                            // Line continuation, \r\n counts as one break
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        },
                        b'\n' => {},
                        other => out.push(other),
                    }
                },
                _ => out.push(b),
            }
        }
    }

    fn read_hex_string(&mut self) -> Vec<u8> {
        let start = self.pos;
        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let Some(b) = self.bump() else {
                log::warn!("Unterminated hex string starting at byte {}", start);
                break;
            };
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            match hex_value(b) {
                Some(v) => match high.take() {
                    Some(h) => out.push((h << 4) | v),
                    None => high = Some(v),
                },
                None => log::warn!("Ignoring invalid character {:?} in hex string", b as char),
            }
        }

        // Odd digit count: the last nibble is padded with zero
        if let Some(h) = high {
            out.push(h << 4);
        }
        out
    }

    fn read_name(&mut self) -> Result<Name> {
        let mut bytes = Vec::new();
        while let Some(b) = self.peek() {
            if is_special(b) {
                break;
            }
            self.pos += 1;
            if b != b'#' {
                bytes.push(b);
                continue;
            }

            let hi = self.peek().and_then(hex_value);
            let Some(hi) = hi else {
                // '#' not followed by a hex digit is kept literally
                log::warn!("Name escape '#' at byte {} not followed by a hex digit", self.pos - 1);
                bytes.push(b'#');
                continue;
            };
            self.pos += 1;
            match self.peek().and_then(hex_value) {
                Some(lo) => {
                    self.pos += 1;
                    bytes.push((hi << 4) | lo);
                },
                None => {
                    return Err(Error::ParseError {
                        offset: self.pos,
                        reason: "Illegal digit in hexadecimal name escape".to_string(),
                    });
                },
            }
        }

        Ok(Name::from_bytes(&bytes))
    }

    fn read_operator(&mut self, first: u8) -> Token {
        let mut text = String::new();
        text.push(first as char);
        let mut known_found = self.known.is_some_and(|k| k.is_known(&text));

        while let Some(b) = self.peek() {
            if is_special(b) {
                break;
            }
            if let Some(known) = self.known {
                let mut candidate = text.clone();
                candidate.push(b as char);
                if known_found && !known.is_known(&candidate) {
                    break;
                }
                known_found = known.is_known(&candidate);
            }
            if text.len() >= MAX_OPERATOR_LEN {
                log::warn!("Operator token too long at byte {}", self.pos);
                break;
            }
            text.push(b as char);
            self.pos += 1;
        }

        match text.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Operator(Operator::intern(&text)),
        }
    }
}

/// Convert accumulated number text into a token.
///
/// Text that does not parse as a whole (`1.2.3`, `5e`) keeps its longest
/// parseable prefix.
fn number_from_text(text: &str) -> Token {
    let is_real = text.contains(['.', 'e', 'E']);
    if !is_real {
        if let Ok(i) = text.parse::<i64>() {
            return Token::Integer(i);
        }
    }
    if let Ok(f) = text.parse::<f64>() {
        return Token::Real(f);
    }
    let mut end = text.len();
    while end > 0 {
        end -= 1;
        if let Ok(f) = text[..end].parse::<f64>() {
            return Token::Real(f);
        }
    }
    Token::Real(0.0)
}
