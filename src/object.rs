//! PDF object types.
//!
//! Objects form a graph whose edges are [`ObjectRef`] values: the table owns
//! every indirect object (keyed by object number) and a reference is only an
//! index into it. Dictionaries never own the objects they point to, so cyclic
//! structures (page trees with `/Parent`, outlines with `/Prev`) need no
//! special representation.

use crate::decoders::{self, FilterSpec};
use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;
use bytes::Bytes;
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

lazy_static::lazy_static! {
    /// Process-wide operator interning table.
    static ref OPERATORS: Mutex<HashMap<Box<str>, Operator>> = Mutex::new(HashMap::new());
}

/// A PDF name (`/Type`), stored without the leading slash.
///
/// `Display` writes PDF syntax with the slash and is meant for logs and
/// error messages. Use [`Name::as_str`] for lookups and map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(String);

impl Name {
    /// Create a name from a string.
    pub fn new(s: impl Into<String>) -> Self {
        Name(s.into())
    }

    /// Create a name from raw bytes. Bytes that are not UTF-8 are read as Latin-1.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => Name(s.to_string()),
            Err(_) => Name(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// An interned keyword token (`obj`, `R`, content operators).
///
/// Every distinct spelling is allocated once per process; clones share the
/// same storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Operator(Arc<str>);

impl Operator {
    /// Return the interned operator for `s`.
    pub fn intern(s: &str) -> Operator {
        let mut table = OPERATORS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(op) = table.get(s) {
            return op.clone();
        }
        let op = Operator(Arc::from(s));
        table.insert(Box::from(s), op.clone());
        op
    }

    /// The operator text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if both operators share the same interned storage.
    pub fn ptr_eq(&self, other: &Operator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operator({})", &*self.0)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// Something that can dereference indirect objects.
pub trait Resolve {
    /// Fetch the object a reference points to.
    fn fetch(&self, r: ObjectRef) -> Result<Object>;

    /// Dereference `obj` once if it is a reference, otherwise clone it.
    fn resolve(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.fetch(*r),
            other => Ok(other.clone()),
        }
    }
}

/// A dictionary of name to object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<Name, Object>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<Name>, value: Object) {
        self.entries.insert(key.into(), value);
    }

    /// Raw value for `key`; references are returned as-is.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Value for `key` with a reference resolved exactly once.
    ///
    /// A reference that points to another reference is returned unresolved
    /// at the second level.
    pub fn get_resolved(&self, key: &str, resolver: &dyn Resolve) -> Result<Option<Object>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(obj) => resolver.resolve(obj).map(Some),
        }
    }

    /// First present key of `keys`, resolved once. Handles abbreviated keys
    /// such as `/Filter` vs `/F` in inline images.
    pub fn get_any_resolved(&self, keys: &[&str], resolver: Option<&dyn Resolve>) -> Result<Option<Object>> {
        for key in keys {
            if let Some(obj) = self.entries.get(*key) {
                return match resolver {
                    Some(r) => r.resolve(obj).map(Some),
                    None => Ok(Some(obj.clone())),
                };
            }
        }
        Ok(None)
    }

    /// True if the dictionary has `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.shift_remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter()
    }

    /// Iterate over keys.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    /// Iterate over values.
    pub fn values(&self) -> impl Iterator<Item = &Object> {
        self.entries.values()
    }

    /// Name value of `key`, without dereferencing.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|o| o.as_name())
    }

    /// Integer value of `key`, without dereferencing.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|o| o.as_integer())
    }

    /// Numeric value of `key`, without dereferencing.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|o| o.as_number())
    }

    /// True when `/Type` equals `type_name`.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.get_name("Type") == Some(type_name)
    }
}

impl FromIterator<(Name, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Name, Object)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A stream: dictionary plus a view of its (still encoded) bytes.
///
/// The bytes are either a zero-copy slice of the document buffer or an owned
/// buffer; callers must not rely on which. Decoding happens on every call to
/// [`Stream::decode`] and the result is never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dictionary,
    raw: Bytes,
    filters: Vec<FilterSpec>,
}

impl Stream {
    /// Create a stream with an explicit filter chain.
    pub fn new(dict: Dictionary, raw: Bytes, filters: Vec<FilterSpec>) -> Self {
        Self { dict, raw, filters }
    }

    /// Create a stream whose filter chain is read from its own dictionary.
    /// Indirect `/Filter` or `/DecodeParms` values are ignored.
    pub fn from_dict(dict: Dictionary, raw: Bytes) -> Self {
        let filters = decoders::filter_chain(&dict, None).unwrap_or_default();
        Self { dict, raw, filters }
    }

    /// The encoded bytes.
    pub fn raw_data(&self) -> &Bytes {
        &self.raw
    }

    /// The filter chain applied by [`Stream::decode`].
    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    /// Decode the stream with default limits.
    pub fn decode(&self) -> Result<Bytes> {
        self.decode_with_options(&ParserOptions::default())
    }

    /// Decode the stream, applying every filter in order.
    ///
    /// An empty body decodes to an empty buffer whatever the filters say.
    pub fn decode_with_options(&self, options: &ParserOptions) -> Result<Bytes> {
        if self.raw.is_empty() {
            return Ok(Bytes::new());
        }
        if self.filters.is_empty() {
            return Ok(self.raw.clone());
        }
        decoders::decode_chain(&self.raw, &self.filters, options)
    }
}

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String bytes, escapes decoded
    String(Vec<u8>),
    /// Name (starting with /)
    Name(Name),
    /// Bare keyword, only produced while parsing content streams
    Operator(Operator),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Operator(_) => "Operator",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer. Reals with no fractional part also qualify.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) if r.fract() == 0.0 && r.is_finite() => Some(*r as i64),
            _ => None,
        }
    }

    /// Try to cast to a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Streams yield their dictionary.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to operator.
    pub fn as_operator(&self) -> Option<&Operator> {
        match self {
            Object::Operator(o) => Some(o),
            _ => None,
        }
    }

    /// True if this is the operator `op`.
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self, Object::Operator(o) if o.as_str() == op)
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Require a dictionary, failing with a typed error.
    pub fn expect_dict(&self) -> Result<&Dictionary> {
        self.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: self.type_name().to_string(),
        })
    }

    /// Numeric array as `Vec<f64>`; non-numeric items yield `None`.
    pub fn as_number_array(&self) -> Option<Vec<f64>> {
        self.as_array()?.iter().map(|o| o.as_number()).collect()
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}
