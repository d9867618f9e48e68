//! Cross-reference reconstruction for damaged files.
//!
//! When the xref chain cannot be read, the whole buffer is scanned for
//! `N G obj` headers, `trailer` dictionaries and cross-reference streams.
//! [`crate::xref::XRef`] turns the result into a table in recovery mode.

use crate::object::ObjectRef;
use crate::source::ByteSource;
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_HEADER: Regex = Regex::new(r"\b(\d{1,10})[ \t\r\n\f\x00]+(\d{1,5})[ \t\r\n\f\x00]+obj\b").unwrap();

    /// "trailer <<"
    static ref RE_TRAILER: Regex = Regex::new(r"trailer[ \t\r\n\f\x00]*<<").unwrap();

    static ref RE_TYPE_XREF: Regex = Regex::new(r"/Type\s*/XRef\b").unwrap();

    static ref RE_TYPE_CATALOG: Regex = Regex::new(r"/Type\s*/Catalog\b").unwrap();
}

/// How far past an object header to look for its `/Type`.
const TYPE_WINDOW: usize = 1024;

/// An object header found by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundObject {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
    /// Byte offset of the header
    pub offset: usize,
}

/// Everything the recovery scan found, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    /// Object headers
    pub objects: Vec<FoundObject>,
    /// Offsets of `trailer` keywords
    pub trailers: Vec<usize>,
    /// Offsets of objects whose dictionary declares `/Type /XRef`
    pub xref_streams: Vec<usize>,
    /// Objects whose dictionary declares `/Type /Catalog`
    pub catalogs: Vec<ObjectRef>,
}

/// Scan a whole buffer for object headers and trailers.
pub fn scan(source: &ByteSource) -> ScanResult {
    log::info!("Scanning {} bytes to rebuild the cross-reference table", source.len());
    let contents = source.slice(0, source.len());
    let mut result = ScanResult::default();

    let headers: Vec<(usize, usize, u32, u16)> = RE_OBJ_HEADER
        .captures_iter(&contents)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let id = parse_decimal(cap.get(1)?.as_bytes()).and_then(|v| u32::try_from(v).ok())?;
            let gen = parse_decimal(cap.get(2)?.as_bytes()).and_then(|v| u16::try_from(v).ok())?;
            Some((whole.start(), whole.end(), id, gen))
        })
        .collect();

    for (i, &(start, end, id, gen)) in headers.iter().enumerate() {
        if !looks_like_object_start(&contents[end..]) {
            log::debug!("Skipping false object header {} {} at offset {}", id, gen, start);
            continue;
        }
        result.objects.push(FoundObject { id, gen, offset: start });

        let window_end = headers
            .get(i + 1)
            .map(|next| next.0)
            .unwrap_or(contents.len())
            .min(end + TYPE_WINDOW);
        let window = &contents[end..window_end];
        if RE_TYPE_XREF.is_match(window) {
            result.xref_streams.push(start);
        }
        if RE_TYPE_CATALOG.is_match(window) {
            result.catalogs.push(ObjectRef::new(id, gen));
        }
    }

    result.trailers = RE_TRAILER.find_iter(&contents).map(|m| m.start()).collect();

    log::info!(
        "Recovery scan found {} objects, {} trailers, {} xref streams",
        result.objects.len(),
        result.trailers.len(),
        result.xref_streams.len()
    );
    result
}

fn parse_decimal(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// The bytes after `obj` must start a plausible object.
fn looks_like_object_start(rest: &[u8]) -> bool {
    match rest.iter().find(|b| !b.is_ascii_whitespace() && **b != 0) {
        Some(&b) => matches!(b, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.') || b.is_ascii_digit(),
        None => false,
    }
}
