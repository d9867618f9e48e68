//! PDF document model.
//!
//! A [`PdfDocument`] owns the source buffer, the cross-reference table and
//! the catalog. Everything else (pages, fonts, outline) is derived lazily.

use crate::canvas::{PagePrimitives, VirtualCanvas};
use crate::catalog::Catalog;
use crate::config::CanvasConfig;
use crate::content::OperatorList;
use crate::error::{Error, Result};
use crate::fonts::decode_text_string;
use crate::lexer::{is_whitespace, Lexer};
use crate::object::{Dictionary, Object, Resolve};
use crate::outline::{Destination, OutlineItem};
use crate::page::Page;
use crate::parser::Parser;
use crate::parser_config::ParserOptions;
use crate::xref::XRef;
use bytes::Bytes;
use md5::{Digest, Md5};
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::sequence::{preceded, tuple};
use nom::IResult;
use serde::Serialize;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::Path;

/// Bytes searched for the header and hashed for the fallback fingerprint.
const HEADER_WINDOW: usize = 1024;

/// Window size of the backward `startxref` scan.
const STARTXREF_WINDOW: usize = 1024;

/// Longest version string kept from the header.
const MAX_VERSION_LEN: usize = 8;

/// A trailer /ID written as sixteen zero bytes carries no identity.
const EMPTY_ID: [u8; 16] = [0; 16];

/// Summary of a document for display or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    /// Version from the file header, e.g. `"1.7"`
    pub version: Option<String>,
    /// A consistent linearization dictionary was found
    pub linearized: bool,
    /// The trailer declares an /Encrypt dictionary
    pub encrypted: bool,
    /// Number of pages
    pub page_count: usize,
    /// Stable document identifier, see [`PdfDocument::fingerprint`]
    pub fingerprint: String,
    /// Text entries of the /Info dictionary (Title, Author, ...)
    pub entries: BTreeMap<String, String>,
}

/// PDF document.
///
/// # Example
///
/// ```no_run
/// use pdf_primitives::document::PdfDocument;
///
/// let doc = PdfDocument::open("sample.pdf")?;
/// println!("{} pages", doc.num_pages()?);
/// let first = doc.page_primitives(0)?;
/// println!("{} lines, {} fills", first.lines.len(), first.fills.len());
/// # Ok::<(), pdf_primitives::error::Error>(())
/// ```
pub struct PdfDocument {
    xref: XRef,
    catalog: Catalog,
    version: Option<String>,
    linearized: bool,
    start_xref: usize,
    options: ParserOptions,
    canvas: CanvasConfig,
    fingerprint: OnceCell<String>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("linearized", &self.linearized)
            .field("start_xref", &self.start_xref)
            .field("xref_entries", &self.xref.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Parse a document held in memory, with default options.
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        Self::with_options(data, ParserOptions::default(), CanvasConfig::default())
    }

    /// Read and parse a document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise the same
    /// errors as [`PdfDocument::new`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        log::debug!("Read {} bytes from {}", data.len(), path.as_ref().display());
        Self::new(data)
    }

    /// Parse a document with explicit parser and canvas settings.
    ///
    /// This locates the cross-reference chain, reads it, and loads the
    /// catalog. If the chain is damaged the buffer is re-indexed by scanning
    /// for object headers. A document whose trailer cannot be found either
    /// way fails here.
    pub fn with_options(data: impl Into<Bytes>, options: ParserOptions, canvas: CanvasConfig) -> Result<Self> {
        let data: Bytes = data.into();
        let version = check_header(&data, options.strict)?;

        let linear_start = linearized_start(&data, options);
        let start_xref = match linear_start {
            Some(offset) => offset,
            None => find_start_xref(&data),
        };
        log::debug!("Cross-reference chain starts at {}", start_xref);

        let mut xref = XRef::new(data, options);
        xref.set_start_xref(start_xref);
        match xref.parse(false) {
            Ok(()) => {},
            Err(e @ (Error::MissingData(_) | Error::InvalidXrefEntryType(_))) => return Err(e),
            Err(e) => {
                log::info!("Cross-reference chain unusable ({}), reindexing", e);
                xref.parse(true)?;
            },
        }

        let root = xref.root_ref().ok_or(Error::TrailerNotFound)?;
        let catalog = Catalog::new(root, &xref)?;

        Ok(Self {
            xref,
            catalog,
            version,
            linearized: linear_start.is_some(),
            start_xref,
            options,
            canvas,
            fingerprint: OnceCell::new(),
        })
    }

    /// Version string from the header, when one was found.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// True if the document carries a linearization dictionary matching its
    /// length.
    pub fn is_linearized(&self) -> bool {
        self.linearized
    }

    /// Offset the cross-reference chain was read from.
    pub fn start_xref(&self) -> usize {
        self.start_xref
    }

    /// The cross-reference table, which also resolves objects.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    /// The document catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.xref.trailer()
    }

    /// Parser settings in use.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Canvas settings in use.
    pub fn canvas_config(&self) -> &CanvasConfig {
        &self.canvas
    }

    /// True if the trailer declares an /Encrypt dictionary. Encrypted
    /// content is not decrypted.
    pub fn is_encrypted(&self) -> bool {
        self.trailer().is_some_and(|t| t.contains_key("Encrypt"))
    }

    /// Number of pages.
    pub fn num_pages(&self) -> Result<usize> {
        self.catalog.num_pages(&self.xref)
    }

    /// Load page `index` (zero-based).
    pub fn page(&self, index: usize) -> Result<Page> {
        let count = self.num_pages()?;
        if index >= count {
            return Err(Error::PageNotFound(index));
        }
        self.catalog.page(index, &self.xref)
    }

    /// Evaluate the content of page `index` into an operator list.
    pub fn operator_list(&self, index: usize) -> Result<OperatorList> {
        let page = self.page(index)?;
        let mut fonts = self.catalog.fonts();
        page.operator_list(&self.xref, &mut fonts, self.options)
    }

    /// Interpret page `index` and collect its primitives.
    pub fn page_primitives(&self, index: usize) -> Result<PagePrimitives> {
        let page = self.page(index)?;
        let list = {
            let mut fonts = self.catalog.fonts();
            page.operator_list(&self.xref, &mut fonts, self.options)?
        };
        for font in list.new_fonts() {
            log::debug!("Page {} introduces font {}", index, font.id);
        }

        let crop = page.crop_box();
        let mut primitives = PagePrimitives::new(index, crop.width(), crop.height());
        VirtualCanvas::with_base_transform(&mut primitives, &self.canvas, page.view_transform()).execute(&list);
        log::debug!(
            "Page {}: {} operations, {} primitives",
            index,
            list.len(),
            primitives.len()
        );
        Ok(primitives)
    }

    /// Primitives of every page. A page that fails yields an `Err` entry;
    /// the remaining pages are still processed.
    pub fn all_page_primitives(&self) -> Result<Vec<Result<PagePrimitives>>> {
        let count = self.num_pages()?;
        Ok((0..count)
            .map(|i| {
                let result = self.page_primitives(i);
                if let Err(e) = &result {
                    log::warn!("Page {} failed: {}", i, e);
                }
                result
            })
            .collect())
    }

    /// Document identifier.
    ///
    /// The hex form of the first trailer /ID string, or the MD5 of the first
    /// 1024 bytes when there is no usable /ID.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            let id = self
                .trailer()
                .and_then(|t| t.get_resolved("ID", &self.xref).ok().flatten())
                .and_then(|ids| ids.as_array().and_then(|a| a.first()).and_then(Object::as_string).map(<[u8]>::to_vec))
                .filter(|id| !id.is_empty() && id.as_slice() != EMPTY_ID);
            match id {
                Some(id) => to_hex(&id),
                None => {
                    let source = self.xref.source();
                    let head = source.slice(0, source.len().min(HEADER_WINDOW));
                    to_hex(&Md5::digest(&head))
                },
            }
        })
    }

    /// Document summary including the /Info dictionary's text entries.
    pub fn info(&self) -> Result<DocumentInfo> {
        let mut entries = BTreeMap::new();
        let info = match self.trailer() {
            Some(trailer) => trailer.get_resolved("Info", &self.xref)?,
            None => None,
        };
        match info {
            Some(Object::Dictionary(dict)) => {
                for (key, value) in dict.iter() {
                    match self.xref.resolve(value)? {
                        Object::String(bytes) => {
                            entries.insert(key.as_str().to_string(), decode_text_string(&bytes));
                        },
                        Object::Name(name) => {
                            entries.insert(key.as_str().to_string(), name.as_str().to_string());
                        },
                        other => log::debug!("Skipping /Info entry {} of type {}", key, other.type_name()),
                    }
                }
            },
            Some(other) => log::warn!("/Info is a {}", other.type_name()),
            None => {},
        }

        Ok(DocumentInfo {
            version: self.version.clone(),
            linearized: self.linearized,
            encrypted: self.is_encrypted(),
            page_count: self.num_pages()?,
            fingerprint: self.fingerprint().to_string(),
            entries,
        })
    }

    /// Outline (bookmark) tree.
    pub fn outline(&self) -> Result<&[OutlineItem]> {
        self.catalog.outline(&self.xref)
    }

    /// Named destinations.
    pub fn destinations(&self) -> Result<&BTreeMap<String, Destination>> {
        self.catalog.destinations(&self.xref)
    }

    /// Release the shared font cache. The source buffer and the resolved
    /// object cache are kept.
    pub fn cleanup(&self) {
        self.catalog.cleanup();
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn pdf_version(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tag("%PDF-"), take_while1(|b: u8| b.is_ascii_digit() || b == b'.'))(input)
}

fn startxref_value(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tuple((tag("startxref"), take_while(is_whitespace))), digit1)(input)
}

/// Find the header within the first 1024 bytes and return its version.
///
/// Garbage before the signature is tolerated. Without a signature the
/// document is still read, unless `strict` is set.
pub fn check_header(data: &[u8], strict: bool) -> Result<Option<String>> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let Some(start) = window.windows(5).position(|w| w == b"%PDF-") else {
        if strict {
            return Err(Error::InvalidHeader("no %PDF- signature in the first 1024 bytes".to_string()));
        }
        log::warn!("No %PDF- header found");
        return Ok(None);
    };
    if start > 0 {
        log::warn!("Skipped {} bytes of garbage before the header", start);
    }

    match pdf_version(&data[start..]) {
        Ok((_, version)) => {
            let version = String::from_utf8_lossy(&version[..version.len().min(MAX_VERSION_LEN)]).into_owned();
            log::debug!("PDF version {}", version);
            Ok(Some(version))
        },
        Err(_) if strict => Err(Error::InvalidHeader("missing version after %PDF-".to_string())),
        Err(_) => {
            log::warn!("Header without a version number");
            Ok(None)
        },
    }
}

/// Offset named by the last `startxref` keyword, or 0.
///
/// The buffer is searched backwards in 1024 byte windows. Windows overlap by
/// the keyword length so a keyword straddling two windows is still found.
pub fn find_start_xref(data: &[u8]) -> usize {
    const KEYWORD: &[u8] = b"startxref";

    let mut end = data.len();
    while end > 0 {
        let start = end.saturating_sub(STARTXREF_WINDOW);
        let stop = (end + KEYWORD.len() - 1).min(data.len());
        if let Some(pos) = data[start..stop].windows(KEYWORD.len()).rposition(|w| w == KEYWORD) {
            let at = start + pos;
            return match startxref_value(&data[at..]) {
                Ok((_, digits)) => std::str::from_utf8(digits)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        log::warn!("startxref value out of range");
                        0
                    }),
                Err(_) => {
                    log::warn!("startxref at {} is not followed by an offset", at);
                    0
                },
            };
        }
        end = start;
    }

    log::warn!("startxref not found");
    0
}

/// Start offset computed from a linearization dictionary.
///
/// The first object of a linearized file is a dictionary with /Linearized
/// and a total length /L. When /L matches the buffer, the first-page
/// cross-reference section follows the object directly, so the chain
/// starts right after its `endobj`.
pub fn linearized_start(data: &Bytes, options: ParserOptions) -> Option<usize> {
    let dict = first_object(data, options)?;
    if !dict.get_number("Linearized").is_some_and(|v| v > 0.0) {
        return None;
    }
    match dict.get_integer("L") {
        Some(length) if usize::try_from(length).ok() == Some(data.len()) => {},
        other => {
            log::info!("Linearization /L {:?} does not match length {}; ignoring it", other, data.len());
            return None;
        },
    }
    let endobj = data.windows(6).position(|w| w == b"endobj")?;
    log::debug!("Linearized document, first-page xref after {}", endobj);
    Some(endobj + 6)
}

fn first_object(data: &Bytes, options: ParserOptions) -> Option<Dictionary> {
    let lexer = Lexer::new(data.clone());
    let mut parser = Parser::new(lexer, None, false, options).ok()?;
    let num = parser.get_obj().ok()?;
    let gen = parser.get_obj().ok()?;
    let keyword = parser.get_obj().ok()?;
    if num.as_integer().is_none() || gen.as_integer().is_none() || !keyword.is_operator("obj") {
        return None;
    }
    match parser.get_obj().ok()? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a classic-xref document from object bodies numbered from 1.
    fn build(prefix: &[u8], bodies: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = prefix.to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for off in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                trailer_extra,
                xref
            )
            .as_bytes(),
        );
        out
    }

    fn simple(trailer_extra: &str) -> Vec<u8> {
        build(
            b"%PDF-1.4\n",
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] /Contents 4 0 R >>",
                "<< /Length 17 >>\nstream\n10 10 100 20 re f\nendstream",
            ],
            trailer_extra,
        )
    }

    // ========================================================================
    // Header
    // ========================================================================

    #[test]
    fn test_header_version() {
        assert_eq!(check_header(b"%PDF-1.7\n", true).unwrap().as_deref(), Some("1.7"));
        assert_eq!(check_header(b"%PDF-2.0 ", true).unwrap().as_deref(), Some("2.0"));
    }

    #[test]
    fn test_header_after_garbage() {
        let data = b"\x00\x01junk before header\r\n%PDF-1.5\n1 0 obj";
        assert_eq!(check_header(data, false).unwrap().as_deref(), Some("1.5"));
    }

    #[test]
    fn test_header_missing() {
        assert_eq!(check_header(b"not a pdf at all", false).unwrap(), None);
        assert!(matches!(check_header(b"not a pdf at all", true), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_beyond_window_is_ignored() {
        let mut data = vec![b' '; 2000];
        data.extend_from_slice(b"%PDF-1.4");
        assert_eq!(check_header(&data, false).unwrap(), None);
    }

    // ========================================================================
    // startxref
    // ========================================================================

    #[test]
    fn test_find_start_xref() {
        assert_eq!(find_start_xref(b"...\nstartxref\n1234\n%%EOF\n"), 1234);
        assert_eq!(find_start_xref(b"startxref 1\nstartxref\r\n99\n%%EOF"), 99);
    }

    #[test]
    fn test_find_start_xref_far_from_end() {
        let mut data = b"%PDF-1.4\nstartxref\n77\n".to_vec();
        data.extend(std::iter::repeat(b' ').take(5000));
        assert_eq!(find_start_xref(&data), 77);
    }

    #[test]
    fn test_find_start_xref_across_window_boundary() {
        // Keyword starts 4 bytes before the last window
        let mut data = vec![b' '; 100];
        data.extend_from_slice(b"startxref\n42\n");
        let tail = STARTXREF_WINDOW - 9;
        data.extend(std::iter::repeat(b' ').take(tail));
        assert_eq!(find_start_xref(&data), 42);
    }

    #[test]
    fn test_find_start_xref_defaults_to_zero() {
        assert_eq!(find_start_xref(b"no keyword here"), 0);
        assert_eq!(find_start_xref(b"startxref\nabc"), 0);
        assert_eq!(find_start_xref(b""), 0);
    }

    // ========================================================================
    // Linearization
    // ========================================================================

    #[test]
    fn test_linearized_start_after_first_object() {
        let head = b"%PDF-1.5\n1 0 obj\n<< /Linearized 1 /L 0000 >>\nendobj\n".to_vec();
        let expected = head.len() - 1;
        let mut data = head;
        data.extend_from_slice(b"xref\n");
        // Patch /L with the final length
        let len = format!("{:04}", data.len());
        let at = data.windows(4).position(|w| w == b"0000").unwrap();
        data[at..at + 4].copy_from_slice(len.as_bytes());

        assert_eq!(linearized_start(&Bytes::from(data), ParserOptions::default()), Some(expected));
    }

    #[test]
    fn test_linearized_length_mismatch() {
        let data = Bytes::from_static(b"%PDF-1.5\n1 0 obj\n<< /Linearized 1 /L 99999 >>\nendobj\n");
        assert_eq!(linearized_start(&data, ParserOptions::default()), None);
    }

    #[test]
    fn test_not_linearized() {
        let data = Bytes::from(simple(""));
        assert_eq!(linearized_start(&data, ParserOptions::default()), None);
    }

    // ========================================================================
    // Document
    // ========================================================================

    #[test]
    fn test_open_simple_document() {
        let doc = PdfDocument::new(simple("")).unwrap();
        assert_eq!(doc.version(), Some("1.4"));
        assert!(!doc.is_linearized());
        assert!(!doc.is_encrypted());
        assert_eq!(doc.num_pages().unwrap(), 1);

        let prims = doc.page_primitives(0).unwrap();
        assert_eq!(prims.width, 200.0);
        assert_eq!(prims.fills.len(), 1);
        assert!(matches!(doc.page_primitives(1), Err(Error::PageNotFound(1))));
    }

    #[test]
    fn test_broken_startxref_is_reindexed() {
        let mut data = simple("");
        let at = data.windows(9).rposition(|w| w == b"startxref").unwrap();
        data.truncate(at);
        data.extend_from_slice(b"startxref\n3\n%%EOF\n");

        let doc = PdfDocument::new(data).unwrap();
        assert_eq!(doc.num_pages().unwrap(), 1);
    }

    #[test]
    fn test_no_trailer_fails() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
        assert!(PdfDocument::new(data).is_err());
    }

    #[test]
    fn test_fingerprint_from_id() {
        let doc = PdfDocument::new(simple("/ID [<0123456789abcdef0123456789ABCDEF> <00>]")).unwrap();
        assert_eq!(doc.fingerprint(), "0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn test_fingerprint_falls_back_to_md5() {
        let data = simple("/ID [<00000000000000000000000000000000> <00>]");
        let expected = to_hex(&Md5::digest(&data[..data.len().min(1024)]));
        let doc = PdfDocument::new(data).unwrap();
        assert_eq!(doc.fingerprint(), expected);
        assert_eq!(doc.fingerprint().len(), 32);
    }

    #[test]
    fn test_info_entries() {
        let mut bodies = vec![
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [] /Count 0 >>",
            "<< /Title (Timetable) /Author <FEFF0041006E006E> /Trapped /False /Pages 3 >>",
        ];
        bodies.push("<< /Filter /Standard >>");
        let doc = PdfDocument::new(build(b"%PDF-1.6\n", &bodies, "/Info 3 0 R /Encrypt 4 0 R")).unwrap();

        let info = doc.info().unwrap();
        assert_eq!(info.version.as_deref(), Some("1.6"));
        assert!(info.encrypted);
        assert_eq!(info.page_count, 0);
        assert_eq!(info.entries["Title"], "Timetable");
        assert_eq!(info.entries["Author"], "Ann");
        assert_eq!(info.entries["Trapped"], "False");
        assert!(!info.entries.contains_key("Pages"));
    }

    #[test]
    fn test_cleanup_keeps_document_usable() {
        let doc = PdfDocument::new(simple("")).unwrap();
        doc.page_primitives(0).unwrap();
        doc.cleanup();
        assert_eq!(doc.page_primitives(0).unwrap().fills.len(), 1);
    }

    #[test]
    fn test_open_nonexistent_file() {
        let result = PdfDocument::open("/nonexistent/path/to/file.pdf");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
