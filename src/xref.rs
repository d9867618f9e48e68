//! Cross-reference table.
//!
//! The table maps object numbers to where objects live: a byte offset for
//! uncompressed objects, or a container object stream and index for
//! compressed ones. Sections are read from a queue of start offsets so that
//! incrementally updated files (`/Prev`, `/XRefStm`) are handled without
//! recursion, and an entry that is already known is never overwritten: the
//! section read first (the most recent update) wins.
//!
//! Reading a classic table keeps a [`TableState`] while it runs. When the
//! source ends in the middle of the table, parsing fails with
//! [`Error::MissingData`]; after [`XRef::supply_data`] a second call to
//! [`XRef::parse`] resumes at the entry that was interrupted.
//!
//! Objects are dereferenced lazily through [`XRef::fetch`] and memoized by
//! object number for the lifetime of the table.

use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::object::{Dictionary, Object, ObjectRef, Resolve, Stream};
use crate::objstm::parse_object_stream;
use crate::parser::{Parser, ParserState};
use crate::parser_config::ParserOptions;
use crate::source::ByteSource;
use crate::xref_reconstruction;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

/// Largest subsection a classic table may declare.
const MAX_SUBSECTION_COUNT: i64 = 10_000_000;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object
    Free {
        /// Next free object number
        next: u64,
        /// Generation to use if the number is reused
        gen: u16,
    },
    /// Object stored at a byte offset
    Uncompressed {
        /// Byte offset of the `N G obj` header
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing object stream
        container: u32,
        /// Index within the container
        index: u32,
    },
}

impl XRefEntry {
    /// True for free entries.
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }
}

/// Progress through a classic xref table, saved so that reading can resume
/// after the source is extended.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    /// Index of the next entry within the current subsection
    pub entry_num: i64,
    /// First object number of the current subsection, once its header is read
    pub first: Option<i64>,
    /// Entry count of the current subsection, once its header is read
    pub count: Option<i64>,
    /// Parser position and lookahead at the start of the next entry
    pub parser: ParserState,
}

/// Counters for cache verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XRefStats {
    /// Number of entries in the table
    pub entries: usize,
    /// Objects currently memoized
    pub cached_objects: usize,
    /// Times an object or object stream was parsed from the source
    pub objects_parsed: usize,
    /// Fetches answered from the cache
    pub cache_hits: usize,
}

/// Cross-reference table plus the resolved-object cache.
pub struct XRef {
    source: ByteSource,
    options: ParserOptions,
    entries: HashMap<u32, XRefEntry>,
    start_queue: VecDeque<usize>,
    xref_stms: HashSet<usize>,
    top_dict: Option<Dictionary>,
    trailer: Option<Dictionary>,
    root: Option<ObjectRef>,
    table_state: Option<TableState>,
    cache: RefCell<HashMap<u32, Object>>,
    resolving: RefCell<HashSet<ObjectRef>>,
    objects_parsed: Cell<usize>,
    cache_hits: Cell<usize>,
}

impl std::fmt::Debug for XRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XRef")
            .field("entries", &self.entries.len())
            .field("root", &self.root)
            .field("source_len", &self.source.len())
            .finish()
    }
}

impl XRef {
    /// Create an empty table over `source`.
    pub fn new(source: impl Into<ByteSource>, options: ParserOptions) -> Self {
        Self {
            source: source.into(),
            options,
            entries: HashMap::new(),
            start_queue: VecDeque::new(),
            xref_stms: HashSet::new(),
            top_dict: None,
            trailer: None,
            root: None,
            table_state: None,
            cache: RefCell::new(HashMap::new()),
            resolving: RefCell::new(HashSet::new()),
            objects_parsed: Cell::new(0),
            cache_hits: Cell::new(0),
        }
    }

    /// Queue a section start offset (normally the `startxref` value).
    pub fn set_start_xref(&mut self, offset: usize) {
        self.start_queue.push_back(offset);
    }

    /// Extend the source after [`Error::MissingData`].
    pub fn supply_data(&mut self, data: Bytes) {
        self.source.append(data);
    }

    /// The bytes objects are read from.
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// Options used for every parser the table creates.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Saved classic-table progress, present only while a table is
    /// incomplete.
    pub fn table_state(&self) -> Option<&TableState> {
        self.table_state.as_ref()
    }

    /// Take the saved table progress out of the table.
    pub fn take_table_state(&mut self) -> Option<TableState> {
        self.table_state.take()
    }

    /// Restore table progress saved by [`XRef::take_table_state`].
    pub fn restore_table_state(&mut self, state: TableState) {
        self.table_state = Some(state);
    }

    /// The trailer dictionary (first trailer of the chain).
    pub fn trailer(&self) -> Option<&Dictionary> {
        self.trailer.as_ref()
    }

    /// Reference to the document catalog.
    pub fn root_ref(&self) -> Option<ObjectRef> {
        self.root
    }

    /// Look up an entry.
    pub fn entry(&self, num: u32) -> Option<&XRefEntry> {
        self.entries.get(&num)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry has been read.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `num` has been resolved and memoized.
    pub fn is_cached(&self, num: u32) -> bool {
        self.cache.borrow().contains_key(&num)
    }

    /// Cache and parse counters.
    pub fn stats(&self) -> XRefStats {
        XRefStats {
            entries: self.entries.len(),
            cached_objects: self.cache.borrow().len(),
            objects_parsed: self.objects_parsed.get(),
            cache_hits: self.cache_hits.get(),
        }
    }

    /// Read the table and locate the catalog.
    ///
    /// With `recovery_mode` the chain is ignored and the table is rebuilt
    /// from a scan of the whole buffer.
    pub fn parse(&mut self, recovery_mode: bool) -> Result<()> {
        let trailer = if recovery_mode {
            log::warn!("Indexing all objects");
            self.index_objects()?
        } else {
            self.read_xref(false)?.ok_or(Error::TrailerNotFound)?
        };

        self.root = None;
        match trailer.get("Root").and_then(Object::as_reference) {
            Some(root) if self.is_valid_root(root) => {
                self.root = Some(root);
                self.trailer = Some(trailer);
                Ok(())
            },
            other => {
                self.trailer = Some(trailer);
                if recovery_mode {
                    Err(Error::InvalidPdf(format!("Invalid Root reference: {:?}", other)))
                } else {
                    Err(Error::InvalidXref(format!("trailer /Root {:?} is not a catalog", other)))
                }
            },
        }
    }

    fn is_valid_root(&self, root: ObjectRef) -> bool {
        let Ok(catalog) = self.fetch(root) else {
            return false;
        };
        let Some(catalog) = catalog.as_dict() else {
            return false;
        };
        matches!(catalog.get_resolved("Pages", self), Ok(Some(Object::Dictionary(_))))
    }

    fn parser_at(&self, offset: usize) -> Result<Parser<'static>> {
        let mut lexer = Lexer::new(self.source.clone());
        lexer.set_position(offset);
        Parser::new(lexer, None, true, self.options)
    }

    /// Process the start-offset queue. Returns the top trailer dictionary.
    fn read_xref(&mut self, recovery_mode: bool) -> Result<Option<Dictionary>> {
        let mut parsed: HashSet<usize> = HashSet::new();

        while let Some(&start) = self.start_queue.front() {
            if parsed.contains(&start) {
                log::warn!("Skipping xref section at {}: already parsed", start);
                self.start_queue.pop_front();
                continue;
            }
            if parsed.len() >= self.options.max_xref_sections {
                log::warn!("Stopping after {} xref sections", parsed.len());
                self.start_queue.clear();
                break;
            }
            parsed.insert(start);

            match self.read_section(start) {
                Ok(dict) => self.queue_previous(&dict),
                Err(e @ Error::MissingData(_)) => return Err(e),
                Err(e @ Error::InvalidXrefEntryType(_)) => return Err(e),
                Err(e) => {
                    self.table_state = None;
                    log::info!("Error while reading xref section at {}: {}", start, e);
                },
            }
            self.start_queue.pop_front();
        }

        match self.top_dict.clone() {
            Some(dict) => Ok(Some(dict)),
            None if recovery_mode => Ok(None),
            None => Err(Error::TrailerNotFound),
        }
    }

    fn queue_previous(&mut self, dict: &Dictionary) {
        match dict.get("Prev") {
            Some(Object::Integer(prev)) if *prev >= 0 => self.start_queue.push_back(*prev as usize),
            // Some producers write "/Prev N 0 R"
            Some(Object::Reference(r)) => self.start_queue.push_back(r.id as usize),
            _ => {},
        }
    }

    fn read_section(&mut self, start: usize) -> Result<Dictionary> {
        if self.table_state.is_some() {
            // Resuming an interrupted table
            let dict = self.process_xref_table()?;
            self.after_table(&dict);
            return Ok(dict);
        }

        let mut parser = self.parser_at(start)?;
        if parser.is_eof() {
            return Err(Error::MissingData(self.source.len()));
        }
        let obj = parser.get_obj()?;

        if obj.is_operator("xref") {
            log::debug!("Classic xref table at offset {}", start);
            self.table_state = Some(TableState {
                entry_num: 0,
                first: None,
                count: None,
                parser: parser.save_state(),
            });
            let dict = self.process_xref_table()?;
            self.after_table(&dict);
            Ok(dict)
        } else if obj.as_integer().is_some() {
            log::debug!("Xref stream at offset {}", start);
            let gen = parser.get_obj()?;
            let keyword = parser.get_obj()?;
            if gen.as_integer().is_none() || !keyword.is_operator("obj") {
                return Err(Error::InvalidXref("Invalid XRef stream header".to_string()));
            }
            let Object::Stream(stream) = parser.get_obj()? else {
                return Err(Error::InvalidXref("Invalid XRef stream".to_string()));
            };
            self.process_xref_stream(&stream)?;
            if self.top_dict.is_none() {
                self.top_dict = Some(stream.dict.clone());
            }
            Ok(stream.dict)
        } else {
            Err(Error::InvalidXref(format!("Invalid XRef stream header at {}", start)))
        }
    }

    fn after_table(&mut self, dict: &Dictionary) {
        if self.top_dict.is_none() {
            self.top_dict = Some(dict.clone());
        }
        if let Some(stm) = dict.get_integer("XRefStm").and_then(|v| usize::try_from(v).ok()) {
            if self.xref_stms.insert(stm) {
                self.start_queue.push_back(stm);
            }
        }
    }

    fn process_xref_table(&mut self) -> Result<Dictionary> {
        let mut state = self
            .table_state
            .take()
            .ok_or_else(|| Error::InvalidXref("no table in progress".to_string()))?;

        let mut parser = match self.read_xref_table(&mut state) {
            Ok(parser) => parser,
            Err(e) => {
                if matches!(e, Error::MissingData(_)) {
                    self.table_state = Some(state);
                }
                return Err(e);
            },
        };

        let trailer = match parser.get_obj() {
            Ok(obj) => obj,
            Err(_) if parser.lexer_position() >= self.source.len() => {
                self.table_state = Some(TableState {
                    entry_num: 0,
                    first: None,
                    count: None,
                    parser: state.parser,
                });
                return Err(Error::MissingData(self.source.len()));
            },
            Err(e) => return Err(e),
        };
        match trailer {
            Object::Dictionary(dict) => Ok(dict),
            // Nested trailer written by some generators
            Object::Stream(stream) => Ok(stream.dict),
            other => Err(Error::InvalidXref(format!(
                "could not parse trailer dictionary, found {}",
                other.type_name()
            ))),
        }
    }

    fn table_obj(&self, parser: &mut Parser<'_>) -> Result<Object> {
        if parser.is_eof() {
            return Err(Error::MissingData(self.source.len()));
        }
        parser.get_obj()
    }

    /// Read subsections until `trailer`. Returns a parser positioned on the
    /// trailer dictionary.
    fn read_xref_table(&mut self, state: &mut TableState) -> Result<Parser<'static>> {
        let mut parser = Parser::from_state(
            Lexer::new(self.source.clone()),
            state.parser.clone(),
            None,
            true,
            self.options,
        )?;

        loop {
            let (mut first, count) = match (state.first, state.count) {
                (Some(first), Some(count)) => (first, count),
                _ => {
                    let obj = self.table_obj(&mut parser)?;
                    if obj.is_operator("trailer") {
                        break;
                    }
                    let count = self.table_obj(&mut parser)?;
                    match (obj.as_integer(), count.as_integer()) {
                        (Some(first), Some(count)) if (0..=MAX_SUBSECTION_COUNT).contains(&count) => {
                            state.first = Some(first);
                            state.count = Some(count);
                            (first, count)
                        },
                        _ => {
                            return Err(Error::InvalidXref(
                                "Invalid XRef table: wrong types in subsection header".to_string(),
                            ))
                        },
                    }
                },
            };
            log::trace!("Xref subsection {} {} from entry {}", first, count, state.entry_num);

            for i in state.entry_num..count {
                state.entry_num = i;
                state.parser = parser.save_state();

                let offset = self.table_obj(&mut parser)?;
                let gen = self.table_obj(&mut parser)?;
                let kind = self.table_obj(&mut parser)?;

                let (Some(offset), Some(gen)) = (offset.as_integer(), gen.as_integer()) else {
                    return Err(Error::InvalidXref(format!("Invalid entry in XRef subsection: {}, {}", first, count)));
                };
                let gen = u16::try_from(gen).unwrap_or(u16::MAX);
                let entry = if kind.is_operator("f") {
                    XRefEntry::Free {
                        next: offset.max(0) as u64,
                        gen,
                    }
                } else if kind.is_operator("n") && offset >= 0 {
                    XRefEntry::Uncompressed {
                        offset: offset as usize,
                        gen,
                    }
                } else {
                    return Err(Error::InvalidXref(format!("Invalid entry in XRef subsection: {}, {}", first, count)));
                };

                // Object 0 must be free; a first subsection starting at 1 with
                // a free first entry is off by one
                if i == 0 && entry.is_free() && first == 1 {
                    log::debug!("Shifting xref subsection starting at object 1 down by one");
                    first = 0;
                    state.first = Some(0);
                }

                if let Ok(num) = u32::try_from(first + i) {
                    self.entries.entry(num).or_insert(entry);
                }
            }

            state.entry_num = 0;
            state.parser = parser.save_state();
            state.first = None;
            state.count = None;
        }

        if self.entries.get(&0).is_some_and(|e| !e.is_free()) {
            return Err(Error::InvalidXref("Invalid XRef table: unexpected first object".to_string()));
        }
        Ok(parser)
    }

    fn process_xref_stream(&mut self, stream: &Stream) -> Result<()> {
        let dict = &stream.dict;
        let widths: Vec<usize> = dict
            .get("W")
            .and_then(Object::as_array)
            .map(|w| w.iter().map(|v| v.as_integer().and_then(|v| usize::try_from(v).ok())).collect())
            .and_then(|w: Vec<Option<usize>>| w.into_iter().collect())
            .filter(|w: &Vec<usize>| w.len() == 3)
            .ok_or_else(|| Error::InvalidXref("Invalid XRef stream /W".to_string()))?;
        if widths.iter().any(|&w| w > 8) {
            return Err(Error::InvalidXref(format!("XRef field width too large: {:?}", widths)));
        }

        let ranges: Vec<i64> = match dict.get("Index").and_then(Object::as_array) {
            Some(index) => index.iter().filter_map(Object::as_integer).collect(),
            None => vec![0, dict.get_integer("Size").unwrap_or(0)],
        };

        let data = stream.decode_with_options(&self.options)?;
        let entry_len: usize = widths.iter().sum();
        let mut pos = 0usize;

        for pair in ranges.chunks(2) {
            let [first, n] = *pair else {
                return Err(Error::InvalidXref(format!("Invalid XRef range fields: {:?}", pair)));
            };
            if first < 0 || n < 0 {
                return Err(Error::InvalidXref(format!("Invalid XRef range fields: {}, {}", first, n)));
            }
            for i in 0..n {
                if pos + entry_len > data.len() {
                    return Err(Error::InvalidXref("Invalid XRef byteWidths".to_string()));
                }
                let field = |start: usize, width: usize| -> u64 {
                    if width == 0 {
                        0
                    } else {
                        BigEndian::read_uint(&data[start..start + width], width)
                    }
                };
                let kind = if widths[0] == 0 { 1 } else { field(pos, widths[0]) };
                let f2 = field(pos + widths[0], widths[1]);
                let f3 = field(pos + widths[0] + widths[1], widths[2]);
                pos += entry_len;

                let entry = match kind {
                    0 => XRefEntry::Free {
                        next: f2,
                        gen: u16::try_from(f3).unwrap_or(u16::MAX),
                    },
                    1 => XRefEntry::Uncompressed {
                        offset: f2 as usize,
                        gen: u16::try_from(f3).unwrap_or(u16::MAX),
                    },
                    2 => XRefEntry::Compressed {
                        container: u32::try_from(f2)
                            .map_err(|_| Error::InvalidXref(format!("container number {} out of range", f2)))?,
                        index: u32::try_from(f3).unwrap_or(u32::MAX),
                    },
                    other => return Err(Error::InvalidXrefEntryType(other)),
                };
                if let Ok(num) = u32::try_from(first + i) {
                    self.entries.entry(num).or_insert(entry);
                }
            }
        }
        Ok(())
    }

    /// Rebuild the table from a scan of the whole buffer.
    fn index_objects(&mut self) -> Result<Dictionary> {
        self.entries.clear();
        self.cache.get_mut().clear();
        self.top_dict = None;
        self.table_state = None;
        self.start_queue.clear();
        self.xref_stms.clear();

        let scan = xref_reconstruction::scan(&self.source);
        for found in &scan.objects {
            // Later definitions belong to later updates
            self.entries.insert(
                found.id,
                XRefEntry::Uncompressed {
                    offset: found.offset,
                    gen: found.gen,
                },
            );
        }
        // Compressed entries only come from xref streams; they fill the gaps
        for &offset in &scan.xref_streams {
            self.start_queue.push_back(offset);
            if let Err(e) = self.read_xref(true) {
                log::info!("Ignoring xref stream at {} during recovery: {}", offset, e);
            }
        }

        let mut candidates: Vec<Dictionary> = Vec::new();
        for &offset in &scan.trailers {
            let Ok(mut parser) = self.parser_at(offset) else { continue };
            if !matches!(parser.get_obj(), Ok(ref o) if o.is_operator("trailer")) {
                continue;
            }
            if let Ok(Object::Dictionary(dict)) = parser.get_obj() {
                candidates.push(dict);
            }
        }
        // Newest trailer first
        candidates.reverse();
        if let Some(top) = self.top_dict.clone() {
            candidates.push(top);
        }

        for dict in candidates {
            if let Some(root) = dict.get("Root").and_then(Object::as_reference) {
                if self.is_valid_root(root) {
                    return Ok(dict);
                }
            }
        }

        for &catalog in scan.catalogs.iter().rev() {
            if self.is_valid_root(catalog) {
                log::info!("No usable trailer, using catalog {}", catalog);
                let mut trailer = Dictionary::new();
                trailer.insert("Root", Object::Reference(catalog));
                trailer.insert("Size", Object::Integer(self.entries.len() as i64));
                return Ok(trailer);
            }
        }

        Err(Error::TrailerNotFound)
    }

    /// Dereference `r`, memoized by object number.
    ///
    /// Free and missing entries resolve to `Null`. A fetch that re-enters
    /// itself through the objects it parses fails with
    /// [`Error::CircularReference`].
    pub fn fetch(&self, r: ObjectRef) -> Result<Object> {
        if let Some(obj) = self.cache.borrow().get(&r.id) {
            self.cache_hits.set(self.cache_hits.get() + 1);
            return Ok(obj.clone());
        }

        let entry = match self.entries.get(&r.id) {
            None | Some(XRefEntry::Free { .. }) => {
                log::trace!("Object {} is free or missing", r);
                self.cache.borrow_mut().insert(r.id, Object::Null);
                return Ok(Object::Null);
            },
            Some(entry) => *entry,
        };

        if !self.resolving.borrow_mut().insert(r) {
            log::warn!("Ignoring circular reference: {}", r);
            return Err(Error::CircularReference(r));
        }
        let result = match entry {
            XRefEntry::Uncompressed { offset, gen } => self.fetch_uncompressed(r, offset, gen),
            XRefEntry::Compressed { container, index } => self.fetch_compressed(r, container, index),
            XRefEntry::Free { .. } => Ok(Object::Null),
        };
        self.resolving.borrow_mut().remove(&r);
        result
    }

    fn fetch_uncompressed(&self, r: ObjectRef, offset: usize, gen: u16) -> Result<Object> {
        if gen != r.gen {
            return Err(Error::BadXrefEntry(r, format!("inconsistent generation {} in table", gen)));
        }
        if offset >= self.source.len() {
            return Err(Error::BadXrefEntry(r, format!("offset {} past end of data", offset)));
        }

        let mut lexer = Lexer::new(self.source.clone());
        lexer.set_position(offset);
        let mut parser = Parser::new(lexer, Some(self as &dyn Resolve), true, self.options)?;

        let num = parser.get_obj()?;
        let obj_gen = parser.get_obj()?;
        let keyword = parser.get_obj()?;
        if num.as_integer() != Some(i64::from(r.id))
            || obj_gen.as_integer() != Some(i64::from(r.gen))
            || !keyword.is_operator("obj")
        {
            return Err(Error::BadXrefEntry(r, "object header does not match".to_string()));
        }

        let obj = parser.get_obj()?;
        self.objects_parsed.set(self.objects_parsed.get() + 1);
        self.cache.borrow_mut().insert(r.id, obj.clone());
        Ok(obj)
    }

    fn fetch_compressed(&self, r: ObjectRef, container: u32, index: u32) -> Result<Object> {
        let Object::Stream(stream) = self.fetch(ObjectRef::new(container, 0))? else {
            return Err(Error::InvalidObjectStream(container, "container is not a stream".to_string()));
        };

        let objects = parse_object_stream(container, &stream, Some(self as &dyn Resolve), &self.options)?;
        self.objects_parsed.set(self.objects_parsed.get() + 1);

        let mut requested = None;
        {
            let mut cache = self.cache.borrow_mut();
            for embedded in objects {
                let owned = matches!(
                    self.entries.get(&embedded.number),
                    Some(XRefEntry::Compressed { container: c, index: i }) if *c == container && *i == embedded.index
                );
                if embedded.index == index {
                    requested = Some(embedded.object.clone());
                }
                if owned {
                    cache.entry(embedded.number).or_insert(embedded.object);
                }
            }
        }

        requested.ok_or_else(|| Error::BadXrefEntry(r, format!("no index {} in object stream {}", index, container)))
    }
}

impl Resolve for XRef {
    fn fetch(&self, r: ObjectRef) -> Result<Object> {
        XRef::fetch(self, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Assemble objects and a classic table, returning (bytes, startxref).
    fn classic(objects: &[(u32, &str)], extra_trailer: &str) -> (Vec<u8>, usize) {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (num, body) in objects {
            offsets.push((*num, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());
        }
        let start = out.len();
        let size = objects.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
        for n in 1..size {
            match offsets.iter().find(|(num, _)| *num == n) {
                Some((_, off)) => out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n", size, extra_trailer, start)
                .as_bytes(),
        );
        (out, start)
    }

    fn basic_objects() -> Vec<(u32, &'static str)> {
        vec![
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [] /Count 0 >>"),
            (3, "(three)"),
        ]
    }

    fn open(data: Vec<u8>, start: usize) -> XRef {
        let mut xref = XRef::new(data, ParserOptions::default());
        xref.set_start_xref(start);
        xref.parse(false).unwrap();
        xref
    }

    #[test]
    fn test_classic_table() {
        let (data, start) = classic(&basic_objects(), "");
        let xref = open(data, start);
        assert_eq!(xref.root_ref(), Some(ObjectRef::new(1, 0)));
        assert_eq!(xref.len(), 4);
        assert!(xref.entry(0).unwrap().is_free());
        assert_eq!(xref.fetch(ObjectRef::new(3, 0)).unwrap(), Object::String(b"three".to_vec()));
    }

    #[test]
    fn test_fetch_is_memoized() {
        let (data, start) = classic(&basic_objects(), "");
        let xref = open(data, start);
        let before = xref.stats().objects_parsed;
        let a = xref.fetch(ObjectRef::new(3, 0)).unwrap();
        let b = xref.fetch(ObjectRef::new(3, 0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(xref.stats().objects_parsed, before + 1);
        assert!(xref.stats().cache_hits >= 1);
    }

    #[test]
    fn test_free_and_missing_fetch_null() {
        let (data, start) = classic(&basic_objects(), "");
        let xref = open(data, start);
        assert_eq!(xref.fetch(ObjectRef::new(0, 65535)).unwrap(), Object::Null);
        assert_eq!(xref.fetch(ObjectRef::new(99, 0)).unwrap(), Object::Null);
    }

    #[test]
    fn test_header_mismatch_is_fatal() {
        let (mut data, start) = classic(&basic_objects(), "");
        // Point object 3 at object 2's header
        let off2 = data.windows(7).position(|w| w == b"2 0 obj").unwrap();
        let line = format!("{:010} 00000 n \n", off2);
        let entry3 = start + "xref\n0 4\n".len() + 3 * 20;
        data[entry3..entry3 + 20].copy_from_slice(line.as_bytes());
        let xref = open(data, start);
        assert!(matches!(xref.fetch(ObjectRef::new(3, 0)), Err(Error::BadXrefEntry(_, _))));
    }

    #[test]
    fn test_hp_off_by_one_shift() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let off1 = data.len();
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let off2 = data.len();
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let start = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\n",
                off1, off2
            )
            .as_bytes(),
        );
        let xref = open(data, start);
        assert!(xref.entry(0).unwrap().is_free());
        assert_eq!(xref.entry(1), Some(&XRefEntry::Uncompressed { offset: off1, gen: 0 }));
        assert_eq!(xref.entry(3), None);
    }

    #[test]
    fn test_first_writer_wins_across_prev() {
        let (mut data, first_start) = classic(&basic_objects(), "");
        // Incremental update redefining object 3
        let new3 = data.len();
        data.extend_from_slice(b"3 0 obj\n(updated)\nendobj\n");
        let second_start = data.len();
        data.extend_from_slice(
            format!(
                "xref\n3 1\n{:010} 00000 n \ntrailer\n<< /Size 4 /Root 1 0 R /Prev {} >>\n",
                new3, first_start
            )
            .as_bytes(),
        );
        let xref = open(data, second_start);
        assert_eq!(xref.fetch(ObjectRef::new(3, 0)).unwrap(), Object::String(b"updated".to_vec()));
        assert_eq!(xref.trailer().and_then(|t| t.get_integer("Prev")), Some(first_start as i64));
    }

    #[test]
    fn test_prev_cycle_terminates() {
        let (data, start) = classic(&basic_objects(), "");
        let text = String::from_utf8(data).unwrap();
        let looped = text.replacen("/Root 1 0 R", &format!("/Root 1 0 R /Prev {}", start), 1);
        let xref = open(looped.into_bytes(), start);
        assert_eq!(xref.root_ref(), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_resumable_table() {
        let (data, start) = classic(&basic_objects(), "");
        // Cut in the middle of the third entry
        let cut = start + "xref\n0 4\n".len() + 2 * 20 + 7;
        let mut xref = XRef::new(data[..cut].to_vec(), ParserOptions::default());
        xref.set_start_xref(start);

        assert!(matches!(xref.parse(false), Err(Error::MissingData(_))));
        let state = xref.table_state().cloned().unwrap();
        assert_eq!(state.entry_num, 2);
        assert_eq!(xref.len(), 2);

        xref.supply_data(Bytes::copy_from_slice(&data[cut..]));
        xref.parse(false).unwrap();
        assert!(xref.table_state().is_none());
        assert_eq!(xref.len(), 4);
        assert_eq!(xref.fetch(ObjectRef::new(3, 0)).unwrap(), Object::String(b"three".to_vec()));
    }

    #[test]
    fn test_object_zero_must_be_free() {
        let (data, start) = classic(&basic_objects(), "");
        let text = String::from_utf8(data).unwrap();
        let broken = text.replacen("0000000000 65535 f", "0000000009 00000 n", 1);
        let mut xref = XRef::new(broken.into_bytes(), ParserOptions::default());
        xref.set_start_xref(start);
        assert!(xref.parse(false).is_err());
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// Catalog and pages inside an object stream, indexed by an xref stream.
    fn with_object_stream() -> (Vec<u8>, usize) {
        let mut data = b"%PDF-1.5\n".to_vec();
        let members = b"1 0 2 44 << /Type /Catalog /Pages 2 0 R >>   << /Type /Pages /Kids [] /Count 0 >>";
        let packed = zlib(members);
        let off5 = data.len();
        data.extend_from_slice(
            format!("5 0 obj\n<< /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode /Length {} >>\nstream\n", packed.len())
                .as_bytes(),
        );
        data.extend_from_slice(&packed);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        // type, offset (2 bytes), gen
        let mut rows: Vec<u8> = vec![0, 0, 0, 255];
        rows.extend_from_slice(&[2, 0, 5, 0]);
        rows.extend_from_slice(&[2, 0, 5, 1]);
        rows.extend_from_slice(&[1, (off5 >> 8) as u8, (off5 & 0xff) as u8, 0]);
        let start = data.len();
        rows.extend_from_slice(&[1, (start >> 8) as u8, (start & 0xff) as u8, 0]);
        let packed_rows = zlib(&rows);
        data.extend_from_slice(
            format!(
                "6 0 obj\n<< /Type /XRef /Size 7 /Index [0 3 5 2] /W [1 2 1] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
                packed_rows.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&packed_rows);
        data.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", start).as_bytes());
        (data, start)
    }

    #[test]
    fn test_xref_stream_and_object_stream() {
        let (data, start) = with_object_stream();
        let xref = open(data, start);
        assert_eq!(xref.entry(1), Some(&XRefEntry::Compressed { container: 5, index: 0 }));
        assert_eq!(xref.root_ref(), Some(ObjectRef::new(1, 0)));
        // Validating the root parsed the container once and cached both members
        assert!(xref.is_cached(1));
        assert!(xref.is_cached(2));
        let pages = xref.fetch(ObjectRef::new(2, 0)).unwrap();
        assert!(pages.as_dict().unwrap().is_type("Pages"));
    }

    #[test]
    fn test_invalid_xref_stream_entry_type_is_fatal() {
        let rows = zlib(&[0, 0, 0, 255, 7, 0, 9, 0]);
        let mut data = b"%PDF-1.5\n".to_vec();
        let start = data.len();
        data.extend_from_slice(
            format!(
                "1 0 obj\n<< /Type /XRef /Size 2 /W [1 2 1] /Filter /FlateDecode /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&rows);
        data.extend_from_slice(b"\nendstream\nendobj\n");
        let mut xref = XRef::new(data, ParserOptions::default());
        xref.set_start_xref(start);
        assert!(matches!(xref.parse(false), Err(Error::InvalidXrefEntryType(7))));
    }

    #[test]
    fn test_recovery_mode_rebuilds_table() {
        let (data, _) = classic(&basic_objects(), "");
        let mut xref = XRef::new(data, ParserOptions::default());
        // Garbage start offset
        xref.set_start_xref(3);
        assert!(xref.parse(false).is_err());
        xref.parse(true).unwrap();
        assert_eq!(xref.root_ref(), Some(ObjectRef::new(1, 0)));
        assert_eq!(xref.fetch(ObjectRef::new(3, 0)).unwrap(), Object::String(b"three".to_vec()));
    }

    #[test]
    fn test_recovery_without_trailer_uses_catalog() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n".to_vec();
        let mut xref = XRef::new(data, ParserOptions::default());
        xref.parse(true).unwrap();
        assert_eq!(xref.root_ref(), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_self_referential_length_is_circular() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let off = data.len();
        data.extend_from_slice(b"1 0 obj\n<< /Length 1 0 R >>\nstream\nabc\nendstream\nendobj\n");
        let start = data.len();
        data.extend_from_slice(format!("xref\n0 2\n0000000000 65535 f \n{:010} 00000 n \ntrailer\n<< /Size 2 >>\n", off).as_bytes());
        let mut xref = XRef::new(data, ParserOptions::default());
        xref.set_start_xref(start);
        // No /Root, so parse reports it, but the table itself was read
        assert!(xref.parse(false).is_err());
        // The cyclic /Length falls back to scanning for endstream
        let obj = xref.fetch(ObjectRef::new(1, 0)).unwrap();
        assert_eq!(&obj.as_stream().unwrap().raw_data()[..], b"abc");
    }
}
