//! Font dictionaries reduced to what text runs need.
//!
//! A [`Font`] maps the bytes of a string operand to [`Glyph`]s: character
//! codes, Unicode text and advance widths. Simple fonts (Type1, TrueType,
//! Type3) use one byte per code; Type0 fonts use two. Fonts are loaded once
//! per document through the [`FontCache`] and announced to the consumer the
//! first time a page uses them.

use crate::content::graphics_state::Matrix;
use crate::content::operators::Glyph;
use crate::error::{Error, Result};
use crate::fonts::cmap::ToUnicode;
use crate::fonts::encoding::{glyph_name_to_unicode, BaseEncoding};
use crate::object::{Dictionary, Object, ObjectRef, Resolve};
use bitflags::bitflags;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

bitflags! {
    /// Font descriptor flags.
    ///
    /// ISO 32000-1 Table 123 (Font flags).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontFlags: u32 {
        /// Bit 1: All glyphs have the same width
        const FIXED_PITCH = 1 << 0;
        /// Bit 2: Glyphs have serifs
        const SERIF = 1 << 1;
        /// Bit 3: Font contains glyphs outside the standard Latin set
        const SYMBOLIC = 1 << 2;
        /// Bit 4: Glyphs resemble cursive handwriting
        const SCRIPT = 1 << 3;
        /// Bit 6: Font uses the standard Latin character set
        const NONSYMBOLIC = 1 << 5;
        /// Bit 7: Glyphs have dominant vertical strokes that are slanted
        const ITALIC = 1 << 6;
        /// Bit 17: No lowercase letters
        const ALL_CAP = 1 << 16;
        /// Bit 18: Lowercase letters are small capitals
        const SMALL_CAP = 1 << 17;
        /// Bit 19: Bold glyphs are painted with extra pixels
        const FORCE_BOLD = 1 << 18;
    }
}

/// Font dictionary subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontKind {
    /// Type1 or MMType1
    Type1,
    /// TrueType
    TrueType,
    /// Type3 (glyphs are content streams)
    Type3,
    /// Type0 composite font
    Type0,
    /// Missing or unrecognised subtype
    Unknown,
}

impl FontKind {
    fn from_subtype(subtype: Option<&str>) -> FontKind {
        match subtype {
            Some("Type1") | Some("MMType1") => FontKind::Type1,
            Some("TrueType") => FontKind::TrueType,
            Some("Type3") => FontKind::Type3,
            Some("Type0") => FontKind::Type0,
            _ => FontKind::Unknown,
        }
    }
}

/// Font properties sent to the consumer once per font.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontExport {
    /// Stable font identifier
    pub id: String,
    /// /BaseFont (subset prefix kept)
    pub base_font: String,
    /// Font subtype
    pub kind: FontKind,
    /// Descriptor flags as an integer
    pub flags: u32,
    /// Bold by flags, weight or name
    pub bold: bool,
    /// Italic by flags, angle or name
    pub italic: bool,
    /// Glyph space to text space
    pub font_matrix: [f64; 6],
    /// Explicit widths in glyph space, by code
    pub widths: BTreeMap<u32, f64>,
    /// Width used for codes without an explicit width
    pub default_width: f64,
    /// Descriptor ascent
    pub ascent: f64,
    /// Descriptor descent
    pub descent: f64,
}

/// A loaded font.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    id: String,
    base_font: String,
    kind: FontKind,
    flags: FontFlags,
    bold: bool,
    italic: bool,
    font_matrix: Matrix,
    widths: HashMap<u32, f64>,
    default_width: f64,
    ascent: f64,
    descent: f64,
    two_byte: bool,
    base_encoding: Option<BaseEncoding>,
    differences: HashMap<u8, String>,
    to_unicode: Option<ToUnicode>,
}

/// Width of codes in fonts that carry no metrics at all.
const UNKNOWN_WIDTH: f64 = 500.0;

impl Font {
    /// Load a font from its dictionary.
    pub fn load(id: impl Into<String>, dict: &Dictionary, resolver: &dyn Resolve) -> Result<Font> {
        let id = id.into();
        let kind = FontKind::from_subtype(dict.get_name("Subtype"));
        let base_font = dict.get_name("BaseFont").unwrap_or_default().to_string();

        let mut font = Font::fallback(id);
        font.kind = kind;
        font.base_font = base_font;

        let to_unicode = match dict.get_resolved("ToUnicode", resolver)? {
            Some(Object::Stream(stream)) => match stream.decode() {
                Ok(data) => Some(ToUnicode::parse(&data)),
                Err(e) => {
                    log::warn!("ToUnicode stream of font {} failed to decode: {}", font.id, e);
                    None
                },
            },
            _ => None,
        };
        font.to_unicode = to_unicode;

        let descriptor_source = if kind == FontKind::Type0 {
            let descendant = descendant_font(dict, resolver)?;
            font.two_byte = true;
            match dict.get_resolved("Encoding", resolver)? {
                Some(Object::Name(n)) if n.as_str() == "Identity-H" || n.as_str() == "Identity-V" => {},
                Some(other) => log::warn!(
                    "Font {} uses CMap encoding {:?}; codes are read as two bytes",
                    font.id,
                    other.as_name().unwrap_or(other.type_name())
                ),
                None => log::warn!("Type0 font {} has no /Encoding", font.id),
            }
            font.default_width = descendant.get_number("DW").unwrap_or(1000.0);
            if let Some(w) = descendant.get_resolved("W", resolver)? {
                font.widths = cid_widths(&w, resolver)?;
            }
            descendant
        } else {
            font.read_simple_widths(dict, resolver)?;
            font.read_encoding(dict, resolver)?;
            if kind == FontKind::Type3 {
                if let Some(m) = dict
                    .get("FontMatrix")
                    .and_then(|m| m.as_number_array())
                    .and_then(|v| Matrix::from_slice(&v))
                {
                    font.font_matrix = m;
                }
            }
            dict.clone()
        };

        if let Some(Object::Dictionary(descriptor)) = descriptor_source.get_resolved("FontDescriptor", resolver)? {
            font.read_descriptor(&descriptor);
        }
        font.infer_style();

        log::debug!(
            "Loaded font {} ({:?} {}) with {} widths",
            font.id,
            font.kind,
            font.base_font,
            font.widths.len()
        );
        Ok(font)
    }

    /// A font with no metrics, used when a font resource is missing or broken.
    pub fn fallback(id: impl Into<String>) -> Font {
        Font {
            id: id.into(),
            base_font: String::new(),
            kind: FontKind::Unknown,
            flags: FontFlags::empty(),
            bold: false,
            italic: false,
            font_matrix: Matrix::scaling(0.001, 0.001),
            widths: HashMap::new(),
            default_width: UNKNOWN_WIDTH,
            ascent: 0.0,
            descent: 0.0,
            two_byte: false,
            base_encoding: Some(BaseEncoding::Standard),
            differences: HashMap::new(),
            to_unicode: None,
        }
    }

    fn read_simple_widths(&mut self, dict: &Dictionary, resolver: &dyn Resolve) -> Result<()> {
        let first_char = dict.get_integer("FirstChar").unwrap_or(0);
        if let Some(Object::Array(widths)) = dict.get_resolved("Widths", resolver)? {
            for (i, w) in widths.iter().enumerate() {
                let width = resolver.resolve(w)?.as_number().unwrap_or(0.0);
                if let Ok(code) = u32::try_from(first_char + i as i64) {
                    self.widths.insert(code, width);
                }
            }
            // Codes outside /Widths use /MissingWidth, which defaults to 0
            self.default_width = 0.0;
        }
        Ok(())
    }

    fn read_encoding(&mut self, dict: &Dictionary, resolver: &dyn Resolve) -> Result<()> {
        self.base_encoding = match self.kind {
            FontKind::TrueType => Some(BaseEncoding::WinAnsi),
            FontKind::Type3 => None,
            _ => Some(BaseEncoding::Standard),
        };

        match dict.get_resolved("Encoding", resolver)? {
            Some(Object::Name(name)) => match BaseEncoding::from_name(name.as_str()) {
                Some(enc) => self.base_encoding = Some(enc),
                None => log::warn!("Font {} names unknown encoding /{}", self.id, name),
            },
            Some(Object::Dictionary(enc)) => {
                if let Some(base) = enc.get_name("BaseEncoding").and_then(BaseEncoding::from_name) {
                    self.base_encoding = Some(base);
                }
                if let Some(Object::Array(diffs)) = enc.get_resolved("Differences", resolver)? {
                    self.read_differences(&diffs);
                }
            },
            Some(other) => log::warn!("Font {} has a {} /Encoding", self.id, other.type_name()),
            None => {},
        }
        Ok(())
    }

    /// `[code name name ... code name ...]`
    fn read_differences(&mut self, diffs: &[Object]) {
        let mut code: Option<i64> = None;
        for item in diffs {
            match item {
                Object::Integer(start) => code = Some(*start),
                Object::Name(name) => match code {
                    Some(c) => {
                        if let Ok(byte) = u8::try_from(c) {
                            self.differences.insert(byte, name.as_str().to_string());
                        }
                        code = Some(c + 1);
                    },
                    None => log::warn!("Differences array names /{} before any code", name),
                },
                other => log::warn!("Unexpected {} in Differences array", other.type_name()),
            }
        }
    }

    fn read_descriptor(&mut self, descriptor: &Dictionary) {
        if let Some(flags) = descriptor.get_integer("Flags") {
            self.flags = FontFlags::from_bits_truncate(flags as u32);
        }
        self.ascent = descriptor.get_number("Ascent").unwrap_or(0.0);
        self.descent = descriptor.get_number("Descent").unwrap_or(0.0);
        if !self.two_byte && !self.widths.is_empty() {
            self.default_width = descriptor.get_number("MissingWidth").unwrap_or(self.default_width);
        }
        let weight = descriptor.get_number("FontWeight").unwrap_or(0.0);
        let angle = descriptor.get_number("ItalicAngle").unwrap_or(0.0);
        self.bold = weight >= 700.0;
        self.italic = angle != 0.0;
    }

    /// Bold and italic from flags, descriptor values and the font name.
    fn infer_style(&mut self) {
        let name = self.base_font.to_ascii_lowercase();
        self.bold = self.bold
            || self.flags.contains(FontFlags::FORCE_BOLD)
            || ["bold", "black", "heavy", "semibold", "demi"].iter().any(|w| name.contains(w));
        self.italic = self.italic
            || self.flags.contains(FontFlags::ITALIC)
            || name.contains("italic")
            || name.contains("oblique");
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// /BaseFont value.
    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    /// Font subtype.
    pub fn kind(&self) -> FontKind {
        self.kind
    }

    /// Descriptor flags.
    pub fn flags(&self) -> FontFlags {
        self.flags
    }

    /// Glyph space to text space.
    pub fn font_matrix(&self) -> Matrix {
        self.font_matrix
    }

    /// Codes are two bytes wide.
    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Glyph-space width of a code.
    pub fn glyph_width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// Unicode text for a code.
    pub fn to_unicode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.get(code)) {
            return text.to_string();
        }
        if !self.two_byte {
            if let Ok(byte) = u8::try_from(code) {
                if let Some(c) = self.differences.get(&byte).and_then(|name| glyph_name_to_unicode(name)) {
                    return c.to_string();
                }
                if let Some(c) = self.base_encoding.and_then(|enc| enc.lookup(byte)) {
                    return c.to_string();
                }
                if byte >= 0x20 {
                    return char::from(byte).to_string();
                }
                return String::new();
            }
        }
        match char::from_u32(code) {
            Some(c) if !c.is_control() => c.to_string(),
            _ => char::REPLACEMENT_CHARACTER.to_string(),
        }
    }

    /// Map string operand bytes to glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let codes: Vec<u32> = if self.two_byte {
            if bytes.len() % 2 != 0 {
                log::warn!("Odd byte count {} for two-byte font {}", bytes.len(), self.id);
            }
            bytes
                .chunks_exact(2)
                .map(|pair| u32::from(u16::from_be_bytes([pair[0], pair[1]])))
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        };

        let scale = self.font_matrix.a;
        codes
            .into_iter()
            .map(|code| Glyph {
                code,
                unicode: self.to_unicode(code),
                width: self.glyph_width(code) * scale,
                is_space: !self.two_byte && code == 32,
            })
            .collect()
    }

    /// Properties sent to the consumer.
    pub fn export(&self) -> FontExport {
        FontExport {
            id: self.id.clone(),
            base_font: self.base_font.clone(),
            kind: self.kind,
            flags: self.flags.bits(),
            bold: self.bold,
            italic: self.italic,
            font_matrix: self.font_matrix.to_array(),
            widths: self.widths.iter().map(|(k, v)| (*k, *v)).collect(),
            default_width: self.default_width,
            ascent: self.ascent,
            descent: self.descent,
        }
    }
}

fn descendant_font(dict: &Dictionary, resolver: &dyn Resolve) -> Result<Dictionary> {
    let first = match dict.get_resolved("DescendantFonts", resolver)? {
        Some(Object::Array(fonts)) => fonts.into_iter().next(),
        _ => None,
    };
    match first.map(|f| resolver.resolve(&f)).transpose()? {
        Some(Object::Dictionary(d)) => Ok(d),
        _ => Err(Error::Font("Type0 font without a descendant font".to_string())),
    }
}

/// CID widths: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(w: &Object, resolver: &dyn Resolve) -> Result<HashMap<u32, f64>> {
    let mut widths = HashMap::new();
    let Some(items) = w.as_array() else {
        return Ok(widths);
    };
    let mut i = 0;
    while i < items.len() {
        let Some(first) = items[i].as_integer().and_then(|v| u32::try_from(v).ok()) else {
            log::warn!("Malformed /W entry at position {}", i);
            break;
        };
        match items.get(i + 1).map(|o| resolver.resolve(o)).transpose()? {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    widths.insert(first + offset as u32, width.as_number().unwrap_or(0.0));
                }
                i += 2;
            },
            Some(last) => {
                let last = last.as_integer().and_then(|v| u32::try_from(v).ok()).unwrap_or(first);
                let width = items.get(i + 2).and_then(|o| o.as_number()).unwrap_or(0.0);
                for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                    widths.insert(cid, width);
                }
                i += 3;
            },
            None => break,
        }
    }
    Ok(widths)
}

/// Fonts loaded for one document, keyed by reference.
///
/// A font is announced (exported) the first time it is handed out, so the
/// consumer receives its metadata exactly once per document.
#[derive(Debug, Default)]
pub struct FontCache {
    by_ref: HashMap<ObjectRef, Arc<Font>>,
    inline: HashMap<String, Arc<Font>>,
    announced: HashSet<String>,
}

impl FontCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the font a resource entry points to.
    ///
    /// Returns the font and whether this is its first use. Broken fonts are
    /// logged and replaced by [`Font::fallback`] under the same identifier.
    pub fn load(&mut self, value: &Object, resolver: &dyn Resolve) -> (Arc<Font>, bool) {
        let font = match value {
            Object::Reference(r) => {
                if let Some(font) = self.by_ref.get(r) {
                    Arc::clone(font)
                } else {
                    let id = format!("font_{}_{}", r.id, r.gen);
                    let font = Arc::new(load_or_fallback(id, resolver.fetch(*r), resolver));
                    self.by_ref.insert(*r, Arc::clone(&font));
                    font
                }
            },
            direct => {
                let key = format!("{:?}", direct);
                if let Some(font) = self.inline.get(&key) {
                    Arc::clone(font)
                } else {
                    let id = format!("font_inline_{}", self.inline.len());
                    let font = Arc::new(load_or_fallback(id, Ok(direct.clone()), resolver));
                    self.inline.insert(key, Arc::clone(&font));
                    font
                }
            },
        };
        let first_use = self.announced.insert(font.id().to_string());
        (font, first_use)
    }

    /// Number of loaded fonts.
    pub fn len(&self) -> usize {
        self.by_ref.len() + self.inline.len()
    }

    /// True if no font was loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every font. Fonts loaded afterwards are announced again.
    pub fn clear(&mut self) {
        self.by_ref.clear();
        self.inline.clear();
        self.announced.clear();
    }
}

fn load_or_fallback(id: String, fetched: Result<Object>, resolver: &dyn Resolve) -> Font {
    let loaded = fetched.and_then(|obj| match obj.as_dict() {
        Some(dict) => Font::load(id.clone(), dict, resolver),
        None => Err(Error::Font(format!("font object is a {}", obj.type_name()))),
    });
    match loaded {
        Ok(font) => font,
        Err(e) => {
            log::warn!("Font {} could not be loaded ({}); using a fallback font", id, e);
            Font::fallback(id)
        },
    }
}
