//! Font handling: encodings, ToUnicode maps and the per-document font cache.

pub mod cmap;
pub mod encoding;
pub mod font;

pub use cmap::ToUnicode;
pub use encoding::{decode_text_string, glyph_name_to_unicode, BaseEncoding};
pub use font::{Font, FontCache, FontExport, FontFlags, FontKind};
