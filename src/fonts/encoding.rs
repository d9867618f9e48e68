//! Simple-font encodings and glyph names.
//!
//! A simple font maps one byte to a glyph name through a base encoding,
//! optionally patched by a `/Differences` array. Glyph names are mapped to
//! Unicode through a static table plus the `uniXXXX` / `uXXXX` conventions.

use phf::phf_map;

/// Base encodings a font dictionary can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    /// StandardEncoding (the Type 1 default)
    Standard,
    /// WinAnsiEncoding
    WinAnsi,
    /// MacRomanEncoding
    MacRoman,
    /// PDFDocEncoding (used for text strings, occasionally by fonts)
    PdfDoc,
}

impl BaseEncoding {
    /// Look up an encoding by its PDF name.
    pub fn from_name(name: &str) -> Option<BaseEncoding> {
        match name {
            "StandardEncoding" => Some(BaseEncoding::Standard),
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" | "MacExpertEncoding" => Some(BaseEncoding::MacRoman),
            "PDFDocEncoding" => Some(BaseEncoding::PdfDoc),
            _ => None,
        }
    }

    /// Character a code maps to.
    pub fn lookup(self, code: u8) -> Option<char> {
        match self {
            BaseEncoding::Standard => standard_lookup(code),
            BaseEncoding::WinAnsi => winansi_lookup(code),
            BaseEncoding::MacRoman => macroman_lookup(code),
            BaseEncoding::PdfDoc => pdfdoc_lookup(code),
        }
    }
}

/// Glyph names that are not a single ASCII letter.
static GLYPH_NAMES: phf::Map<&'static str, char> = phf_map! {
    "space" => ' ', "exclam" => '!', "quotedbl" => '"', "numbersign" => '#',
    "dollar" => '$', "percent" => '%', "ampersand" => '&', "quotesingle" => '\'',
    "quoteright" => '\u{2019}', "parenleft" => '(', "parenright" => ')', "asterisk" => '*',
    "plus" => '+', "comma" => ',', "hyphen" => '-', "period" => '.', "slash" => '/',
    "zero" => '0', "one" => '1', "two" => '2', "three" => '3', "four" => '4',
    "five" => '5', "six" => '6', "seven" => '7', "eight" => '8', "nine" => '9',
    "colon" => ':', "semicolon" => ';', "less" => '<', "equal" => '=', "greater" => '>',
    "question" => '?', "at" => '@', "bracketleft" => '[', "backslash" => '\\',
    "bracketright" => ']', "asciicircum" => '^', "underscore" => '_', "grave" => '`',
    "quoteleft" => '\u{2018}', "braceleft" => '{', "bar" => '|', "braceright" => '}',
    "asciitilde" => '~', "exclamdown" => '\u{00A1}', "cent" => '\u{00A2}',
    "sterling" => '\u{00A3}', "fraction" => '\u{2044}', "yen" => '\u{00A5}',
    "florin" => '\u{0192}', "section" => '\u{00A7}', "currency" => '\u{00A4}',
    "quotedblleft" => '\u{201C}', "guillemotleft" => '\u{00AB}', "guilsinglleft" => '\u{2039}',
    "guilsinglright" => '\u{203A}', "fi" => '\u{FB01}', "fl" => '\u{FB02}', "ff" => '\u{FB00}',
    "ffi" => '\u{FB03}', "ffl" => '\u{FB04}', "endash" => '\u{2013}', "dagger" => '\u{2020}',
    "daggerdbl" => '\u{2021}', "periodcentered" => '\u{00B7}', "paragraph" => '\u{00B6}',
    "bullet" => '\u{2022}', "quotesinglbase" => '\u{201A}', "quotedblbase" => '\u{201E}',
    "quotedblright" => '\u{201D}', "guillemotright" => '\u{00BB}', "ellipsis" => '\u{2026}',
    "perthousand" => '\u{2030}', "questiondown" => '\u{00BF}', "acute" => '\u{00B4}',
    "circumflex" => '\u{02C6}', "tilde" => '\u{02DC}', "macron" => '\u{00AF}',
    "breve" => '\u{02D8}', "dotaccent" => '\u{02D9}', "dieresis" => '\u{00A8}',
    "ring" => '\u{02DA}', "cedilla" => '\u{00B8}', "hungarumlaut" => '\u{02DD}',
    "ogonek" => '\u{02DB}', "caron" => '\u{02C7}', "emdash" => '\u{2014}', "AE" => '\u{00C6}',
    "ordfeminine" => '\u{00AA}', "Lslash" => '\u{0141}', "Oslash" => '\u{00D8}', "OE" => '\u{0152}',
    "ordmasculine" => '\u{00BA}', "ae" => '\u{00E6}', "dotlessi" => '\u{0131}',
    "lslash" => '\u{0142}', "oslash" => '\u{00F8}', "oe" => '\u{0153}', "germandbls" => '\u{00DF}',
    "Euro" => '\u{20AC}', "trademark" => '\u{2122}', "copyright" => '\u{00A9}',
    "registered" => '\u{00AE}', "degree" => '\u{00B0}', "plusminus" => '\u{00B1}',
    "multiply" => '\u{00D7}', "divide" => '\u{00F7}', "minus" => '\u{2212}',
    "mu" => '\u{00B5}', "logicalnot" => '\u{00AC}', "brokenbar" => '\u{00A6}',
    "onehalf" => '\u{00BD}', "onequarter" => '\u{00BC}', "threequarters" => '\u{00BE}',
    "onesuperior" => '\u{00B9}', "twosuperior" => '\u{00B2}', "threesuperior" => '\u{00B3}',
    "nbspace" => '\u{00A0}', "sfthyphen" => '\u{00AD}', "Scaron" => '\u{0160}',
    "scaron" => '\u{0161}', "Zcaron" => '\u{017D}', "zcaron" => '\u{017E}',
    "Ydieresis" => '\u{0178}', "Eth" => '\u{00D0}', "eth" => '\u{00F0}', "Thorn" => '\u{00DE}',
    "thorn" => '\u{00FE}', "Agrave" => '\u{00C0}', "Aacute" => '\u{00C1}',
    "Acircumflex" => '\u{00C2}', "Atilde" => '\u{00C3}', "Adieresis" => '\u{00C4}',
    "Aring" => '\u{00C5}', "Ccedilla" => '\u{00C7}', "Egrave" => '\u{00C8}',
    "Eacute" => '\u{00C9}', "Ecircumflex" => '\u{00CA}', "Edieresis" => '\u{00CB}',
    "Igrave" => '\u{00CC}', "Iacute" => '\u{00CD}', "Icircumflex" => '\u{00CE}',
    "Idieresis" => '\u{00CF}', "Ntilde" => '\u{00D1}', "Ograve" => '\u{00D2}',
    "Oacute" => '\u{00D3}', "Ocircumflex" => '\u{00D4}', "Otilde" => '\u{00D5}',
    "Odieresis" => '\u{00D6}', "Ugrave" => '\u{00D9}', "Uacute" => '\u{00DA}',
    "Ucircumflex" => '\u{00DB}', "Udieresis" => '\u{00DC}', "Yacute" => '\u{00DD}',
    "agrave" => '\u{00E0}', "aacute" => '\u{00E1}', "acircumflex" => '\u{00E2}',
    "atilde" => '\u{00E3}', "adieresis" => '\u{00E4}', "aring" => '\u{00E5}',
    "ccedilla" => '\u{00E7}', "egrave" => '\u{00E8}', "eacute" => '\u{00E9}',
    "ecircumflex" => '\u{00EA}', "edieresis" => '\u{00EB}', "igrave" => '\u{00EC}',
    "iacute" => '\u{00ED}', "icircumflex" => '\u{00EE}', "idieresis" => '\u{00EF}',
    "ntilde" => '\u{00F1}', "ograve" => '\u{00F2}', "oacute" => '\u{00F3}',
    "ocircumflex" => '\u{00F4}', "otilde" => '\u{00F5}', "odieresis" => '\u{00F6}',
    "ugrave" => '\u{00F9}', "uacute" => '\u{00FA}', "ucircumflex" => '\u{00FB}',
    "udieresis" => '\u{00FC}', "yacute" => '\u{00FD}', "ydieresis" => '\u{00FF}',
    "arrowleft" => '\u{2190}', "arrowright" => '\u{2192}', "arrowup" => '\u{2191}',
    "arrowdown" => '\u{2193}', "lozenge" => '\u{25CA}', "notequal" => '\u{2260}',
    "lessequal" => '\u{2264}', "greaterequal" => '\u{2265}', "infinity" => '\u{221E}',
    "checkmark" => '\u{2713}', "uni00A0" => '\u{00A0}',
};

/// Map a glyph name to a character.
///
/// Tries the static table, single ASCII letters, then `uniXXXX` and
/// `uXXXX[XX]` names. Suffixes after a period (`a.sc`) are ignored.
pub fn glyph_name_to_unicode(glyph_name: &str) -> Option<char> {
    let base = glyph_name.split('.').next().unwrap_or(glyph_name);

    if let Some(&c) = GLYPH_NAMES.get(base) {
        return Some(c);
    }

    let mut chars = base.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }

    if let Some(hex) = base.strip_prefix("uni") {
        if hex.len() == 4 {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c);
            }
        }
    }

    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c);
            }
        }
    }

    log::debug!("Unknown glyph name '{}'", glyph_name);
    None
}

fn ascii_printable(code: u8) -> Option<char> {
    (32..=126).contains(&code).then_some(code as char)
}

fn standard_lookup(code: u8) -> Option<char> {
    match code {
        0x27 => Some('\u{2019}'),
        0x60 => Some('\u{2018}'),
        0xA1 => Some('\u{00A1}'),
        0xA2 => Some('\u{00A2}'),
        0xA3 => Some('\u{00A3}'),
        0xA4 => Some('\u{2044}'),
        0xA5 => Some('\u{00A5}'),
        0xA6 => Some('\u{0192}'),
        0xA7 => Some('\u{00A7}'),
        0xA8 => Some('\u{00A4}'),
        0xA9 => Some('\''),
        0xAA => Some('\u{201C}'),
        0xAB => Some('\u{00AB}'),
        0xAC => Some('\u{2039}'),
        0xAD => Some('\u{203A}'),
        0xAE => Some('\u{FB01}'),
        0xAF => Some('\u{FB02}'),
        0xB1 => Some('\u{2013}'),
        0xB2 => Some('\u{2020}'),
        0xB3 => Some('\u{2021}'),
        0xB4 => Some('\u{00B7}'),
        0xB6 => Some('\u{00B6}'),
        0xB7 => Some('\u{2022}'),
        0xB8 => Some('\u{201A}'),
        0xB9 => Some('\u{201E}'),
        0xBA => Some('\u{201D}'),
        0xBB => Some('\u{00BB}'),
        0xBC => Some('\u{2026}'),
        0xBD => Some('\u{2030}'),
        0xBF => Some('\u{00BF}'),
        0xD0 => Some('\u{2014}'),
        0xE1 => Some('\u{00C6}'),
        0xE8 => Some('\u{0141}'),
        0xE9 => Some('\u{00D8}'),
        0xEA => Some('\u{0152}'),
        0xF1 => Some('\u{00E6}'),
        0xF5 => Some('\u{0131}'),
        0xF8 => Some('\u{0142}'),
        0xF9 => Some('\u{00F8}'),
        0xFA => Some('\u{0153}'),
        0xFB => Some('\u{00DF}'),
        _ => ascii_printable(code),
    }
}

fn winansi_lookup(code: u8) -> Option<char> {
    if let Some(c) = ascii_printable(code) {
        return Some(c);
    }
    let c = match code {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        // bullet for the unused codes, as Acrobat does
        0x7F | 0x81 | 0x8D | 0x8F | 0x90 | 0x9D => '\u{2022}',
        _ if code >= 0xA0 => char::from(code),
        _ => return None,
    };
    Some(c)
}

fn macroman_lookup(code: u8) -> Option<char> {
    if let Some(c) = ascii_printable(code) {
        return Some(c);
    }
    const HIGH: [char; 128] = [
        'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', //
        'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', //
        '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', //
        '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', //
        '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{00A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ', //
        '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ', 'ﬂ', //
        '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', //
        '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ', //
    ];
    (code >= 0x80).then(|| HIGH[(code - 0x80) as usize])
}

fn pdfdoc_lookup(code: u8) -> Option<char> {
    let c = match code {
        0x18 => '\u{02D8}',
        0x19 => '\u{02C7}',
        0x1A => '\u{02C6}',
        0x1B => '\u{02D9}',
        0x1C => '\u{02DD}',
        0x1D => '\u{02DB}',
        0x1E => '\u{02DA}',
        0x1F => '\u{02DC}',
        0x80 => '\u{2022}',
        0x81 => '\u{2020}',
        0x82 => '\u{2021}',
        0x83 => '\u{2026}',
        0x84 => '\u{2014}',
        0x85 => '\u{2013}',
        0x86 => '\u{0192}',
        0x87 => '\u{2044}',
        0x88 => '\u{2039}',
        0x89 => '\u{203A}',
        0x8A => '\u{2212}',
        0x8B => '\u{2030}',
        0x8C => '\u{201E}',
        0x8D => '\u{201C}',
        0x8E => '\u{201D}',
        0x8F => '\u{2018}',
        0x90 => '\u{2019}',
        0x91 => '\u{201A}',
        0x92 => '\u{2122}',
        0x93 => '\u{FB01}',
        0x94 => '\u{FB02}',
        0x95 => '\u{0141}',
        0x96 => '\u{0152}',
        0x97 => '\u{0160}',
        0x98 => '\u{0178}',
        0x99 => '\u{017D}',
        0x9A => '\u{0131}',
        0x9B => '\u{0142}',
        0x9C => '\u{0153}',
        0x9D => '\u{0161}',
        0x9E => '\u{017E}',
        0xA0 => '\u{20AC}',
        0x09 | 0x0A | 0x0D => char::from(code),
        _ if (0x20..0x7F).contains(&code) || code > 0xA0 => char::from(code),
        _ => return None,
    };
    Some(c)
}

/// Decode a PDF text string (Info entries, outline titles): UTF-16BE with a
/// byte order mark, UTF-8 with a BOM, else PDFDocEncoding.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().filter_map(|&b| pdfdoc_lookup(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winansi() {
        assert_eq!(BaseEncoding::WinAnsi.lookup(b'A'), Some('A'));
        assert_eq!(BaseEncoding::WinAnsi.lookup(0x93), Some('\u{201C}'));
        assert_eq!(BaseEncoding::WinAnsi.lookup(0xE9), Some('é'));
        assert_eq!(BaseEncoding::WinAnsi.lookup(0x05), None);
    }

    #[test]
    fn test_standard_quotes_differ_from_ascii() {
        assert_eq!(BaseEncoding::Standard.lookup(0x27), Some('\u{2019}'));
        assert_eq!(BaseEncoding::Standard.lookup(0x60), Some('\u{2018}'));
        assert_eq!(BaseEncoding::Standard.lookup(0xAE), Some('\u{FB01}'));
    }

    #[test]
    fn test_macroman() {
        assert_eq!(BaseEncoding::MacRoman.lookup(0x80), Some('Ä'));
        assert_eq!(BaseEncoding::MacRoman.lookup(0xD0), Some('–'));
        assert_eq!(BaseEncoding::MacRoman.lookup(0xFF), Some('ˇ'));
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(BaseEncoding::from_name("WinAnsiEncoding"), Some(BaseEncoding::WinAnsi));
        assert_eq!(BaseEncoding::from_name("Identity-H"), None);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode("A"), Some('A'));
        assert_eq!(glyph_name_to_unicode("bullet"), Some('•'));
        assert_eq!(glyph_name_to_unicode("emdash"), Some('—'));
        assert_eq!(glyph_name_to_unicode("uni0041"), Some('A'));
        assert_eq!(glyph_name_to_unicode("u1D70C"), Some('\u{1D70C}'));
        assert_eq!(glyph_name_to_unicode("a.sc"), Some('a'));
        assert_eq!(glyph_name_to_unicode("g123"), None);
    }

    #[test]
    fn test_text_strings() {
        assert_eq!(decode_text_string(b"Title"), "Title");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_text_string(&[0x93, b'x']), "\u{FB01}x");
    }
}
