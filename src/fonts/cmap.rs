//! ToUnicode CMap parser.
//!
//! ToUnicode streams map character codes to Unicode text through
//! `bfchar` and `bfrange` sections:
//!
//! ```text
//! 1 begincodespacerange <00> <FF> endcodespacerange
//! beginbfchar
//! <0041> <0041>            % code 0x41 -> "A"
//! <0003> <00660069>        % code 0x03 -> "fi"
//! endbfchar
//! beginbfrange
//! <0020> <007E> <0020>     % sequential
//! <005F> <0061> [<0066> <0067> <0068>]
//! endbfrange
//! ```
//!
//! Only the mapping is extracted; the rest of the CMap program is ignored.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref RE_CODESPACE: Regex = Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
    static ref RE_BFCHAR: Regex = Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
    static ref RE_BFRANGE: Regex = Regex::new(
        r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]*)>|\[((?:\s*<[0-9A-Fa-f]*>)*)\s*\])"
    )
    .unwrap();
    static ref RE_HEX: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
}

/// Longest range expanded from one sequential `bfrange` entry.
const MAX_RANGE: u32 = 0xFFFF;

/// Code to Unicode mapping read from a ToUnicode stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
    code_bytes: Option<usize>,
}

impl ToUnicode {
    /// Parse a decoded ToUnicode stream. Malformed entries are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_primitives::fonts::ToUnicode;
    ///
    /// let cmap = ToUnicode::parse(b"beginbfchar\n<0041> <0058>\nendbfchar");
    /// assert_eq!(cmap.get(0x41), Some("X"));
    /// ```
    pub fn parse(data: &[u8]) -> ToUnicode {
        let content = String::from_utf8_lossy(data);
        let mut cmap = ToUnicode::default();

        for section in sections(&content, "begincodespacerange", "endcodespacerange") {
            for caps in RE_CODESPACE.captures_iter(section) {
                let width = (caps[1].len() + 1) / 2;
                cmap.code_bytes = Some(cmap.code_bytes.map_or(width, |w| w.max(width)));
            }
        }

        for section in sections(&content, "beginbfchar", "endbfchar") {
            for caps in RE_BFCHAR.captures_iter(section) {
                let Ok(src) = u32::from_str_radix(&caps[1], 16) else {
                    continue;
                };
                match decode_utf16_hex(&caps[2]) {
                    Some(dst) => {
                        log::trace!("ToUnicode bfchar: 0x{:02X} -> {:?}", src, dst);
                        cmap.map.insert(src, dst);
                    },
                    None => log::warn!("ToUnicode bfchar for 0x{:X} has an undecodable target", src),
                }
            }
        }

        for section in sections(&content, "beginbfrange", "endbfrange") {
            for caps in RE_BFRANGE.captures_iter(section) {
                let (Ok(lo), Ok(hi)) = (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16)) else {
                    continue;
                };
                if hi < lo {
                    log::warn!("ToUnicode bfrange 0x{:X}-0x{:X} is inverted", lo, hi);
                    continue;
                }
                if let Some(dst) = caps.get(3) {
                    cmap.insert_sequential(lo, hi, dst.as_str());
                } else if let Some(list) = caps.get(4) {
                    let targets: Vec<&str> = RE_HEX
                        .captures_iter(list.as_str())
                        .filter_map(|c| c.get(1).map(|m| m.as_str()))
                        .collect();
                    let expected = (hi - lo + 1) as usize;
                    if targets.len() != expected {
                        log::warn!(
                            "ToUnicode bfrange array size mismatch: expected {} entries for range 0x{:X}-0x{:X}, got {}",
                            expected,
                            lo,
                            hi,
                            targets.len()
                        );
                    }
                    for (code, hex) in (lo..=hi).zip(targets) {
                        if let Some(dst) = decode_utf16_hex(hex) {
                            cmap.map.insert(code, dst);
                        }
                    }
                }
            }
        }

        log::debug!("ToUnicode CMap with {} mappings", cmap.map.len());
        cmap
    }

    /// Sequential range: the last UTF-16 unit of the target is incremented
    /// for each code.
    fn insert_sequential(&mut self, lo: u32, hi: u32, dst_hex: &str) {
        let Some(mut units) = utf16_units(dst_hex) else {
            return;
        };
        if units.is_empty() {
            return;
        }
        let last = units.len() - 1;
        let start = units[last];
        for (i, code) in (lo..=hi.min(lo.saturating_add(MAX_RANGE))).enumerate() {
            units[last] = start.wrapping_add(i as u16);
            self.map.insert(code, String::from_utf16_lossy(&units));
        }
    }

    /// Unicode text for a code.
    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(|s| s.as_str())
    }

    /// Widest code in the declared codespace, in bytes.
    pub fn code_bytes(&self) -> Option<usize> {
        self.code_bytes
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if nothing was mapped.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(begin) {
        let after = &rest[start + begin.len()..];
        match after.find(end) {
            Some(stop) => {
                found.push(&after[..stop]);
                rest = &after[stop + end.len()..];
            },
            None => {
                log::warn!("Unterminated {} section in ToUnicode CMap", begin);
                found.push(after);
                break;
            },
        }
    }
    found
}

/// Hex digits as UTF-16BE code units. Odd trailing digits are padded.
fn utf16_units(hex: &str) -> Option<Vec<u16>> {
    if hex.len() <= 2 {
        return u16::from_str_radix(if hex.is_empty() { "0" } else { hex }, 16)
            .ok()
            .map(|v| vec![v]);
    }
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| {
            let text = std::str::from_utf8(chunk).ok()?;
            let value = u16::from_str_radix(text, 16).ok()?;
            Some(if text.len() < 4 { value << (4 * (4 - text.len())) } else { value })
        })
        .collect()
}

/// Decode a target string; surrogate pairs become one character.
fn decode_utf16_hex(hex: &str) -> Option<String> {
    let units = utf16_units(hex)?;
    let text: String = char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfchar_entries() {
        let cmap = ToUnicode::parse(b"beginbfchar\n<0041> <0041>\n<00E9> <00E9>\nendbfchar");
        assert_eq!(cmap.get(0x41), Some("A"));
        assert_eq!(cmap.get(0xE9), Some("é"));
        assert_eq!(cmap.len(), 2);
    }

    #[test]
    fn test_several_entries_on_one_line() {
        let cmap = ToUnicode::parse(b"beginbfchar <01> <0048> <02> <0069> endbfchar");
        assert_eq!(cmap.get(1), Some("H"));
        assert_eq!(cmap.get(2), Some("i"));
    }

    #[test]
    fn test_ligature_target() {
        let cmap = ToUnicode::parse(b"beginbfchar\n<0003> <00660069>\nendbfchar");
        assert_eq!(cmap.get(3), Some("fi"));
    }

    #[test]
    fn test_surrogate_pair_target() {
        let cmap = ToUnicode::parse(b"beginbfchar\n<0010> <D835DF0C>\nendbfchar");
        assert_eq!(cmap.get(0x10), Some("\u{1D70C}"));
    }

    #[test]
    fn test_sequential_range() {
        let cmap = ToUnicode::parse(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        assert_eq!(cmap.get(0x20), Some(" "));
        assert_eq!(cmap.get(0x41), Some("A"));
        assert_eq!(cmap.get(0x7E), Some("~"));
        assert_eq!(cmap.get(0x7F), None);
    }

    #[test]
    fn test_array_range() {
        let cmap = ToUnicode::parse(b"beginbfrange\n<005F> <0061> [<00660066> <00660069> <00660066006C>]\nendbfrange");
        assert_eq!(cmap.get(0x5F), Some("ff"));
        assert_eq!(cmap.get(0x60), Some("fi"));
        assert_eq!(cmap.get(0x61), Some("ffl"));
    }

    #[test]
    fn test_mixed_bfchar_and_bfrange() {
        let cmap = ToUnicode::parse(b"beginbfchar\n<0041> <0058>\nendbfchar\nbeginbfrange\n<0042> <0044> <0042>\nendbfrange");
        assert_eq!(cmap.get(0x41), Some("X"));
        assert_eq!(cmap.get(0x43), Some("C"));
    }

    #[test]
    fn test_codespace_width() {
        let cmap = ToUnicode::parse(b"1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange");
        assert_eq!(cmap.code_bytes(), Some(2));
        assert!(cmap.is_empty());
    }

    #[test]
    fn test_inverted_range_is_skipped() {
        let cmap = ToUnicode::parse(b"beginbfrange\n<0050> <0040> <0041>\nendbfrange");
        assert!(cmap.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(ToUnicode::parse(b"").is_empty());
    }
}
