//! Colour palette for primitive colours.

use crate::canvas::primitives::PaintColor;
use crate::content::colorspace::Rgb;

/// Colours that get a palette index by default.
const DEFAULT_COLORS: [Rgb; 36] = [
    [0x00, 0x00, 0x00],
    [0xff, 0xff, 0xff],
    [0x4c, 0x4c, 0x4c],
    [0x80, 0x80, 0x80],
    [0x99, 0x99, 0x99],
    [0xc0, 0xc0, 0xc0],
    [0xcc, 0xcc, 0xcc],
    [0xe5, 0xe5, 0xe5],
    [0xf2, 0xf2, 0xf2],
    [0x00, 0x80, 0x00],
    [0x00, 0xff, 0x00],
    [0xbf, 0xff, 0xa0],
    [0xff, 0xd6, 0x29],
    [0xff, 0x99, 0xcc],
    [0x00, 0x40, 0x80],
    [0x9f, 0xc0, 0xe1],
    [0x55, 0x80, 0xff],
    [0xa9, 0xc9, 0xfa],
    [0xff, 0x00, 0x80],
    [0x80, 0x00, 0x80],
    [0xff, 0xbf, 0xff],
    [0xe4, 0x5b, 0x21],
    [0xff, 0xbf, 0xaa],
    [0x00, 0x80, 0x80],
    [0xff, 0x00, 0x00],
    [0xfd, 0xc5, 0x9f],
    [0x80, 0x80, 0x00],
    [0xbf, 0xbf, 0x00],
    [0x82, 0x41, 0x00],
    [0x00, 0x72, 0x56],
    [0x00, 0x00, 0x80],
    [0x00, 0x00, 0xff],
    [0xff, 0xff, 0x00],
    [0x00, 0xff, 0xff],
    [0xff, 0x00, 0xff],
    [0x80, 0x00, 0x00],
];

/// A small fixed colour table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Palette with the given colours, indexed in order.
    pub fn new(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    /// Record a colour: its index on a hit, `#rrggbb` on a miss.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_primitives::canvas::{Palette, PaintColor};
    ///
    /// let palette = Palette::default();
    /// assert_eq!(palette.lookup([0, 0, 0]), PaintColor::Palette(0));
    /// assert_eq!(palette.lookup([1, 2, 3]), PaintColor::Rgb("#010203".to_string()));
    /// ```
    pub fn lookup(&self, rgb: Rgb) -> PaintColor {
        match self.colors.iter().position(|c| *c == rgb) {
            Some(index) => PaintColor::Palette(index),
            None => PaintColor::Rgb(format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])),
        }
    }

    /// Colour at `index`.
    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.colors.get(index).copied()
    }

    /// Number of colours.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// True if the palette has no colours.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(DEFAULT_COLORS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette_hits() {
        let palette = Palette::default();
        assert_eq!(palette.lookup([255, 0, 0]), PaintColor::Palette(24));
        assert_eq!(palette.get(24), Some([255, 0, 0]));
    }

    #[test]
    fn test_default_palette_has_no_duplicates() {
        let palette = Palette::default();
        for (i, color) in DEFAULT_COLORS.iter().enumerate() {
            assert_eq!(palette.lookup(*color), PaintColor::Palette(i));
        }
    }

    #[test]
    fn test_miss_records_hex() {
        let palette = Palette::new(vec![[1, 1, 1]]);
        assert_eq!(palette.lookup([0xab, 0x0c, 0xff]), PaintColor::Rgb("#ab0cff".to_string()));
    }

    #[test]
    fn test_empty_palette() {
        let palette = Palette::new(Vec::new());
        assert!(palette.is_empty());
        assert_eq!(palette.lookup([0, 0, 0]), PaintColor::Rgb("#000000".to_string()));
    }
}
