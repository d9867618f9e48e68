//! Configuration for turning pages into primitives.

use crate::canvas::Palette;

/// Canvas configuration.
///
/// The thresholds drop decorative artifacts such as checkbox borders:
/// a stroked segment is kept unless it is both short relative to its width
/// and thin, and a fill is kept unless both of its sides are small.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// A line is short when `length / width` is below this ratio.
    pub line_ratio: f64,

    /// A line is thin when its width is below this value.
    pub line_width_threshold: f64,

    /// Fills with both sides below this size are dropped; fills with one side
    /// below it become lines.
    pub min_fill_size: f64,

    /// Largest deviation, in page units, for a segment to count as
    /// horizontal or vertical.
    pub axis_tolerance: f64,

    /// Colour table for primitive colours.
    pub palette: Palette,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            line_ratio: 4.0,
            line_width_threshold: 4.0,
            min_fill_size: 2.0,
            axis_tolerance: 0.5,
            palette: Palette::default(),
        }
    }

    /// Set the length to width ratio below which thin lines are dropped.
    pub fn with_line_ratio(mut self, ratio: f64) -> Self {
        self.line_ratio = ratio;
        self
    }

    /// Set the width below which short lines are dropped.
    pub fn with_line_width_threshold(mut self, width: f64) -> Self {
        self.line_width_threshold = width;
        self
    }

    /// Set the minimum fill size.
    pub fn with_min_fill_size(mut self, size: f64) -> Self {
        self.min_fill_size = size;
        self
    }

    /// Set the axis tolerance.
    pub fn with_axis_tolerance(mut self, tolerance: f64) -> Self {
        self.axis_tolerance = tolerance;
        self
    }

    /// Use a different palette.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Whether a stroked segment is kept.
    pub fn keeps_line(&self, length: f64, width: f64) -> bool {
        !(length / width < self.line_ratio && width < self.line_width_threshold)
    }
}
