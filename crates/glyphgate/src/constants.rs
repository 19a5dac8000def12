//! Default styling and layout constants.

/// Default glyph font family
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Default alphabet: digits and letters with the easily confused ones removed
pub const DEFAULT_CHARS: &str = "23456789abcdefghjknpqrstuvxyzABCDEFGHJKLNPQRSTUVXYZ";

/// Default hex digits used for random colors (keeps colors mid-toned)
pub const DEFAULT_COLOR_HEX: &str = "23456789";

/// Default background fill
pub const DEFAULT_BG_COLOR: &str = "#fff";

/// Default stroke width for noise lines (px)
pub const DEFAULT_LINE_WIDTH: f32 = 2.0;

/// Default noise point density (points per pixel)
pub const DEFAULT_POINT_DENSITY: f64 = 0.05;

/// Default noise point radius (px)
pub const DEFAULT_POINT_RADIUS: f32 = 1.0;

/// Default JPEG quality (0.5 on a 0..1 scale)
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Font size as a fraction of the canvas height
pub const FONT_SIZE_RATIO: f32 = 0.8;

/// Text baseline as a fraction of the canvas height
pub const BASELINE_RATIO: f32 = 0.8;

/// Number of hex digits in a generated color
pub const COLOR_DIGITS: usize = 3;

