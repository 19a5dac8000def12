//! Generator configuration.
//!
//! `CaptchaOptions` carries the loosely-specified overrides a caller (or a
//! config file) supplies. `CaptchaConfig` is the resolved, immutable form:
//! derived defaults are computed exactly once, in `CaptchaConfig::resolve`.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::constants::{
    COLOR_DIGITS, DEFAULT_BG_COLOR, DEFAULT_CHARS, DEFAULT_COLOR_HEX, DEFAULT_FONT_FAMILY,
    DEFAULT_LINE_WIDTH, DEFAULT_POINT_DENSITY, DEFAULT_POINT_RADIUS, FONT_SIZE_RATIO,
};
use crate::error::{CaptchaError, Result};
use crate::random::distinct;

/// Optional styling overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaOptions {
    /// Glyph font family (CSS-style list allowed)
    pub font_family: Option<String>,
    /// Glyph size in px
    pub font_size: Option<f32>,
    /// Horizontal advance per character in px
    pub word_space: Option<f32>,
    /// Left margin of the character row in px
    pub border_width: Option<f32>,
    /// Noise line stroke width in px
    pub line_width: Option<f32>,
    /// Alphabet for the answer characters
    pub chars: Option<String>,
    /// Hex digits used to build random colors
    pub color_hex: Option<String>,
    /// Background fill, CSS hex notation
    pub bg_color: Option<String>,
}

/// Noise point settings for the point stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointOptions {
    /// Points per pixel of canvas area
    pub density: f64,
    /// Dot radius in px
    pub radius: f32,
}

impl Default for PointOptions {
    fn default() -> Self {
        Self {
            density: DEFAULT_POINT_DENSITY,
            radius: DEFAULT_POINT_RADIUS,
        }
    }
}

impl PointOptions {
    /// Number of points for a `width` x `height` canvas.
    ///
    /// Fractional counts round up.
    pub fn point_count(&self, width: u32, height: u32) -> Result<usize> {
        if !self.density.is_finite() || self.density < 0.0 {
            return Err(CaptchaError::InvalidConfiguration(format!(
                "point density must be a finite non-negative number, got {}",
                self.density
            )));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(CaptchaError::InvalidConfiguration(format!(
                "point radius must be a finite non-negative number, got {}",
                self.radius
            )));
        }

        let area = f64::from(width) * f64::from(height);
        Ok((area * self.density).ceil() as usize)
    }
}

/// Resolved generator settings
#[derive(Debug, Clone, PartialEq)]
pub struct CaptchaConfig {
    pub width: u32,
    pub height: u32,
    /// Number of answer characters (and of noise lines)
    pub length: usize,
    pub font_family: String,
    pub font_size: f32,
    pub word_space: f32,
    pub border_width: f32,
    pub line_width: f32,
    /// Deduplicated, in the order given
    pub chars: Vec<char>,
    /// Deduplicated, in the order given
    pub color_hex: Vec<char>,
    pub bg_color: Color,
}

impl CaptchaConfig {
    /// Validate dimensions and overrides, then derive the remaining defaults
    pub fn resolve(width: u32, height: u32, length: usize, options: &CaptchaOptions) -> Result<Self> {
        if width == 0 || height == 0 || length == 0 {
            return Err(CaptchaError::InvalidConfiguration(format!(
                "width, height and length must be positive, got {width}x{height} with length {length}"
            )));
        }

        let font_size = match options.font_size {
            Some(size) => positive("font_size", size)?,
            None => (height as f32 * FONT_SIZE_RATIO).floor(),
        };
        let word_space = match options.word_space {
            Some(space) => positive("word_space", space)?,
            None => font_size / 2.0,
        };
        let border_width = match options.border_width {
            Some(border) if border.is_finite() => border,
            Some(border) => {
                return Err(CaptchaError::InvalidConfiguration(format!(
                    "border_width must be finite, got {border}"
                )));
            }
            None => (width as f32 - word_space * length as f32) / 2.0,
        };
        let line_width = match options.line_width {
            Some(line) => positive("line_width", line)?,
            None => DEFAULT_LINE_WIDTH,
        };

        let chars = distinct_chars(options.chars.as_deref().unwrap_or(DEFAULT_CHARS));
        // The answer is lowercased per symbol and must keep one char per glyph
        if let Some(bad) = chars.iter().find(|c| c.to_lowercase().count() != 1) {
            return Err(CaptchaError::InvalidConfiguration(format!(
                "chars symbol {bad:?} does not lowercase to a single character"
            )));
        }
        if chars.len() < length {
            return Err(CaptchaError::InsufficientAlphabet {
                alphabet: "chars",
                requested: length,
                available: chars.len(),
            });
        }

        let color_hex = distinct_chars(options.color_hex.as_deref().unwrap_or(DEFAULT_COLOR_HEX));
        if let Some(bad) = color_hex.iter().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CaptchaError::InvalidConfiguration(format!(
                "color_hex contains non-hex digit {bad:?}"
            )));
        }
        if color_hex.len() < COLOR_DIGITS {
            return Err(CaptchaError::InsufficientAlphabet {
                alphabet: "color_hex",
                requested: COLOR_DIGITS,
                available: color_hex.len(),
            });
        }

        let bg_color = options.bg_color.as_deref().unwrap_or(DEFAULT_BG_COLOR).parse()?;

        Ok(Self {
            width,
            height,
            length,
            font_family: options
                .font_family
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            font_size,
            word_space,
            border_width,
            line_width,
            chars,
            color_hex,
            bg_color,
        })
    }

    /// Baseline y of the character row
    pub fn baseline(&self) -> f32 {
        self.height as f32 * crate::constants::BASELINE_RATIO
    }
}

fn positive(name: &str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CaptchaError::InvalidConfiguration(format!(
            "{name} must be a finite positive number, got {value}"
        )))
    }
}

/// Unique characters of `alphabet`, first occurrence wins
fn distinct_chars(alphabet: &str) -> Vec<char> {
    distinct(&alphabet.chars().collect::<Vec<_>>())
}
