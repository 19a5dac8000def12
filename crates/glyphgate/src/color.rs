//! CSS-style hex colors.

use std::fmt;
use std::str::FromStr;

use image::Rgba;

use crate::error::CaptchaError;

/// An RGBA color parsed from `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub Rgba<u8>);

impl Color {
    pub const BLACK: Color = Color(Rgba([0, 0, 0, 255]));
    pub const WHITE: Color = Color(Rgba([255, 255, 255, 255]));
    pub const TRANSPARENT: Color = Color(Rgba([0, 0, 0, 0]));

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(Rgba([r, g, b, a]))
    }

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    /// Scale the alpha channel by `factor` (expected in [0, 1])
    pub fn with_opacity(self, factor: f32) -> Self {
        let Rgba([r, g, b, a]) = self.0;
        let scaled = (f32::from(a) * factor.clamp(0.0, 1.0)).round() as u8;
        Self::rgba(r, g, b, scaled)
    }
}

impl FromStr for Color {
    type Err = CaptchaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CaptchaError::InvalidConfiguration(format!("invalid color: {s:?}"));

        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }

        let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
        let digits: Vec<u8> = hex.bytes().map(nibble).collect::<Option<_>>().ok_or_else(invalid)?;

        let channels: Vec<u8> = match digits.len() {
            3 | 4 => digits.iter().map(|d| d * 17).collect(),
            6 | 8 => digits.chunks(2).map(|p| p[0] * 16 + p[1]).collect(),
            _ => return Err(invalid()),
        };

        let alpha = channels.get(3).copied().unwrap_or(255);
        Ok(Self::rgba(channels[0], channels[1], channels[2], alpha))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rgba([r, g, b, a]) = self.0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}
