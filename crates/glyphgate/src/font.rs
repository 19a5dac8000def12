//! Font registration and lookup.
//!
//! Fonts are loaded once at configuration time and shared by every
//! pipeline run through an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rusttype::Font;

use crate::constants::DEFAULT_FONT_FAMILY;
use crate::error::{CaptchaError, Result};

const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
const BUNDLED_FAMILY: &str = "DejaVu Sans";

/// A parsed font face shared between generators and surfaces
pub type FontFace = Arc<Font<'static>>;

/// Registry of font families available for glyph rendering
#[derive(Clone, Default)]
pub struct FontBook {
    faces: HashMap<String, FontFace>,
}

impl FontBook {
    /// Empty registry with no families at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the bundled DejaVu Sans, registered
    /// both under its own name and as `sans-serif`
    ///
    /// # Panics
    ///
    /// Panics if the embedded font data is invalid.
    pub fn bundled() -> Self {
        let face: FontFace = Arc::new(
            Font::try_from_bytes(BUNDLED_FONT).expect("bundled DejaVu Sans is a valid TrueType font"),
        );

        let mut book = Self::new();
        book.insert(BUNDLED_FAMILY, face.clone());
        book.insert(DEFAULT_FONT_FAMILY, face);
        book
    }

    /// Load a TTF/OTF file and register it under `family`
    pub fn register_font(&mut self, path: impl AsRef<Path>, family: &str) -> Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| CaptchaError::Font(format!("failed to read {}: {e}", path.display())))?;

        self.register_font_bytes(family, bytes)?;
        tracing::debug!(family = %family, path = %path.display(), "Registered font");
        Ok(())
    }

    /// Register an in-memory font under `family`
    pub fn register_font_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let family = normalize_family(family);
        if family.is_empty() {
            return Err(CaptchaError::Font("font family name is empty".to_string()));
        }

        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| CaptchaError::Font(format!("{family:?}: not a valid font")))?;
        self.insert(&family, Arc::new(font));
        Ok(())
    }

    pub fn contains(&self, family: &str) -> bool {
        self.faces.contains_key(&normalize_family(family))
    }

    /// Registered family names (lowercased)
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.faces.keys().map(String::as_str)
    }

    /// Resolve a CSS-style family list such as `"Fira Sans", sans-serif`.
    ///
    /// The first registered family wins. When none is registered the
    /// `sans-serif` face is used instead, if present.
    pub fn resolve(&self, families: &str) -> Result<FontFace> {
        if let Some(face) = families
            .split(',')
            .map(normalize_family)
            .find_map(|family| self.faces.get(&family))
        {
            return Ok(face.clone());
        }

        match self.faces.get(DEFAULT_FONT_FAMILY) {
            Some(face) => {
                tracing::warn!(
                    requested = %families,
                    fallback = DEFAULT_FONT_FAMILY,
                    "Font family not registered, falling back"
                );
                Ok(face.clone())
            }
            None => Err(CaptchaError::Font(format!(
                "no registered font for {families:?} and no {DEFAULT_FONT_FAMILY} fallback"
            ))),
        }
    }

    fn insert(&mut self, family: &str, face: FontFace) {
        self.faces.insert(normalize_family(family), face);
    }
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut families: Vec<&str> = self.families().collect();
        families.sort_unstable();
        f.debug_struct("FontBook").field("families", &families).finish()
    }
}

/// Trim whitespace and CSS quotes, then lowercase
fn normalize_family(family: &str) -> String {
    family
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase()
}
