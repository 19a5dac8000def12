//! Configuration management for the glyphgate CLI.

use anyhow::{Context, Result};
use glyphgate::{CaptchaOptions, EncodeFormat, PointOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Canvas width in px
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in px
    #[serde(default = "default_height")]
    pub height: u32,

    /// Number of answer characters
    #[serde(default = "default_length")]
    pub length: usize,

    /// Output format: jpeg or png
    #[serde(default = "default_format")]
    pub format: String,

    /// JPEG quality (1-100)
    #[serde(default)]
    pub quality: Option<u8>,

    /// Extra fonts to register before rendering
    #[serde(default)]
    pub fonts: Vec<FontEntry>,

    /// Styling overrides
    #[serde(default)]
    pub captcha: CaptchaOptions,

    /// Noise point settings
    #[serde(default)]
    pub noise: PointOptions,
}

/// A font file registered under a family name
#[derive(Debug, Clone, Deserialize)]
pub struct FontEntry {
    pub path: PathBuf,
    pub family: String,
}

// Default value functions
fn default_width() -> u32 { 120 }
fn default_height() -> u32 { 50 }
fn default_length() -> usize { 4 }
fn default_format() -> String { "jpeg".to_string() }

impl AppConfig {
    /// Load configuration from file and `GLYPHGATE__*` environment
    /// variables, with CLI overrides on top
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        if !Path::new(config_path).exists() {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GLYPHGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load config file")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        config.apply_overrides(args);
        Ok(config)
    }

    fn apply_overrides(&mut self, args: &super::Args) {
        if let Some(width) = args.width {
            self.width = width;
        }
        if let Some(height) = args.height {
            self.height = height;
        }
        if let Some(length) = args.length {
            self.length = length;
        }
        if let Some(ref format) = args.format {
            self.format = format.clone();
        }
        if args.quality.is_some() {
            self.quality = args.quality;
        }
        if let (Some(path), Some(family)) = (&args.font, &args.font_family) {
            self.fonts.push(FontEntry {
                path: path.clone(),
                family: family.clone(),
            });
        }
        if let Some(ref family) = args.font_family {
            self.captcha.font_family = Some(family.clone());
        }
    }

    /// Output format with the configured JPEG quality applied
    pub fn encode_format(&self) -> Result<EncodeFormat> {
        let format: EncodeFormat = self
            .format
            .parse()
            .with_context(|| format!("Invalid output format {:?}", self.format))?;

        Ok(match (format, self.quality) {
            (EncodeFormat::Jpeg { .. }, Some(quality)) => EncodeFormat::Jpeg { quality },
            (format, _) => format,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            length: default_length(),
            format: default_format(),
            quality: None,
            fonts: Vec::new(),
            captcha: CaptchaOptions::default(),
            noise: PointOptions::default(),
        }
    }
}
