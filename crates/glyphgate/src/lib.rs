//! # Glyphgate
//!
//! Renders text CAPTCHAs: a row of randomly colored, horizontally jittered
//! characters over a flat background, crossed by noise lines and sprinkled
//! with noise points, encoded as JPEG or PNG.
//!
//! ## Modules
//! - `generator` - `CaptchaGenerator` and the staged pipeline
//! - `config` - options, resolved configuration and point settings
//! - `surface` - pixel buffer plus drawing context
//! - `font` - font registry
//! - `encode` - JPEG/PNG/base64 output
//! - `random` - sampling helpers
//! - `color`, `error`, `constants`
//!
//! ```no_run
//! use glyphgate::{CaptchaGenerator, CaptchaOptions};
//!
//! let generator = CaptchaGenerator::new(120, 50, 4, &CaptchaOptions::default())?;
//! let captcha = generator.generate()?;
//! println!("{} -> {}", captcha.answer, captcha.data_url());
//! # Ok::<(), glyphgate::CaptchaError>(())
//! ```

pub mod color;
pub mod config;
pub mod constants;
pub mod encode;
pub mod error;
pub mod font;
pub mod generator;
pub mod random;
pub mod surface;

pub use color::Color;
pub use config::{CaptchaConfig, CaptchaOptions, PointOptions};
pub use encode::EncodeFormat;
pub use error::{CaptchaError, Result};
pub use font::{FontBook, FontFace};
pub use generator::{Captcha, CaptchaGenerator, EncodedCaptcha, Glyph, NoiseLine, NoisePoint};
pub use surface::{DrawContext, Surface, TextFont};
