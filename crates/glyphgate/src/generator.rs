//! CAPTCHA generation pipeline.
//!
//! Stages run on one `Surface` in a fixed order:
//! init -> text -> lines -> points -> encode. Later stages paint over
//! earlier ones, and only the text stage produces the answer.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::config::{CaptchaConfig, CaptchaOptions, PointOptions};
use crate::encode::{self, EncodeFormat};
use crate::error::Result;
use crate::font::{FontBook, FontFace};
use crate::random::{random_color, random_int, sample_chars};
use crate::surface::Surface;

/// One answer character and where it is drawn (x start, alphabetic baseline y)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub color: Color,
}

/// A noise line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseLine {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub color: Color,
}

/// A noise dot center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisePoint {
    pub center: (f32, f32),
    pub color: Color,
}

/// A finished CAPTCHA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captcha {
    /// Base64-encoded image
    pub image: String,
    /// Lowercase answer, in left-to-right draw order
    pub answer: String,
    pub mime_type: String,
}

impl Captcha {
    pub fn data_url(&self) -> String {
        encode::data_url(&self.mime_type, &self.image)
    }
}

/// A finished CAPTCHA with the raw encoded bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCaptcha {
    pub bytes: Vec<u8>,
    pub format: EncodeFormat,
    pub answer: String,
}

impl EncodedCaptcha {
    pub fn into_captcha(self) -> Captcha {
        use base64::{Engine, engine::general_purpose::STANDARD};

        Captcha {
            image: STANDARD.encode(&self.bytes),
            answer: self.answer,
            mime_type: self.format.mime_type().to_string(),
        }
    }
}

/// Renders text CAPTCHAs from an immutable configuration.
///
/// Safe to share between threads: every run allocates its own surface and
/// uses the calling thread's RNG.
#[derive(Clone)]
pub struct CaptchaGenerator {
    config: CaptchaConfig,
    font: FontFace,
}

impl CaptchaGenerator {
    /// Create a generator using the bundled fonts.
    ///
    /// All validation happens here; the stages never fail on configuration.
    pub fn new(width: u32, height: u32, length: usize, options: &CaptchaOptions) -> Result<Self> {
        Self::with_fonts(width, height, length, options, &FontBook::bundled())
    }

    /// Create a generator resolving `font_family` against `fonts`
    pub fn with_fonts(
        width: u32,
        height: u32,
        length: usize,
        options: &CaptchaOptions,
        fonts: &FontBook,
    ) -> Result<Self> {
        let config = CaptchaConfig::resolve(width, height, length, options)?;
        let font = fonts.resolve(&config.font_family)?;

        tracing::debug!(
            width = config.width,
            height = config.height,
            length = config.length,
            font = %config.font_family,
            font_size = config.font_size,
            "Configured CAPTCHA generator"
        );

        Ok(Self { config, font })
    }

    pub fn config(&self) -> &CaptchaConfig {
        &self.config
    }

    /// Allocate a fresh surface of the configured size
    pub fn init_surface(&self) -> Result<Surface> {
        Surface::new(self.config.width, self.config.height)
    }

    /// Paint the background and the answer characters; returns the answer
    pub fn draw_text(&self, surface: &mut Surface) -> Result<String> {
        self.draw_text_with(surface, &mut rand::rng())
    }

    pub fn draw_text_with<R: Rng + ?Sized>(&self, surface: &mut Surface, rng: &mut R) -> Result<String> {
        let cfg = &self.config;
        let glyphs = self.layout_text(rng)?;

        surface.set_fill_style(cfg.bg_color);
        surface.fill_rect(0.0, 0.0, cfg.width as f32, cfg.height as f32);

        for glyph in &glyphs {
            surface.set_font(&cfg.font_family, cfg.font_size, self.font.clone());
            surface.set_fill_style(glyph.color);
            surface.fill_text(glyph.ch.encode_utf8(&mut [0; 4]), glyph.x, glyph.y)?;
        }

        tracing::trace!(chars = glyphs.len(), "Drew CAPTCHA text");
        // Symbols are checked at construction to lowercase to a single char
        Ok(glyphs.iter().flat_map(|glyph| glyph.ch.to_lowercase()).collect())
    }

    /// Pick the answer characters and place them, left to right
    pub fn layout_text<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Glyph>> {
        let cfg = &self.config;
        let text = sample_chars(rng, &cfg.chars, cfg.length)?;
        let y = cfg.baseline();

        text.into_iter()
            .enumerate()
            .map(|(i, ch)| -> Result<Glyph> {
                // Slot center jittered by up to a quarter word space either way
                let jitter: f32 = rng.random_range(0.0..0.5);
                let x = cfg.border_width + (i as f32 + jitter - 0.25) * cfg.word_space;
                let color = random_color(rng, &cfg.color_hex)?;
                Ok(Glyph { ch, x, y, color })
            })
            .collect()
    }

    /// Stroke one full-width noise line per answer character
    pub fn draw_line(&self, surface: &mut Surface) -> Result<()> {
        self.draw_line_with(surface, &mut rand::rng())
    }

    pub fn draw_line_with<R: Rng + ?Sized>(&self, surface: &mut Surface, rng: &mut R) -> Result<()> {
        let lines = self.layout_lines(rng)?;

        surface.set_line_width(self.config.line_width);
        for line in &lines {
            surface.set_stroke_style(line.color);
            surface.stroke_line(line.from, line.to);
        }

        tracing::trace!(lines = lines.len(), "Drew CAPTCHA noise lines");
        Ok(())
    }

    /// Endpoints and colors of the noise lines: from x = 0 to x = width,
    /// each end at a random y in `[0, height]`
    pub fn layout_lines<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<NoiseLine>> {
        let cfg = &self.config;
        let height = i64::from(cfg.height);

        (0..cfg.length)
            .map(|_| -> Result<NoiseLine> {
                let color = random_color(rng, &cfg.color_hex)?;
                let y0 = random_int(rng, 0, height) as f32;
                let y1 = random_int(rng, 0, height) as f32;
                Ok(NoiseLine {
                    from: (0.0, y0),
                    to: (cfg.width as f32, y1),
                    color,
                })
            })
            .collect()
    }

    /// Scatter `ceil(width * height * density)` dots
    pub fn draw_point(&self, surface: &mut Surface, options: PointOptions) -> Result<()> {
        self.draw_point_with(surface, options, &mut rand::rng())
    }

    pub fn draw_point_with<R: Rng + ?Sized>(
        &self,
        surface: &mut Surface,
        options: PointOptions,
        rng: &mut R,
    ) -> Result<()> {
        let points = self.layout_points(options, rng)?;

        for point in &points {
            surface.set_fill_style(point.color);
            surface.fill_circle(point.center, options.radius);
        }

        tracing::trace!(points = points.len(), radius = options.radius, "Drew CAPTCHA noise points");
        Ok(())
    }

    /// Centers and colors of the noise points, inside the canvas bounds
    pub fn layout_points<R: Rng + ?Sized>(
        &self,
        options: PointOptions,
        rng: &mut R,
    ) -> Result<Vec<NoisePoint>> {
        let cfg = &self.config;
        let count = options.point_count(cfg.width, cfg.height)?;
        let (max_x, max_y) = (i64::from(cfg.width) - 1, i64::from(cfg.height) - 1);

        (0..count)
            .map(|_| -> Result<NoisePoint> {
                let color = random_color(rng, &cfg.color_hex)?;
                let x = random_int(rng, 0, max_x) as f32;
                let y = random_int(rng, 0, max_y) as f32;
                Ok(NoisePoint { center: (x, y), color })
            })
            .collect()
    }

    pub fn encode(&self, surface: &Surface, format: EncodeFormat) -> Result<Vec<u8>> {
        encode::encode(surface, format)
    }

    pub fn encode_base64(&self, surface: &Surface, format: EncodeFormat) -> Result<String> {
        encode::encode_base64(surface, format)
    }

    pub fn to_data_url(&self, surface: &Surface, format: EncodeFormat) -> Result<String> {
        encode::to_data_url(surface, format)
    }

    /// Run the full pipeline and return a base64 JPEG (quality 50)
    pub fn generate(&self) -> Result<Captcha> {
        self.generate_with(&mut rand::rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Captcha> {
        Ok(self.generate_as_with(EncodeFormat::jpeg(), rng)?.into_captcha())
    }

    /// Run the full pipeline, encoding to `format`
    pub fn generate_as(&self, format: EncodeFormat) -> Result<EncodedCaptcha> {
        self.generate_as_with(format, &mut rand::rng())
    }

    pub fn generate_as_with<R: Rng + ?Sized>(
        &self,
        format: EncodeFormat,
        rng: &mut R,
    ) -> Result<EncodedCaptcha> {
        let mut surface = self.init_surface()?;
        let answer = self.draw_text_with(&mut surface, rng)?;
        self.draw_line_with(&mut surface, rng)?;
        self.draw_point_with(&mut surface, PointOptions::default(), rng)?;
        let bytes = self.encode(&surface, format)?;

        tracing::debug!(
            width = self.config.width,
            height = self.config.height,
            length = self.config.length,
            format = %format,
            bytes = bytes.len(),
            "Generated CAPTCHA"
        );

        Ok(EncodedCaptcha {
            bytes,
            format,
            answer,
        })
    }
}

impl std::fmt::Debug for CaptchaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CHARS;
    use crate::error::CaptchaError;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn generator() -> CaptchaGenerator {
        CaptchaGenerator::new(120, 50, 4, &CaptchaOptions::default()).unwrap()
    }

    fn assert_valid_answer(answer: &str, length: usize, alphabet: &str) {
        assert_eq!(answer.chars().count(), length);
        let folded = alphabet.to_lowercase();
        for c in answer.chars() {
            assert!(!c.is_uppercase(), "{answer} is not lowercase");
            assert!(folded.contains(c), "{c} not in alphabet");
        }
    }

    #[test]
    fn test_generate_scenario() {
        let captcha = generator().generate().unwrap();
        assert_valid_answer(&captcha.answer, 4, DEFAULT_CHARS);
        assert_eq!(captcha.mime_type, "image/jpeg");

        let bytes = STANDARD.decode(&captcha.image).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 50));

        assert!(captcha.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_generate_is_non_deterministic() {
        let generator = CaptchaGenerator::new(160, 60, 6, &CaptchaOptions::default()).unwrap();
        let first = generator.generate().unwrap();
        let second = generator.generate().unwrap();

        assert_ne!(first.answer, second.answer);
        assert_valid_answer(&first.answer, 6, DEFAULT_CHARS);
        assert_valid_answer(&second.answer, 6, DEFAULT_CHARS);
    }

    #[test]
    fn test_seeded_runs_reproduce() {
        let generator = generator();
        let a = generator
            .generate_as_with(EncodeFormat::Png, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let b = generator
            .generate_as_with(EncodeFormat::Png, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_answer_matches_draw_order() {
        let generator = generator();
        let config = generator.config();

        let expected: String = sample_chars(&mut StdRng::seed_from_u64(42), &config.chars, 4)
            .unwrap()
            .into_iter()
            .collect();

        let mut surface = generator.init_surface().unwrap();
        let answer = generator
            .draw_text_with(&mut surface, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(answer, expected.to_lowercase());
    }

    #[test]
    fn test_staged_pipeline_png() {
        let generator = generator();
        let mut surface = generator.init_surface().unwrap();
        surface.set_global_alpha(0.8);

        let answer = generator.draw_text(&mut surface).unwrap();
        generator.draw_line(&mut surface).unwrap();
        generator
            .draw_point(&mut surface, PointOptions { density: 0.1, radius: 2.0 })
            .unwrap();

        let bytes = generator.encode(&surface, EncodeFormat::Png).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
        assert_valid_answer(&answer, 4, DEFAULT_CHARS);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 50));
    }

    #[test]
    fn test_draw_text_fills_background_and_glyphs() {
        let options = CaptchaOptions {
            bg_color: Some("#123456".into()),
            ..Default::default()
        };
        let generator = CaptchaGenerator::new(120, 50, 4, &options).unwrap();
        let mut surface = generator.init_surface().unwrap();
        generator.draw_text(&mut surface).unwrap();

        let bg = Color::rgba(0x12, 0x34, 0x56, 255).0;
        // corners clear of the glyph row (left margin, above the ascenders)
        assert_eq!(*surface.image().get_pixel(0, 0), bg);
        assert_eq!(*surface.image().get_pixel(0, 49), bg);
        assert_eq!(*surface.image().get_pixel(119, 0), bg);
        assert!(surface.image().pixels().filter(|p| **p != bg).count() > 50);

        let context = surface.context();
        let font = context.font.as_ref().unwrap();
        assert_eq!(font.family, "sans-serif");
        assert_eq!(font.size, 40.0);
    }

    #[test]
    fn test_text_layout_follows_random_draws() {
        let generator = generator();
        let cfg = generator.config();
        let glyphs = generator.layout_text(&mut StdRng::seed_from_u64(11)).unwrap();

        // Replay the same draws in the order the stage makes them
        let mut rng = StdRng::seed_from_u64(11);
        let chars = sample_chars(&mut rng, &cfg.chars, cfg.length).unwrap();
        assert_eq!(glyphs.len(), 4);

        for (i, (glyph, ch)) in glyphs.iter().zip(chars).enumerate() {
            let jitter: f32 = rng.random_range(0.0..0.5);
            let color = random_color(&mut rng, &cfg.color_hex).unwrap();

            assert_eq!(glyph.ch, ch);
            assert_eq!(glyph.x, 20.0 + (i as f32 + jitter - 0.25) * 20.0);
            assert_eq!(glyph.y, 40.0);
            assert_eq!(glyph.color, color);
        }
    }

    #[test]
    fn test_text_jitter_stays_within_quarter_slot() {
        let generator = generator();
        let (border, space) = (generator.config().border_width, generator.config().word_space);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            let glyphs = generator.layout_text(&mut rng).unwrap();
            for (i, glyph) in glyphs.iter().enumerate() {
                let slot = i as f32;
                assert!(glyph.x >= border + (slot - 0.25) * space, "{glyph:?}");
                assert!(glyph.x < border + (slot + 0.25) * space, "{glyph:?}");
                assert_eq!(glyph.y, 0.8 * 50.0);
            }
        }
    }

    #[test]
    fn test_draw_text_paints_the_layout() {
        let generator = generator();
        let glyphs = generator.layout_text(&mut StdRng::seed_from_u64(5)).unwrap();

        let mut drawn = generator.init_surface().unwrap();
        let answer = generator
            .draw_text_with(&mut drawn, &mut StdRng::seed_from_u64(5))
            .unwrap();

        let mut expected = generator.init_surface().unwrap();
        expected.set_fill_style(generator.config().bg_color);
        expected.fill_rect(0.0, 0.0, 120.0, 50.0);
        for glyph in &glyphs {
            expected.set_font("sans-serif", 40.0, generator.font.clone());
            expected.set_fill_style(glyph.color);
            expected.fill_text(&glyph.ch.to_string(), glyph.x, glyph.y).unwrap();
        }

        assert_eq!(drawn.image(), expected.image());
        let letters: String = glyphs.iter().map(|g| g.ch).collect();
        assert_eq!(answer, letters.to_lowercase());
    }

    #[test]
    fn test_line_layout_count_and_endpoints() {
        let generator = CaptchaGenerator::new(90, 30, 5, &CaptchaOptions::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0..100 {
            let lines = generator.layout_lines(&mut rng).unwrap();
            assert_eq!(lines.len(), 5);
            for line in &lines {
                assert_eq!(line.from.0, 0.0);
                assert_eq!(line.to.0, 90.0);
                assert!((0.0..=30.0).contains(&line.from.1));
                assert!((0.0..=30.0).contains(&line.to.1));
                assert_eq!(line.from.1.fract(), 0.0);
            }
        }
    }

    #[test]
    fn test_point_layout_count_and_bounds() {
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(8);

        let points = generator.layout_points(PointOptions::default(), &mut rng).unwrap();
        assert_eq!(points.len(), 300);

        let sparse = PointOptions { density: 0.001, radius: 1.0 };
        // 120 * 50 * 0.001 = 6
        assert_eq!(generator.layout_points(sparse, &mut rng).unwrap().len(), 6);
        let fractional = PointOptions { density: 0.0005, radius: 1.0 };
        // 3.0 exactly, then 3.06 rounded up
        assert_eq!(generator.layout_points(fractional, &mut rng).unwrap().len(), 3);
        let rounded_up = PointOptions { density: 0.00051, radius: 1.0 };
        assert_eq!(generator.layout_points(rounded_up, &mut rng).unwrap().len(), 4);

        for point in &points {
            assert!((0.0..120.0).contains(&point.center.0));
            assert!((0.0..50.0).contains(&point.center.1));
        }
    }

    #[test]
    fn test_draw_line_sets_stroke_width() {
        let generator = generator();
        let mut surface = generator.init_surface().unwrap();
        generator.draw_line(&mut surface).unwrap();

        assert_eq!(surface.context().line_width, 2.0);
        // every line spans the full width, so each column is touched
        for x in 0..120 {
            assert!((0..50).any(|y| surface.image().get_pixel(x, y)[3] > 0), "column {x}");
        }
    }

    #[test]
    fn test_draw_point_density() {
        let generator = generator();

        let mut empty = generator.init_surface().unwrap();
        generator
            .draw_point(&mut empty, PointOptions { density: 0.0, radius: 1.0 })
            .unwrap();
        assert!(empty.image().pixels().all(|p| p[3] == 0));

        let mut dotted = generator.init_surface().unwrap();
        generator.draw_point(&mut dotted, PointOptions::default()).unwrap();
        assert!(dotted.image().pixels().filter(|p| p[3] > 0).count() > 100);

        let err = generator
            .draw_point(&mut dotted, PointOptions { density: -1.0, radius: 1.0 })
            .unwrap_err();
        assert!(matches!(err, CaptchaError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            CaptchaGenerator::new(0, 50, 4, &CaptchaOptions::default()),
            Err(CaptchaError::InvalidConfiguration(_))
        ));

        let options = CaptchaOptions {
            chars: Some("abc".into()),
            ..Default::default()
        };
        assert!(matches!(
            CaptchaGenerator::new(120, 50, 4, &options),
            Err(CaptchaError::InsufficientAlphabet { requested: 4, available: 3, .. })
        ));

        // one glyph must lowercase to one answer character
        let options = CaptchaOptions {
            chars: Some("İ".into()),
            ..Default::default()
        };
        assert!(matches!(
            CaptchaGenerator::new(120, 50, 1, &options),
            Err(CaptchaError::InvalidConfiguration(_))
        ));

        let err = CaptchaGenerator::with_fonts(120, 50, 4, &CaptchaOptions::default(), &FontBook::new())
            .unwrap_err();
        assert!(matches!(err, CaptchaError::Font(_)));
    }

    #[test]
    fn test_custom_alphabet() {
        let options = CaptchaOptions {
            chars: Some("XYZW".into()),
            color_hex: Some("abc".into()),
            ..Default::default()
        };
        let generator = CaptchaGenerator::new(100, 40, 4, &options).unwrap();
        let captcha = generator.generate().unwrap();

        let mut letters: Vec<char> = captcha.answer.chars().collect();
        letters.sort_unstable();
        assert_eq!(letters, vec!['w', 'x', 'y', 'z']);
    }

    #[test]
    fn test_generator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CaptchaGenerator>();

        let generator = generator();
        let answers: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| generator.generate().unwrap().answer))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for answer in &answers {
            assert_valid_answer(answer, 4, DEFAULT_CHARS);
        }
    }
}
