//! Surface serialization to JPEG or PNG.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_JPEG_QUALITY;
use crate::error::{CaptchaError, Result};
use crate::surface::Surface;

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EncodeFormat {
    /// Lossy; alpha is dropped. Quality is 1..=100.
    Jpeg { quality: u8 },
    /// Lossless RGBA
    Png,
}

impl EncodeFormat {
    /// JPEG at the default quality (50)
    pub const fn jpeg() -> Self {
        Self::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }
}

impl Default for EncodeFormat {
    fn default() -> Self {
        Self::jpeg()
    }
}

impl FromStr for EncodeFormat {
    type Err = CaptchaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(Self::jpeg()),
            "png" | "image/png" => Ok(Self::Png),
            other => Err(CaptchaError::EncodingFailure(format!(
                "unsupported image format: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for EncodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg { quality } => write!(f, "jpeg(q={quality})"),
            Self::Png => f.write_str("png"),
        }
    }
}

/// Serialize the surface pixels
pub fn encode(surface: &Surface, format: EncodeFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();

    match format {
        EncodeFormat::Jpeg { quality } => {
            // JPEG carries no alpha channel
            let rgb = DynamicImage::ImageRgba8(surface.image().clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        EncodeFormat::Png => {
            surface
                .image()
                .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        }
    }

    Ok(bytes)
}

/// Serialize and base64-encode (standard alphabet, padded)
pub fn encode_base64(surface: &Surface, format: EncodeFormat) -> Result<String> {
    Ok(STANDARD.encode(encode(surface, format)?))
}

/// Serialize into a `data:` URL
pub fn to_data_url(surface: &Surface, format: EncodeFormat) -> Result<String> {
    Ok(data_url(format.mime_type(), &encode_base64(surface, format)?))
}

pub(crate) fn data_url(mime_type: &str, base64: &str) -> String {
    format!("data:{mime_type};base64,{base64}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    fn sample_surface() -> Surface {
        let mut surface = Surface::new(30, 20).unwrap();
        surface.set_fill_style(Color::WHITE);
        surface.fill_rect(0.0, 0.0, 30.0, 20.0);
        surface.set_stroke_style(Color::rgba(0x33, 0x66, 0x99, 255));
        surface.stroke_line((0.0, 3.0), (30.0, 17.0));
        surface
    }

    #[test]
    fn test_jpeg_magic_and_dimensions() {
        let bytes = encode(&sample_surface(), EncodeFormat::jpeg()).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn test_png_is_lossless() {
        let surface = sample_surface();
        let bytes = encode(&surface, EncodeFormat::Png).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(&decoded, surface.image());
    }

    #[test]
    fn test_jpeg_quality_is_clamped() {
        let surface = sample_surface();
        assert!(encode(&surface, EncodeFormat::Jpeg { quality: 0 }).is_ok());
        assert!(encode(&surface, EncodeFormat::Jpeg { quality: 255 }).is_ok());
    }

    #[test]
    fn test_base64_and_data_url() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let surface = sample_surface();
        let text = encode_base64(&surface, EncodeFormat::Png).unwrap();
        let raw = STANDARD.decode(&text).unwrap();
        assert_eq!(image::guess_format(&raw).unwrap(), image::ImageFormat::Png);

        let url = to_data_url(&surface, EncodeFormat::jpeg()).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JPG".parse::<EncodeFormat>().unwrap(), EncodeFormat::jpeg());
        assert_eq!("image/png".parse::<EncodeFormat>().unwrap(), EncodeFormat::Png);
        assert!(matches!(
            "gif".parse::<EncodeFormat>(),
            Err(CaptchaError::EncodingFailure(_))
        ));

        assert_eq!(EncodeFormat::default().mime_type(), "image/jpeg");
        assert_eq!(EncodeFormat::Png.extension(), "png");
        assert_eq!(EncodeFormat::jpeg().to_string(), "jpeg(q=50)");
    }
}
