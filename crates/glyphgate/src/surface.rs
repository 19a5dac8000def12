//! Drawing surface: an RGBA pixel buffer plus the style state that
//! accumulates between draw calls.
//!
//! The API mirrors a small subset of a 2D canvas context. Every paint
//! operation composites (source-over) the current style color, scaled by the global
//! alpha, over what is already on the surface.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    Canvas, draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use rusttype::{Scale, point};

use crate::color::Color;
use crate::error::{CaptchaError, Result};
use crate::font::FontFace;

/// Font selected on a drawing context
#[derive(Clone)]
pub struct TextFont {
    pub family: String,
    /// Size in px
    pub size: f32,
    pub face: FontFace,
}

impl std::fmt::Debug for TextFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}px {}", self.size, self.family)
    }
}

/// Style state carried between draw calls
#[derive(Debug, Clone)]
pub struct DrawContext {
    pub fill_style: Color,
    pub stroke_style: Color,
    pub line_width: f32,
    /// `None` until a font is set; text drawing requires one
    pub font: Option<TextFont>,
    pub global_alpha: f32,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            fill_style: Color::BLACK,
            stroke_style: Color::BLACK,
            line_width: 1.0,
            font: None,
            global_alpha: 1.0,
        }
    }
}

/// A mutable canvas owned by a single pipeline run
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
    context: DrawContext,
}

impl Surface {
    /// Allocate a transparent `width` x `height` surface.
    ///
    /// Allocation failure is reported as `ResourceExhaustion` instead of
    /// aborting the process.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CaptchaError::InvalidConfiguration(format!(
                "surface dimensions must be positive, got {width}x{height}"
            )));
        }

        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
            .ok_or_else(|| {
                CaptchaError::ResourceExhaustion(format!("{width}x{height} surface overflows"))
            })?;

        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            CaptchaError::ResourceExhaustion(format!("{width}x{height} surface: {e}"))
        })?;
        buf.resize(len, 0);

        let image = RgbaImage::from_raw(width, height, buf).ok_or_else(|| {
            CaptchaError::ResourceExhaustion(format!("{width}x{height} surface buffer mismatch"))
        })?;

        Ok(Self {
            image,
            context: DrawContext::default(),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn context(&self) -> &DrawContext {
        &self.context
    }

    pub fn set_fill_style(&mut self, color: Color) {
        self.context.fill_style = color;
    }

    pub fn set_stroke_style(&mut self, color: Color) {
        self.context.stroke_style = color;
    }

    /// Non-finite or non-positive widths are ignored, as on a canvas
    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.context.line_width = width;
        }
    }

    pub fn set_font(&mut self, family: &str, size: f32, face: FontFace) {
        self.context.font = Some(TextFont {
            family: family.to_string(),
            size,
            face,
        });
    }

    /// Clamped to [0, 1]; non-finite values are ignored
    pub fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.context.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    /// Fill an axis-aligned rectangle with the fill style
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let x0 = x.round() as i32;
        let y0 = y.round() as i32;
        let w = width.round();
        let h = height.round();
        if !(w >= 1.0 && h >= 1.0) {
            return;
        }

        let color = self.paint(self.context.fill_style);
        self.with_blend(|canvas| {
            draw_filled_rect_mut(canvas, Rect::at(x0, y0).of_size(w as u32, h as u32), color);
        });
    }

    /// Fill `text` with its alphabetic baseline starting at (x, y)
    pub fn fill_text(&mut self, text: &str, x: f32, y: f32) -> Result<()> {
        let font = self.context.font.clone().ok_or_else(|| {
            CaptchaError::InvalidConfiguration("no font set on drawing context".to_string())
        })?;

        let color = self.paint(self.context.fill_style);
        let (width, height) = self.image.dimensions();

        for glyph in font.face.layout(text, Scale::uniform(font.size), point(x, y)) {
            let Some(bounds) = glyph.pixel_bounding_box() else {
                continue;
            };

            glyph.draw(|gx, gy, coverage| {
                let px = bounds.min.x + gx as i32;
                let py = bounds.min.y + gy as i32;
                if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                    return;
                }

                let mut ink = color;
                ink[3] = (f32::from(color[3]) * coverage).round() as u8;
                let pixel = self.image.get_pixel_mut(px as u32, py as u32);
                *pixel = source_over(*pixel, ink);
            });
        }

        Ok(())
    }

    /// Stroke a straight segment with the stroke style and line width
    pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32)) {
        let color = self.paint(self.context.stroke_style);

        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = dx.hypot(dy);
        let (nx, ny) = if len > 0.0 { (-dy / len, dx / len) } else { (0.0, 1.0) };

        // Thick strokes are built from parallel 1px passes across the normal
        let passes = self.context.line_width.round().max(1.0) as u32;
        let center = (passes - 1) as f32 / 2.0;

        self.with_blend(|canvas| {
            for pass in 0..passes {
                let offset = pass as f32 - center;
                let (ox, oy) = (nx * offset, ny * offset);
                draw_line_segment_mut(
                    canvas,
                    (from.0 + ox, from.1 + oy),
                    (to.0 + ox, to.1 + oy),
                    color,
                );
            }
        });
    }

    /// Fill a circle with the fill style
    pub fn fill_circle(&mut self, center: (f32, f32), radius: f32) {
        let color = self.paint(self.context.fill_style);
        let center = (center.0.round() as i32, center.1.round() as i32);
        let radius = radius.max(0.0).round() as i32;

        self.with_blend(|canvas| draw_filled_circle_mut(canvas, center, radius, color));
    }

    fn paint(&self, color: Color) -> image::Rgba<u8> {
        color.with_opacity(self.context.global_alpha).0
    }

    fn with_blend(&mut self, draw: impl FnOnce(&mut SourceOver<'_>)) {
        draw(&mut SourceOver(&mut self.image));
    }
}

/// Canvas adapter that composites every pixel with `source_over`
struct SourceOver<'a>(&'a mut RgbaImage);

impl Canvas for SourceOver<'_> {
    type Pixel = Rgba<u8>;

    fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.0.get_pixel(x, y)
    }

    fn draw_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        let pixel = self.0.get_pixel_mut(x, y);
        *pixel = source_over(*pixel, color);
    }
}

/// Porter-Duff "source over" on straight (non-premultiplied) RGBA.
///
/// An opaque destination stays exactly opaque and an opaque source
/// replaces the destination exactly.
fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    match (src[3], dst[3]) {
        (0, _) => return dst,
        (255, _) => return src,
        _ => {}
    }

    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (f32::from(src[c]) * sa + f32::from(dst[c]) * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = if dst[3] == 255 {
        255
    } else {
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba(out)
}
