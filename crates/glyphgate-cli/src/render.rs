//! Rendering and output for the CLI.

use anyhow::{Context, Result};
use glyphgate::{CaptchaGenerator, EncodeFormat, EncodedCaptcha, FontBook, PointOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;

/// One line of JSON output
#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    answer: &'a str,
    mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// Build a generator from the loaded configuration
pub fn build_generator(config: &AppConfig) -> Result<CaptchaGenerator> {
    let mut fonts = FontBook::bundled();
    for entry in &config.fonts {
        fonts
            .register_font(&entry.path, &entry.family)
            .with_context(|| format!("Failed to register font {}", entry.path.display()))?;
    }

    CaptchaGenerator::with_fonts(config.width, config.height, config.length, &config.captcha, &fonts)
        .context("Invalid CAPTCHA configuration")
}

/// Run the staged pipeline, optionally dimming everything drawn after init
pub fn render(
    generator: &CaptchaGenerator,
    format: EncodeFormat,
    noise: PointOptions,
    alpha: Option<f32>,
) -> Result<EncodedCaptcha> {
    let mut surface = generator.init_surface()?;
    if let Some(alpha) = alpha {
        surface.set_global_alpha(alpha);
    }

    let answer = generator.draw_text(&mut surface)?;
    generator.draw_line(&mut surface)?;
    generator.draw_point(&mut surface, noise)?;
    let bytes = generator.encode(&surface, format)?;

    Ok(EncodedCaptcha {
        bytes,
        format,
        answer,
    })
}

/// Render `count` captchas, writing each to a file or to stdout as JSON
pub fn run(
    config: &AppConfig,
    count: usize,
    output: Option<&Path>,
    data_url: bool,
    alpha: Option<f32>,
) -> Result<()> {
    let generator = build_generator(config)?;
    let format = config.encode_format()?;

    for index in 0..count {
        let captcha = render(&generator, format, config.noise, alpha)?;

        let record = match output {
            Some(base) => {
                let path = numbered_path(base, index, count);
                std::fs::write(&path, &captcha.bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), bytes = captcha.bytes.len(), "Wrote CAPTCHA");

                serde_json::to_string(&OutputRecord {
                    answer: &captcha.answer,
                    mime_type: format.mime_type(),
                    image: None,
                    path: Some(path.display().to_string()),
                })?
            }
            None => {
                let answer = captcha.answer.clone();
                let encoded = captcha.into_captcha();
                let image = if data_url { encoded.data_url() } else { encoded.image };

                serde_json::to_string(&OutputRecord {
                    answer: &answer,
                    mime_type: format.mime_type(),
                    image: Some(image),
                    path: None,
                })?
            }
        };

        println!("{record}");
    }

    Ok(())
}

/// `out.jpg` stays as-is for a single image, becomes `out-1.jpg`, `out-2.jpg`, ... otherwise
fn numbered_path(base: &Path, index: usize, count: usize) -> PathBuf {
    if count <= 1 {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "captcha".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{stem}-{}.{}", index + 1, ext.to_string_lossy()),
        None => format!("{stem}-{}", index + 1),
    };
    base.with_file_name(name)
}
