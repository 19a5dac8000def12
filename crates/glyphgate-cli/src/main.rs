//! # Glyphgate CLI
//!
//! Renders text CAPTCHAs from the command line and prints the answer with
//! the base64 image (or writes the image to a file).
//!
//! ```text
//! glyphgate --width 120 --height 50 --length 4
//! {"answer":"k7xq","mime_type":"image/jpeg","image":"/9j/4AAQ..."}
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod render;

use config::AppConfig;

/// Glyphgate - text CAPTCHA renderer
#[derive(Parser, Debug)]
#[command(name = "glyphgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/glyphgate.toml")]
    config: String,

    /// Canvas width in px (overrides config)
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height in px (overrides config)
    #[arg(long)]
    height: Option<u32>,

    /// Number of characters (overrides config)
    #[arg(long)]
    length: Option<usize>,

    /// Output format: jpeg or png (overrides config)
    #[arg(short, long)]
    format: Option<String>,

    /// JPEG quality 1-100 (overrides config)
    #[arg(long)]
    quality: Option<u8>,

    /// Write the image bytes here instead of printing base64
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a data URL instead of bare base64
    #[arg(long, default_value = "false")]
    data_url: bool,

    /// Number of CAPTCHAs to render
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Extra font file to register (requires --font-family)
    #[arg(long, requires = "font_family")]
    font: Option<PathBuf>,

    /// Font family for the characters
    #[arg(long)]
    font_family: Option<String>,

    /// Global alpha applied to everything drawn after the surface is created
    #[arg(long)]
    alpha: Option<f32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("{}", startup_banner());

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        width = config.width,
        height = config.height,
        length = config.length,
        format = %config.format,
        "Configuration loaded from {}",
        args.config
    );

    render::run(
        &config,
        args.count,
        args.output.as_deref(),
        args.data_url,
        args.alpha,
    )
}

fn startup_banner() -> String {
    format!("Starting glyphgate v{}", env!("CARGO_PKG_VERSION"))
}

/// Initialize structured logging with tracing.
///
/// Logs go to stderr; stdout carries the rendered output.
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
