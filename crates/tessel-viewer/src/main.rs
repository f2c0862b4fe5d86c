mod app;
mod controls;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tessel_engine::device::GpuInit;
use tessel_engine::logging::{LoggingConfig, init_logging};
use tessel_engine::{Atlas, RendererConfig};
use winit::dpi::LogicalSize;

use crate::app::RuntimeConfig;

/// Animated sprite grid viewer.
///
/// Q/E and W/S pan the camera, A/D rotate the sprites, the mouse wheel pans,
/// Escape quits.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Sprite image (PNG or JPEG). A generated blob is used when omitted.
    #[arg(long)]
    atlas: Option<PathBuf>,

    /// Sprites per grid row and column (1..=127).
    #[arg(long, default_value_t = 10)]
    side: u32,

    /// Frames between static-geometry refreshes; 0 refreshes only when the
    /// graphics context is created.
    #[arg(long, default_value_t = 100)]
    refresh_interval: u64,

    /// Log filter in env_logger syntax; overrides RUST_LOG.
    #[arg(long)]
    log: Option<String>,

    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 600.0)]
    height: f64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..LoggingConfig::default()
    });

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("fatal: {err:#}");
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let atlas = match &args.atlas {
        Some(path) => Atlas::load_image(path)?,
        None => Atlas::placeholder(128),
    };

    let renderer_config = RendererConfig {
        side: args.side,
        static_refresh_interval: (args.refresh_interval > 0).then_some(args.refresh_interval),
        ..RendererConfig::default()
    };

    let runtime = RuntimeConfig {
        initial_size: LogicalSize::new(args.width, args.height),
        ..RuntimeConfig::default()
    };

    app::run(runtime, GpuInit::default(), renderer_config, atlas)
}
