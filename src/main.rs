//! Main application for the YouTube Audio Clipper GUI

// egui front end
mod app;
// Command-line flags and the startup configuration
mod config;
// Convert/trim stage (ffmpeg)
mod converter;
// Download stage (yt-dlp) and the temp artifact
mod downloader;
// Error type shared by every stage
mod error;
// External tool resolution and availability checks
mod locator;
// Metadata lookup (yt-dlp --dump-json)
mod metadata;
// Data models for requests, metadata and pipeline state
mod model;
// Download-and-convert orchestration
mod pipeline;
// Line-oriented draining of subprocess output
mod process;
// Progress parsing and reporting
mod progress;
// Thumbnail fetching
mod thumbnail;

use std::sync::Arc;

use clap::Parser;
// eframe/egui for GUI application framework
use eframe::egui::{self, Visuals};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::ClipperApp;
use config::{AppConfig, Args};

/// Program entry point: parses flags, resolves tools, starts the runtime and
/// launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "yt_audio_clipper=debug,warn"
    } else {
        "yt_audio_clipper=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Arc::new(AppConfig::from_args(&args));
    info!("Scratch directory: {}", config.scratch_dir.display());

    // The runtime outlives the window; every subprocess runs on it
    let runtime = Arc::new(Runtime::new()?);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_resizable(false),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Audio Clipper",
        options,
        Box::new(move |cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(ClipperApp::new(runtime, config))
        }),
    )?;
    Ok(())
}
