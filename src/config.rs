use std::path::PathBuf;

use clap::Parser;

use crate::locator::{KNOWN_DIRS, ToolPaths};

/// Command-line flags; every tool path can also come from the environment.
#[derive(Parser, Debug, Default)]
#[command(name = "yt_audio_clipper", version, about = "Trim audio clips out of online videos")]
pub struct Args {
    /// Path to the yt-dlp executable
    #[arg(long = "yt-dlp", env = "YT_AUDIO_CLIPPER_YT_DLP")]
    pub yt_dlp: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, env = "YT_AUDIO_CLIPPER_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable
    #[arg(long, env = "YT_AUDIO_CLIPPER_FFPROBE")]
    pub ffprobe: Option<PathBuf>,

    /// Directory for intermediate downloads (defaults to the OS temp dir)
    #[arg(long, env = "YT_AUDIO_CLIPPER_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Output folder pre-filled in the form
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Largest metadata dump accepted from yt-dlp, in MiB
    #[arg(long, default_value_t = 100)]
    pub metadata_limit_mb: usize,

    /// Log tool output at debug level
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Immutable settings shared by every component
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tools: ToolPaths,
    pub scratch_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    /// Upper bound on captured `--dump-json` output, in bytes
    pub metadata_buffer_limit: usize,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let mut tools = ToolPaths::locate(KNOWN_DIRS);
        if let Some(path) = &args.yt_dlp {
            tools.yt_dlp = path.clone();
        }
        if let Some(path) = &args.ffmpeg {
            tools.ffmpeg = path.clone();
        }
        if let Some(path) = &args.ffprobe {
            tools.ffprobe = path.clone();
        }

        Self {
            tools,
            scratch_dir: args.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
            output_dir: args.output_dir.clone(),
            metadata_buffer_limit: args.metadata_limit_mb.saturating_mul(1024 * 1024),
        }
    }
}
