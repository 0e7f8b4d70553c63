//! Resolution of the external tools the clipper drives.
//!
//! Paths are resolved once at startup. Nothing here verifies that a binary
//! actually runs; [`check_tool`] does that right before it is needed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ClipError;

/// Directories searched before falling back to the command search path.
#[cfg(not(windows))]
pub const KNOWN_DIRS: &[&str] = &[
    "/opt/homebrew/bin", // Apple Silicon
    "/usr/local/bin",    // Intel Mac / manual installs
];
#[cfg(windows)]
pub const KNOWN_DIRS: &[&str] = &[];

/// The three external programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn command_name(self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    fn file_name(self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.command_name())
        } else {
            self.command_name().to_owned()
        }
    }

    fn version_flag(self) -> &'static str {
        match self {
            Tool::YtDlp => "--version",
            Tool::Ffmpeg | Tool::Ffprobe => "-version",
        }
    }

    pub fn install_hint(self) -> &'static str {
        match (self, std::env::consts::OS) {
            (Tool::YtDlp, "macos") => "brew install yt-dlp",
            (Tool::YtDlp, "windows") => "winget install yt-dlp",
            (Tool::YtDlp, _) => "pip install yt-dlp",
            (_, "macos") => "brew install ffmpeg",
            (_, "windows") => "winget install ffmpeg",
            (_, _) => "your package manager (e.g. apt install ffmpeg)",
        }
    }
}

/// Resolved executable paths, one per tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    /// Looks for every tool in `dirs`, in order. Tools found nowhere keep
    /// their bare command name so the OS search path decides at spawn time.
    pub fn locate<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let paths = Self {
            yt_dlp: resolve(Tool::YtDlp, dirs),
            ffmpeg: resolve(Tool::Ffmpeg, dirs),
            ffprobe: resolve(Tool::Ffprobe, dirs),
        };
        info!("Using yt-dlp: {}", paths.yt_dlp.display());
        info!("Using ffmpeg: {}", paths.ffmpeg.display());
        info!("Using ffprobe: {}", paths.ffprobe.display());
        paths
    }
}

fn resolve<P: AsRef<Path>>(tool: Tool, dirs: &[P]) -> PathBuf {
    let file_name = tool.file_name();
    dirs.iter()
        .map(|dir| dir.as_ref().join(&file_name))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(tool.command_name()))
}

/// Runs the tool's version probe. Returns the first line of its output, or
/// `ToolNotFound` with an install hint when it cannot be executed.
pub async fn check_tool(tool: Tool, path: &Path) -> Result<String, ClipError> {
    let not_found = || ClipError::ToolNotFound {
        tool: tool.command_name(),
        path: path.to_path_buf(),
        hint: tool.install_hint(),
    };

    let output = Command::new(path)
        .arg(tool.version_flag())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            debug!("{} version probe failed to spawn: {}", tool.command_name(), e);
            not_found()
        })?;

    if !output.status.success() {
        debug!(
            "{} version probe exited with {}",
            tool.command_name(),
            output.status
        );
        return Err(not_found());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
}
