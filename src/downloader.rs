use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::ClipError;
use crate::process::{LastError, Stream, drain_output};
use crate::progress::{ProgressReporter, download_progress, parse_percent};

/// Intermediate audio file owned by one pipeline run.
///
/// The file is removed when the value is dropped, so every exit path of the
/// run that created it cleans it up.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Reserves a unique `temp_<nanos>.m4a` path in `dir`. Nothing is created yet.
    pub fn new_in(dir: &Path) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self {
            path: dir.join(format!("temp_{nanos}.m4a")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed temp file {}", self.path.display()),
            Err(e) => warn!("could not remove temp file {}: {}", self.path.display(), e),
        }
    }
}

/// Fetcher arguments for "best audio, extracted to m4a, written to `output`".
pub fn download_args(url: &str, output: &Path) -> Vec<String> {
    vec![
        "-f".to_owned(),
        "bestaudio".to_owned(),
        "--extract-audio".to_owned(),
        "--audio-format".to_owned(),
        "m4a".to_owned(),
        "-o".to_owned(),
        output.display().to_string(),
        "--no-playlist".to_owned(),
        "--newline".to_owned(),
        url.to_owned(),
    ]
}

/// Download stage: pulls the best audio stream of `url` into a fresh temp
/// artifact, reporting progress in the [0, 50] range.
///
/// Fails when the fetcher cannot be spawned, exits non-zero, or exits
/// cleanly without producing the expected file.
pub async fn download_audio(
    config: &AppConfig,
    url: &str,
    progress: &mut ProgressReporter,
) -> Result<TempArtifact, ClipError> {
    let artifact = TempArtifact::new_in(&config.scratch_dir);
    let args = download_args(url, artifact.path());
    info!("Spawning yt-dlp: {} {:?}", config.tools.yt_dlp.display(), args);

    let mut child = Command::new(&config.tools.yt_dlp)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClipError::DownloadStage(format!("Failed to spawn yt-dlp: {e}")))?;

    let mut last_error = LastError::default();
    let status = drain_output(&mut child, |stream, line| {
        debug!("yt-dlp {:?}> {}", stream, line);
        if stream == Stream::Stderr {
            last_error.push(line);
        }
        if let Some(pct) = parse_percent(line) {
            progress.report(download_progress(pct));
        }
    })
    .await
    .map_err(|e| ClipError::DownloadStage(format!("Failed to read yt-dlp output: {e}")))?;

    if !status.success() {
        let detail = last_error
            .into_message()
            .map(|m| format!(": {m}"))
            .unwrap_or_default();
        return Err(ClipError::DownloadStage(format!(
            "yt-dlp exited with {status}{detail}. Please check your internet connection and try again."
        )));
    }
    if !artifact.path().is_file() {
        return Err(ClipError::DownloadStage(format!(
            "yt-dlp finished but produced no file at {}",
            artifact.path().display()
        )));
    }

    info!("Downloaded audio to {}", artifact.path().display());
    Ok(artifact)
}
