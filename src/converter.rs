//! Convert/trim stage: transcodes the downloaded artifact into the requested
//! format and window with ffmpeg.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::downloader::TempArtifact;
use crate::error::ClipError;
use crate::model::{AudioFormat, DownloadRequest};
use crate::process::{LastError, Stream, drain_output};
use crate::progress::{ProgressReporter, convert_progress, parse_out_time};

/// Codec flags for each output format: always stereo at 44.1 kHz.
pub fn codec_args(format: AudioFormat) -> &'static [&'static str] {
    match format {
        AudioFormat::Mp3 => &["-acodec", "libmp3lame", "-b:a", "192k", "-ac", "2", "-ar", "44100"],
        AudioFormat::Wav => &["-acodec", "pcm_s16le", "-ac", "2", "-ar", "44100"],
    }
}

/// Full ffmpeg argument list for one conversion.
pub fn ffmpeg_args(input: &Path, request: &DownloadRequest, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-y", "-i"].map(OsString::from).into();
    args.push(input.into());

    let (seek, limit) = request.trim_window();
    if let Some(start) = seek {
        args.push("-ss".into());
        args.push(start.to_string().into());
    }
    if let Some(duration) = limit {
        args.push("-t".into());
        args.push(duration.to_string().into());
    }

    args.extend(codec_args(request.format).iter().map(OsString::from));
    args.extend(["-progress", "pipe:1", "-nostats"].map(OsString::from));
    args.push(output.into());
    args
}

/// Media length in seconds as reported by ffprobe, if it can tell.
pub async fn probe_duration(ffprobe: &Path, file: &Path) -> Option<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(file)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| debug!("ffprobe failed to spawn: {}", e))
        .ok()?;

    if !output.status.success() {
        debug!("ffprobe exited with {}", output.status);
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Length of the output the conversion is expected to produce.
fn expected_length(total: Option<f64>, request: &DownloadRequest) -> Option<f64> {
    let (seek, limit) = request.trim_window();
    let remaining = total.map(|t| t - seek.unwrap_or(0.0));
    let expected = match (remaining, limit) {
        (Some(rest), Some(limit)) => rest.min(limit),
        (Some(rest), None) => rest,
        (None, limit) => limit?,
    };
    (expected > 0.0).then_some(expected)
}

/// Runs the transcoder over `artifact`, writing the request's destination.
///
/// Consumes the artifact: it is deleted before this returns, whatever the
/// outcome. On failure a destination file this run created is removed too.
pub async fn convert(
    config: &AppConfig,
    artifact: TempArtifact,
    request: &DownloadRequest,
    progress: &mut ProgressReporter,
) -> Result<PathBuf, ClipError> {
    let destination = request.destination_path();
    let preexisting = destination.exists();
    let total = probe_duration(&config.tools.ffprobe, artifact.path()).await;
    let expected = expected_length(total, request);
    debug!("probed {:?}s, expecting {:?}s of output", total, expected);

    let args = ffmpeg_args(artifact.path(), request, &destination);
    info!("Spawning ffmpeg: {} {:?}", config.tools.ffmpeg.display(), args);

    let outcome = run_ffmpeg(&config.tools.ffmpeg, &args, expected, progress).await;
    drop(artifact);

    match outcome {
        Ok(()) => {
            info!("Converted audio saved to {}", destination.display());
            Ok(destination)
        }
        Err(e) => {
            if !preexisting && destination.exists() {
                if let Err(rm) = tokio::fs::remove_file(&destination).await {
                    warn!("could not remove partial output {}: {}", destination.display(), rm);
                }
            }
            Err(e)
        }
    }
}

async fn run_ffmpeg(
    ffmpeg: &Path,
    args: &[OsString],
    expected: Option<f64>,
    progress: &mut ProgressReporter,
) -> Result<(), ClipError> {
    let mut child = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClipError::ConvertStage(format!("Failed to spawn ffmpeg: {e}")))?;

    let mut last_error = LastError::default();
    let status = drain_output(&mut child, |stream, line| match stream {
        Stream::Stdout => {
            if let (Some(elapsed), Some(expected)) = (parse_out_time(line), expected) {
                progress.report(convert_progress(elapsed / expected));
            }
        }
        Stream::Stderr => {
            debug!("ffmpeg> {}", line);
            last_error.push(line);
        }
    })
    .await
    .map_err(|e| ClipError::ConvertStage(format!("Failed to read ffmpeg output: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        let message = last_error
            .into_message()
            .unwrap_or_else(|| format!("ffmpeg exited with {status}"));
        Err(ClipError::ConvertStage(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(format: AudioFormat, start: f64, end: f64) -> DownloadRequest {
        DownloadRequest {
            source_url: "https://www.youtube.com/watch?v=abc".into(),
            format,
            trim_start: start,
            trim_end: end,
            destination_dir: PathBuf::from("/out"),
            file_name: "clip".into(),
        }
    }

    fn args_of(req: &DownloadRequest) -> Vec<String> {
        ffmpeg_args(Path::new("/tmp/in.m4a"), req, &req.destination_path())
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn trim_window_becomes_seek_and_duration() {
        let args = args_of(&request(AudioFormat::Mp3, 30.0, 45.0));
        assert_eq!(value_after(&args, "-ss").as_deref(), Some("30"));
        assert_eq!(value_after(&args, "-t").as_deref(), Some("15"));
    }

    #[test]
    fn no_window_transcodes_everything() {
        for (start, end) in [(0.0, 0.0), (10.0, 10.0), (0.0, -0.0)] {
            let args = args_of(&request(AudioFormat::Wav, start, end));
            assert!(!args.contains(&"-t".to_owned()), "{args:?}");
        }
        let args = args_of(&request(AudioFormat::Wav, 0.0, 0.0));
        assert!(!args.contains(&"-ss".to_owned()));
    }

    #[test]
    fn mp3_is_192k_stereo_44k() {
        let args = args_of(&request(AudioFormat::Mp3, 0.0, 0.0));
        assert_eq!(value_after(&args, "-acodec").as_deref(), Some("libmp3lame"));
        assert_eq!(value_after(&args, "-b:a").as_deref(), Some("192k"));
        assert_eq!(value_after(&args, "-ac").as_deref(), Some("2"));
        assert_eq!(value_after(&args, "-ar").as_deref(), Some("44100"));
        assert_eq!(args.last().map(String::as_str), Some("/out/clip.mp3"));
    }

    #[test]
    fn wav_is_pcm16_stereo_44k() {
        let args = args_of(&request(AudioFormat::Wav, 0.0, 0.0));
        assert_eq!(value_after(&args, "-acodec").as_deref(), Some("pcm_s16le"));
        assert_eq!(value_after(&args, "-ac").as_deref(), Some("2"));
        assert_eq!(value_after(&args, "-ar").as_deref(), Some("44100"));
        assert!(!args.contains(&"-b:a".to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("/out/clip.wav"));
    }

    #[test]
    fn expected_length_combines_probe_and_window() {
        let full = request(AudioFormat::Mp3, 0.0, 0.0);
        assert_eq!(expected_length(Some(300.0), &full), Some(300.0));
        assert_eq!(expected_length(None, &full), None);

        let window = request(AudioFormat::Mp3, 30.0, 45.0);
        assert_eq!(expected_length(Some(300.0), &window), Some(15.0));
        assert_eq!(expected_length(None, &window), Some(15.0));
        assert_eq!(expected_length(Some(40.0), &window), Some(10.0));

        let tail = request(AudioFormat::Mp3, 100.0, 0.0);
        assert_eq!(expected_length(Some(300.0), &tail), Some(200.0));
        assert_eq!(expected_length(Some(50.0), &tail), None);
    }
}
