use std::process::Stdio;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::ClipError;
use crate::locator::{Tool, check_tool};
use crate::model::VideoMetadata;
use crate::process::LastError;

/// Subset of the `--dump-json` record the UI needs
#[derive(Deserialize)]
struct RawInfo {
    id: String,
    title: String,
    #[serde(default)]
    duration: Option<Value>,
    #[serde(default)]
    thumbnail: Option<String>,
}

/// Whole seconds from a numeric or numeric-string duration; anything else is 0.
fn duration_seconds(value: Option<&Value>) -> u64 {
    let secs = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    secs.filter(|s| s.is_finite() && *s > 0.0)
        .map(|s| s.trunc() as u64)
        .unwrap_or(0)
}

/// Parses the fetcher's metadata dump. Playlists produce one object per
/// entry; the first one wins.
pub fn parse_metadata(raw: &[u8]) -> Result<VideoMetadata, ClipError> {
    let info = serde_json::Deserializer::from_slice(raw)
        .into_iter::<RawInfo>()
        .next()
        .ok_or_else(|| ClipError::Fetch("yt-dlp returned no metadata".into()))?
        .map_err(|e| ClipError::Fetch(format!("unreadable metadata: {e}")))?;

    Ok(VideoMetadata {
        duration_seconds: duration_seconds(info.duration.as_ref()),
        thumbnail_url: info.thumbnail.unwrap_or_default(),
        id: info.id,
        title: info.title,
    })
}

/// Asks the fetcher for a video's metadata. A single attempt; retrying is
/// left to the user.
pub async fn fetch_metadata(config: &AppConfig, url: &str) -> Result<VideoMetadata, ClipError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ClipError::InvalidRequest("Please enter a video URL".into()));
    }
    let version = check_tool(Tool::YtDlp, &config.tools.yt_dlp).await?;
    debug!("yt-dlp version {}", version);

    let mut child = Command::new(&config.tools.yt_dlp)
        .arg("--dump-json")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClipError::Fetch(format!("Failed to spawn yt-dlp: {e}")))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(ClipError::Fetch("yt-dlp output pipes unavailable".into()));
    };

    // stderr is drained on its own task so a noisy fetcher never stalls stdout.
    let stderr_task = tokio::spawn(async move {
        let mut last = LastError::default();
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stderr);
        while let Ok(n) = reader.read_until(b'\n', &mut buf).await {
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            debug!("yt-dlp stderr> {}", line.trim_end());
            last.push(&line);
            buf.clear();
        }
        last
    });

    let limit = config.metadata_buffer_limit;
    let mut raw = Vec::new();
    stdout
        .take(limit as u64 + 1)
        .read_to_end(&mut raw)
        .await
        .map_err(|e| ClipError::Fetch(format!("Failed to read yt-dlp output: {e}")))?;

    if raw.len() > limit {
        let _ = child.kill().await;
        stderr_task.abort();
        return Err(ClipError::Fetch(format!(
            "metadata output exceeded {limit} bytes"
        )));
    }

    let status = child
        .wait()
        .await
        .map_err(|e| ClipError::Fetch(format!("yt-dlp did not exit cleanly: {e}")))?;
    let last_error = stderr_task.await.unwrap_or_default();

    if !status.success() {
        let message = last_error
            .into_message()
            .unwrap_or_else(|| format!("yt-dlp exited with {status}"));
        return Err(ClipError::Fetch(message));
    }

    let metadata = parse_metadata(&raw)?;
    info!(
        "Loaded \"{}\" ({}, {}s)",
        metadata.title, metadata.id, metadata.duration_seconds
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_fields_of_interest() {
        let raw = br#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","duration":212.9,
            "thumbnail":"https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg","formats":[]}"#;
        let meta = parse_metadata(raw).unwrap();
        assert_eq!(meta.id, "dQw4w9WgXcQ");
        assert_eq!(meta.title, "Never Gonna Give You Up");
        assert_eq!(meta.duration_seconds, 212);
        assert!(meta.thumbnail_url.ends_with("maxresdefault.jpg"));
    }

    #[test]
    fn coerces_odd_durations() {
        let string = br#"{"id":"a","title":"t","duration":"300"}"#;
        assert_eq!(parse_metadata(string).unwrap().duration_seconds, 300);

        let missing = br#"{"id":"a","title":"t"}"#;
        let meta = parse_metadata(missing).unwrap();
        assert_eq!(meta.duration_seconds, 0);
        assert_eq!(meta.thumbnail_url, "");

        let null = br#"{"id":"a","title":"t","duration":null}"#;
        assert_eq!(parse_metadata(null).unwrap().duration_seconds, 0);
    }

    #[test]
    fn first_playlist_entry_wins() {
        let raw = b"{\"id\":\"one\",\"title\":\"First\",\"duration\":10}\n\
                    {\"id\":\"two\",\"title\":\"Second\",\"duration\":20}\n";
        assert_eq!(parse_metadata(raw).unwrap().id, "one");
    }

    #[test]
    fn garbage_is_a_fetch_error() {
        assert!(matches!(parse_metadata(b""), Err(ClipError::Fetch(_))));
        assert!(matches!(parse_metadata(b"not json"), Err(ClipError::Fetch(_))));
        assert!(matches!(
            parse_metadata(br#"{"title":"no id"}"#),
            Err(ClipError::Fetch(_))
        ));
    }
}
