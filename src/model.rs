use std::path::PathBuf;

use crate::error::ClipError;

/// Metadata reported by the fetcher for a single video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    /// Site-specific video identifier
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Whole seconds of media
    pub duration_seconds: u64,
    /// Preview image location (may be empty)
    pub thumbnail_url: String,
}

/// Audio container/codec produced by the convert stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Mp3, AudioFormat::Wav];

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// One download action, built fresh from the form
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source_url: String,
    pub format: AudioFormat,
    /// Seconds into the media where the clip starts
    pub trim_start: f64,
    /// Seconds into the media where the clip ends, 0 means "until the end"
    pub trim_end: f64,
    pub destination_dir: PathBuf,
    pub file_name: String,
}

impl DownloadRequest {
    /// Rejects requests that must never reach a subprocess.
    pub fn validate(&self) -> Result<(), ClipError> {
        if self.source_url.trim().is_empty() {
            return Err(ClipError::InvalidRequest("Please enter a video URL".into()));
        }
        if self.file_name.trim().is_empty() {
            return Err(ClipError::InvalidRequest("Please enter a file name".into()));
        }
        if self.destination_dir.as_os_str().is_empty() {
            return Err(ClipError::InvalidRequest(
                "Please select an output folder".into(),
            ));
        }
        for (name, value) in [("start", self.trim_start), ("end", self.trim_end)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ClipError::InvalidRequest(format!(
                    "trim {name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Trim window as (seek, duration limit); `None` parts are not applied.
    pub fn trim_window(&self) -> (Option<f64>, Option<f64>) {
        let seek = (self.trim_start > 0.0).then_some(self.trim_start);
        let limit = (self.trim_end > 0.0 && self.trim_end > self.trim_start)
            .then(|| self.trim_end - self.trim_start);
        (seek, limit)
    }

    /// Final output location, extension matching the format.
    pub fn destination_path(&self) -> PathBuf {
        let name = self.file_name.trim();
        let ext = self.format.extension();
        let has_ext = name
            .rsplit_once('.')
            .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext));
        if has_ext {
            self.destination_dir.join(name)
        } else {
            self.destination_dir.join(format!("{name}.{ext}"))
        }
    }
}

/// Lifecycle of one pipeline run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Downloading,
    Converting,
    Done,
    Failed,
}

impl PipelineState {
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Downloading)
                | (Idle, Failed)
                | (Downloading, Converting)
                | (Downloading, Failed)
                | (Converting, Done)
                | (Converting, Failed)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Downloading => "Downloading audio...",
            PipelineState::Converting => "Converting and trimming...",
            PipelineState::Done => "Done",
            PipelineState::Failed => "Failed",
        }
    }
}

/// Side-channel notification emitted while a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Stage(PipelineState),
    /// Overall completion, 0 to 100
    Progress(u8),
}

/// Severity of the status line shown under the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Formats seconds as H:MM:SS
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Derives a file name from a video title: every character outside
/// `[A-Za-z0-9]` becomes `-`, lowercased, at most 50 characters.
pub fn default_file_name(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(50)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: f64, end: f64) -> DownloadRequest {
        DownloadRequest {
            source_url: "https://www.youtube.com/watch?v=abc".into(),
            format: AudioFormat::Mp3,
            trim_start: start,
            trim_end: end,
            destination_dir: PathBuf::from("/music"),
            file_name: "clip".into(),
        }
    }

    #[test]
    fn trim_window_applies_seek_and_limit() {
        assert_eq!(request(30.0, 45.0).trim_window(), (Some(30.0), Some(15.0)));
    }

    #[test]
    fn zero_end_means_full_stream() {
        assert_eq!(request(0.0, 0.0).trim_window(), (None, None));
        assert_eq!(request(10.0, 0.0).trim_window(), (Some(10.0), None));
    }

    #[test]
    fn inverted_window_applies_no_limit() {
        assert_eq!(request(20.0, 20.0).trim_window(), (Some(20.0), None));
        assert_eq!(request(40.0, 10.0).trim_window(), (Some(40.0), None));
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let mut req = request(0.0, 0.0);
        req.file_name = "  ".into();
        assert!(matches!(req.validate(), Err(ClipError::InvalidRequest(_))));

        let mut req = request(0.0, 0.0);
        req.destination_dir = PathBuf::new();
        assert!(matches!(req.validate(), Err(ClipError::InvalidRequest(_))));

        let req = request(-1.0, 0.0);
        assert!(matches!(req.validate(), Err(ClipError::InvalidRequest(_))));

        assert!(request(0.0, 12.5).validate().is_ok());
    }

    #[test]
    fn destination_path_gets_format_extension() {
        let req = request(0.0, 0.0);
        assert_eq!(req.destination_path(), PathBuf::from("/music/clip.mp3"));

        let mut req = request(0.0, 0.0);
        req.format = AudioFormat::Wav;
        req.file_name = "clip.wav".into();
        assert_eq!(req.destination_path(), PathBuf::from("/music/clip.wav"));
    }

    #[test]
    fn state_machine_only_moves_forward() {
        use PipelineState::*;
        assert!(Idle.can_advance_to(Downloading));
        assert!(Downloading.can_advance_to(Converting));
        assert!(Converting.can_advance_to(Done));
        assert!(Downloading.can_advance_to(Failed));
        assert!(!Idle.can_advance_to(Converting));
        assert!(!Converting.can_advance_to(Downloading));
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Done));
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_time(0.0), "0:00:00");
        assert_eq!(format_time(300.0), "0:05:00");
        assert_eq!(format_time(3725.9), "1:02:05");
    }

    #[test]
    fn file_name_from_title() {
        assert_eq!(default_file_name("Never Gonna Give You Up!"), "never-gonna-give-you-up-");
        let long = "a".repeat(80);
        assert_eq!(default_file_name(&long).len(), 50);
    }
}
