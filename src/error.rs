use std::path::PathBuf;
use thiserror::Error;

/// Every failure the clipper can report back to the UI.
///
/// The `Display` text is what the user sees in the status line.
#[derive(Error, Debug)]
pub enum ClipError {
    #[error("{tool} not found at {}. Please install it using: {hint}", path.display())]
    ToolNotFound {
        tool: &'static str,
        path: PathBuf,
        hint: &'static str,
    },

    #[error("Failed to fetch video information: {0}")]
    Fetch(String),

    #[error("Download failed: {0}")]
    DownloadStage(String),

    #[error("Conversion failed: {0}")]
    ConvertStage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_message_carries_hint() {
        let err = ClipError::ToolNotFound {
            tool: "yt-dlp",
            path: PathBuf::from("/nowhere/yt-dlp"),
            hint: "brew install yt-dlp",
        };
        let msg = err.to_string();
        assert!(msg.contains("/nowhere/yt-dlp"));
        assert!(msg.ends_with("brew install yt-dlp"));
    }
}
