//! The download-and-convert pipeline.
//!
//! A run moves through `Idle -> Downloading -> Converting -> Done`, or to
//! `Failed` from any non-terminal state. The convert stage takes the
//! [`TempArtifact`] that only a successful download produces, so it cannot
//! start early, and the artifact deletes itself however the run ends.
//!
//! [`TempArtifact`]: crate::downloader::TempArtifact

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::converter::convert;
use crate::downloader::download_audio;
use crate::error::ClipError;
use crate::locator::{Tool, check_tool};
use crate::model::{DownloadRequest, PipelineEvent, PipelineState};
use crate::progress::{DOWNLOAD_CEILING, ProgressReporter};

/// Terminal value of a run: the written file, or why there is none.
pub type PipelineResult = Result<PathBuf, ClipError>;

/// Single-use executor for one download action
pub struct Pipeline {
    config: Arc<AppConfig>,
    state: PipelineState,
    progress: ProgressReporter,
}

impl Pipeline {
    pub fn new(config: Arc<AppConfig>, events: UnboundedSender<PipelineEvent>) -> Self {
        Self {
            config,
            state: PipelineState::Idle,
            progress: ProgressReporter::new(events),
        }
    }

    /// Runs both stages to completion. Never panics on tool failure; every
    /// problem comes back as the `Err` side of the result.
    pub async fn run(mut self, request: DownloadRequest) -> PipelineResult {
        let result = self.execute(&request).await;
        match &result {
            Ok(path) => {
                self.progress.report(100);
                self.advance(PipelineState::Done);
                info!("Audio saved successfully to: {}", path.display());
            }
            Err(e) => {
                self.advance(PipelineState::Failed);
                error!("Download of {} failed: {}", request.source_url, e);
            }
        }
        result
    }

    async fn execute(&mut self, request: &DownloadRequest) -> PipelineResult {
        request.validate()?;
        check_tool(Tool::YtDlp, &self.config.tools.yt_dlp).await?;

        self.advance(PipelineState::Downloading);
        let artifact =
            download_audio(&self.config, &request.source_url, &mut self.progress).await?;

        self.advance(PipelineState::Converting);
        self.progress.report(DOWNLOAD_CEILING);
        convert(&self.config, artifact, request, &mut self.progress).await
    }

    fn advance(&mut self, next: PipelineState) {
        if !self.state.can_advance_to(next) {
            warn!("ignoring pipeline transition {:?} -> {:?}", self.state, next);
            return;
        }
        info!("pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
        self.progress.send(PipelineEvent::Stage(next));
    }
}
