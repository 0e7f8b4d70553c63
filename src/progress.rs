use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::PipelineEvent;

/// Upper bound of the download stage's share of overall progress
pub const DOWNLOAD_CEILING: u8 = 50;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap());
static KEY_VALUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)=(\S*)\s*$").unwrap());

/// Extracts the first percentage in a line of fetcher output,
/// e.g. `[download]  42.3% of 3.20MiB at 1.1MiB/s` -> 42.3
pub fn parse_percent(line: &str) -> Option<f64> {
    PERCENT_RE
        .captures(line)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

/// Download-stage mapping: the raw percentage capped at 50.
pub fn download_progress(percent: f64) -> u8 {
    percent.max(0.0).min(DOWNLOAD_CEILING as f64).floor() as u8
}

/// Convert-stage mapping: `50 + floor(fraction * 50)`, fraction clamped to [0, 1].
pub fn convert_progress(fraction: f64) -> u8 {
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    DOWNLOAD_CEILING + (fraction * 50.0).floor() as u8
}

/// Elapsed output time, in seconds, from one line of `ffmpeg -progress` output.
///
/// ffmpeg writes both `out_time_ms` and `out_time_us`; despite its name the
/// former is also in microseconds.
pub fn parse_out_time(line: &str) -> Option<f64> {
    let caps = KEY_VALUE_RE.captures(line)?;
    match &caps[1] {
        "out_time_ms" | "out_time_us" => caps[2]
            .parse::<i64>()
            .ok()
            .map(|us| us.max(0) as f64 / 1_000_000.0),
        _ => None,
    }
}

/// Publishes pipeline events, dropping any progress value that would move
/// the displayed percentage backwards.
pub struct ProgressReporter {
    tx: UnboundedSender<PipelineEvent>,
    last: Option<u8>,
}

impl ProgressReporter {
    pub fn new(tx: UnboundedSender<PipelineEvent>) -> Self {
        Self { tx, last: None }
    }

    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent < last) {
            return;
        }
        self.last = Some(percent);
        // The receiver may be gone if the window closed; progress is best-effort.
        let _ = self.tx.send(PipelineEvent::Progress(percent));
    }

    pub fn send(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}
