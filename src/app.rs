//! The egui front end: a single form that loads a video, picks a trim window
//! and hands the request to the pipeline.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use eframe::{App, Frame, egui};
use egui::{Color32, ColorImage, TextureOptions};
use rfd::FileDialog;
use tokio::{
    runtime::Runtime,
    sync::{
        mpsc::{UnboundedReceiver, unbounded_channel},
        oneshot::{self, error::TryRecvError},
    },
};
use tracing::warn;

use crate::config::AppConfig;
use crate::error::ClipError;
use crate::metadata::fetch_metadata;
use crate::model::{
    AudioFormat, DownloadRequest, PipelineEvent, PipelineState, StatusKind, VideoMetadata,
    default_file_name, format_time,
};
use crate::pipeline::{Pipeline, PipelineResult};
use crate::thumbnail::fetch_thumbnail;

/// Smallest gap kept between trim start and end, in seconds
const MIN_CLIP: f64 = 0.1;
/// How long the "Download Complete!" label stays up
const COMPLETE_LINGER: Duration = Duration::from_secs(3);

/// Channels of the pipeline run currently in flight
struct ActiveRun {
    events: UnboundedReceiver<PipelineEvent>,
    result: oneshot::Receiver<PipelineResult>,
}

/// Application state for the GUI
pub struct ClipperApp {
    /// Runtime that owns every subprocess and blocking fetch
    runtime: Arc<Runtime>,
    /// Settings resolved once at startup
    config: Arc<AppConfig>,
    /// Input field for the video URL
    url_input: String,
    /// URL the current metadata was loaded from
    loaded_url: String,
    /// Metadata of the loaded video, if any
    metadata: Option<VideoMetadata>,
    /// Pending metadata lookup, tagged with the URL it was started for
    metadata_rx: Option<oneshot::Receiver<Result<(String, VideoMetadata), ClipError>>>,
    /// Texture for the loaded video's thumbnail
    thumbnail: Option<egui::TextureHandle>,
    /// Incoming thumbnail fetch results (video_id, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
    trim_start: f64,
    trim_end: f64,
    file_name: String,
    output_dir: String,
    format: AudioFormat,
    /// Pipeline run in flight; the form is locked while this is set
    run: Option<ActiveRun>,
    progress: u8,
    stage: PipelineState,
    status: Option<(StatusKind, String)>,
    /// Last successful output, for the "Open Folder" button
    last_output: Option<PathBuf>,
    completed_at: Option<Instant>,
}

impl ClipperApp {
    pub fn new(runtime: Arc<Runtime>, config: Arc<AppConfig>) -> Self {
        let output_dir = config
            .output_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        Self {
            runtime,
            config,
            url_input: String::new(),
            loaded_url: String::new(),
            metadata: None,
            metadata_rx: None,
            thumbnail: None,
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            trim_start: 0.0,
            trim_end: 0.0,
            file_name: String::new(),
            output_dir,
            format: AudioFormat::default(),
            run: None,
            progress: 0,
            stage: PipelineState::Idle,
            status: None,
            last_output: None,
            completed_at: None,
        }
    }

    fn busy(&self) -> bool {
        self.metadata_rx.is_some() || self.run.is_some()
    }

    fn set_status(&mut self, kind: StatusKind, message: impl Into<String>) {
        self.status = Some((kind, message.into()));
    }

    fn load_video(&mut self, ctx: &egui::Context) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() {
            self.set_status(StatusKind::Error, "Please enter a YouTube URL");
            return;
        }
        self.status = None;

        let (tx, rx) = oneshot::channel();
        self.metadata_rx = Some(rx);
        let config = Arc::clone(&self.config);
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = fetch_metadata(&config, &url).await;
            let _ = tx.send(result.map(|meta| (url, meta)));
            ctx.request_repaint();
        });
    }

    fn on_metadata(&mut self, url: String, meta: VideoMetadata) {
        self.loaded_url = url;
        self.trim_start = 0.0;
        self.trim_end = meta.duration_seconds as f64;
        self.file_name = default_file_name(&meta.title);
        self.thumbnail = None;
        self.completed_at = None;

        let id = meta.id.clone();
        let thumb_url = meta.thumbnail_url.clone();
        let results = Arc::clone(&self.thumbnail_results);
        self.runtime.spawn_blocking(move || {
            if let Some(img) = fetch_thumbnail(&thumb_url) {
                if let Ok(mut pending) = results.lock() {
                    pending.push((id, img));
                }
            }
        });

        self.metadata = Some(meta);
        self.set_status(StatusKind::Success, "Video loaded successfully!");
    }

    fn start_download(&mut self, ctx: &egui::Context) {
        let request = DownloadRequest {
            source_url: self.loaded_url.clone(),
            format: self.format,
            trim_start: self.trim_start,
            trim_end: self.trim_end,
            destination_dir: PathBuf::from(self.output_dir.trim()),
            file_name: self.file_name.trim().to_string(),
        };
        if let Err(e) = request.validate() {
            self.set_status(StatusKind::Error, e.to_string());
            return;
        }

        let (events_tx, events_rx) = unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        self.run = Some(ActiveRun {
            events: events_rx,
            result: result_rx,
        });
        self.progress = 0;
        self.stage = PipelineState::Idle;
        self.last_output = None;
        self.set_status(StatusKind::Info, "Downloading and converting audio...");

        let pipeline = Pipeline::new(Arc::clone(&self.config), events_tx);
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let _ = result_tx.send(pipeline.run(request).await);
            ctx.request_repaint();
        });
    }

    /// Pulls finished background work into the UI state.
    fn poll(&mut self, ctx: &egui::Context) {
        // 1️⃣ Metadata lookup
        if let Some(rx) = self.metadata_rx.as_mut() {
            match rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(Ok((url, meta))) => {
                    self.metadata_rx = None;
                    self.on_metadata(url, meta);
                }
                Ok(Err(e)) => {
                    self.metadata_rx = None;
                    self.set_status(StatusKind::Error, format!("Error: {e}"));
                }
                Err(TryRecvError::Closed) => {
                    self.metadata_rx = None;
                    self.set_status(StatusKind::Error, "Error: metadata lookup was interrupted");
                }
            }
        }

        // 2️⃣ Thumbnail for the current video
        let current_id = self.metadata.as_ref().map(|m| m.id.clone());
        if let Ok(mut pending) = self.thumbnail_results.lock() {
            for (vid, img) in pending.drain(..) {
                if current_id.as_deref() == Some(vid.as_str()) {
                    self.thumbnail = Some(ctx.load_texture(&vid, img, TextureOptions::default()));
                }
            }
        }

        // 3️⃣ Pipeline progress and outcome
        let Some(run) = self.run.as_mut() else {
            return;
        };
        while let Ok(event) = run.events.try_recv() {
            match event {
                // Only update if progress increased
                PipelineEvent::Progress(p) if p > self.progress => self.progress = p,
                PipelineEvent::Progress(_) => {}
                PipelineEvent::Stage(stage) => self.stage = stage,
            }
        }
        let outcome = match run.result.try_recv() {
            Err(TryRecvError::Empty) => return,
            Ok(outcome) => outcome,
            Err(TryRecvError::Closed) => Err(ClipError::ConvertStage(
                "the download task ended unexpectedly".into(),
            )),
        };
        self.run = None;
        match outcome {
            Ok(path) => {
                self.set_status(
                    StatusKind::Success,
                    format!("Audio saved successfully to: {}", path.display()),
                );
                self.last_output = Some(path);
                self.completed_at = Some(Instant::now());
            }
            Err(e) => self.set_status(StatusKind::Error, format!("Error: {e}")),
        }
    }

    fn source_section(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.label("Paste YouTube video URL:");
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.url_input);
            let label = if self.metadata_rx.is_some() { "Loading..." } else { "Load Video" };
            if ui.add_enabled(!self.busy(), egui::Button::new(label)).clicked() {
                self.load_video(ctx);
            }
        });

        let Some(meta) = &self.metadata else {
            return;
        };
        ui.separator();
        ui.horizontal(|ui| {
            if let Some(tex) = &self.thumbnail {
                ui.add(egui::Image::new(tex).max_width(160.0));
            }
            ui.vertical(|ui| {
                ui.strong(&meta.title);
                ui.label(format!("Duration: {}", format_time(meta.duration_seconds as f64)));
            });
        });
    }

    fn trim_section(&mut self, ui: &mut egui::Ui) {
        let Some(duration) = self.metadata.as_ref().map(|m| m.duration_seconds as f64) else {
            return;
        };
        ui.separator();
        ui.heading("Trim");
        if duration <= 0.0 {
            ui.label("Duration unknown; the full stream will be used.");
            return;
        }

        let start = ui.add(
            egui::Slider::new(&mut self.trim_start, 0.0..=duration)
                .text("Start")
                .step_by(MIN_CLIP)
                .custom_formatter(|v, _| format_time(v)),
        );
        if start.changed() && self.trim_start >= self.trim_end {
            self.trim_start = (self.trim_end - MIN_CLIP).max(0.0);
        }

        let end = ui.add(
            egui::Slider::new(&mut self.trim_end, 0.0..=duration)
                .text("End")
                .step_by(MIN_CLIP)
                .custom_formatter(|v, _| format_time(v)),
        );
        if end.changed() && self.trim_end <= self.trim_start {
            self.trim_end = (self.trim_start + MIN_CLIP).min(duration);
        }

        ui.label(format!(
            "Clip length: {}",
            format_time(self.trim_end - self.trim_start)
        ));
    }

    fn output_section(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.separator();
        ui.horizontal(|ui| {
            ui.label("File name:");
            ui.text_edit_singleline(&mut self.file_name);
            egui::ComboBox::from_label("Format")
                .selected_text(self.format.extension().to_uppercase())
                .show_ui(ui, |ui| {
                    for f in AudioFormat::ALL {
                        ui.selectable_value(&mut self.format, f, f.extension().to_uppercase());
                    }
                });
        });

        // Folder selection
        ui.horizontal(|ui| {
            ui.label("Output folder:");
            ui.text_edit_singleline(&mut self.output_dir);
            if ui.add_enabled(!self.busy(), egui::Button::new("Browse…")).clicked() {
                if let Some(folder) = FileDialog::new().set_directory(&self.output_dir).pick_folder() {
                    self.output_dir = folder.display().to_string();
                }
            }
        });

        let recently_done = self
            .completed_at
            .is_some_and(|t| t.elapsed() < COMPLETE_LINGER);
        let label = if self.run.is_some() {
            "Downloading..."
        } else if recently_done {
            "Download Complete!"
        } else {
            "Download Audio"
        };
        let ready = self.metadata.is_some() && !self.busy() && !recently_done;
        ui.horizontal(|ui| {
            if ui.add_enabled(ready, egui::Button::new(label)).clicked() {
                self.start_download(ctx);
            }
            if let Some(path) = &self.last_output {
                if ui.button("Open Folder").clicked() {
                    if let Some(folder) = path.parent() {
                        open_folder(folder);
                    }
                }
            }
        });

        if self.run.is_some() {
            ui.add(
                egui::ProgressBar::new(self.progress as f32 / 100.0)
                    .text(format!("{} {}%", self.stage.label(), self.progress)),
            );
        }
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        if let Some((kind, message)) = &self.status {
            let color = match kind {
                StatusKind::Info => Color32::LIGHT_BLUE,
                StatusKind::Success => Color32::GREEN,
                StatusKind::Error => Color32::RED,
            };
            ui.separator();
            ui.colored_label(color, message);
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for ClipperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("YouTube Audio Clipper");
            self.source_section(ui, ctx);
            self.trim_section(ui);
            self.output_section(ui, ctx);
            self.status_line(ui);
        });

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

/// Reveals `folder` in the platform file manager without blocking the UI.
fn open_folder(folder: &Path) {
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        let opener = if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        if let Err(e) = std::process::Command::new(opener).arg(&folder).spawn() {
            warn!("could not open {}: {}", folder.display(), e);
        }
    });
}
