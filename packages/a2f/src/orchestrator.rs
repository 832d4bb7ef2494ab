//! File conversion flows
//!
//! A conversion walks the server through the same sequence every time:
//!
//! 1. make sure the server is ready
//! 2. load the conversion scene, unless it is already loaded
//! 3. point the player at the track's directory
//! 4. select the track
//! 5. optionally generate emotion keys
//! 6. export the blendshape animation
//!
//! Steps 1 and 2 run once per folder; steps 3 to 6 run per file.

use std::path::{Path, PathBuf};

use a2f_domain::EmotionSettingsPatch;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::a2e;
use crate::config::A2fConfig;
use crate::error::{A2fError, IoErrorExt, Result};
use crate::export::{self, ExportOutcome};
use crate::gateway::Gateway;
use crate::lifecycle::{ReadinessState, ServerLifecycle};
use crate::player;
use crate::session::SessionState;

/// Extensions picked up by folder conversion (compared case-insensitively)
pub const AUDIO_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Suffix appended to each file stem by folder conversion
pub const FOLDER_OUTPUT_SUFFIX: &str = "_a2f_animation";

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub fps: u32,
    /// Generate emotion keys before exporting.
    pub detect_emotion: bool,
    /// Merged into the session settings before key generation.
    pub emotion_settings: EmotionSettingsPatch,
    pub show_progress: bool,
}

impl ConvertOptions {
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            detect_emotion: false,
            emotion_settings: EmotionSettingsPatch::default(),
            show_progress: true,
        }
    }

    #[must_use]
    pub fn with_emotion(mut self, settings: EmotionSettingsPatch) -> Self {
        self.detect_emotion = true;
        self.emotion_settings = settings;
        self
    }

    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }
}

/// A file of a folder conversion that did not convert
#[derive(Debug)]
pub struct FileFailure {
    pub input: PathBuf,
    pub error: A2fError,
}

/// Result of a folder conversion
#[derive(Debug, Default)]
pub struct FolderReport {
    pub converted: Vec<ExportOutcome>,
    pub failed: Vec<FileFailure>,
}

impl FolderReport {
    /// Paths handed to the exporter, in processing order
    pub fn outputs(&self) -> Vec<&Path> {
        self.converted.iter().map(|o| o.path.as_path()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequences the per-capability operations into conversion flows.
///
/// Borrows every piece of session state for the duration of one flow.
pub struct SceneOrchestrator<'a, G: Gateway> {
    gateway: &'a G,
    lifecycle: &'a mut ServerLifecycle,
    session: &'a mut SessionState,
    config: &'a A2fConfig,
    cancel: &'a CancellationToken,
}

impl<'a, G: Gateway> SceneOrchestrator<'a, G> {
    pub fn new(
        gateway: &'a G,
        lifecycle: &'a mut ServerLifecycle,
        session: &'a mut SessionState,
        config: &'a A2fConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            gateway,
            lifecycle,
            session,
            config,
            cancel,
        }
    }

    /// Ensure readiness and load `scene`. A timed-out wait is an error here.
    pub async fn prepare_scene(&mut self, scene: &Path) -> Result<()> {
        let state = self.lifecycle.ensure_ready(self.gateway, self.cancel).await;
        self.session.follow_server(self.lifecycle.generation());
        match state? {
            ReadinessState::Ready => {}
            _ => {
                return Err(A2fError::Timeout {
                    waited: self.config.startup_timeout(),
                });
            }
        }

        let scene = std::path::absolute(scene).with_path(scene)?;
        self.session
            .load_scene_if_needed(self.gateway, &scene.to_string_lossy())
            .await?;
        Ok(())
    }

    /// Convert one audio file into a blendshape animation at `output`.
    ///
    /// A relative `audio` path is resolved against the working directory
    /// before the server sees it. The returned outcome names the file the
    /// server writes, see [`export::export_blendshapes`].
    ///
    /// # Errors
    /// `TrackNotFound` before any network call if `audio` is missing.
    /// Readiness, scene load, and transport failures of the player calls
    /// abort. A rejected export does not: it is reported in the outcome.
    pub async fn convert_one(
        &mut self,
        audio: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<ExportOutcome> {
        let audio = std::path::absolute(audio).with_path(audio)?;
        if !audio.is_file() {
            return Err(A2fError::TrackNotFound { path: audio });
        }

        let scene = self.config.mark_scene.clone();
        self.prepare_scene(&scene).await?;
        self.convert_track(&audio, output, options).await
    }

    /// Convert every `.wav`/`.mp3` file directly inside `input` into
    /// `<output>/<stem>_a2f_animation.usd`.
    ///
    /// Files are processed one after another in name order. A failing file is
    /// recorded in the report and does not stop the batch.
    ///
    /// # Errors
    /// Listing `input`, readiness, and the scene load are fatal.
    pub async fn convert_folder(
        &mut self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<FolderReport> {
        let tracks = list_audio_files(input).await?;
        info!(folder = %input.display(), files = tracks.len(), "converting folder");

        let scene = self.config.mark_scene.clone();
        self.prepare_scene(&scene).await?;

        let progress = folder_progress(tracks.len() as u64, options.show_progress);
        let mut report = FolderReport::default();

        for track in tracks {
            let name = track
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.set_message(format!("Processing {name}"));

            let target = folder_output_path(output, &track);
            match self.convert_track(&track, &target, options).await {
                Ok(outcome) => report.converted.push(outcome),
                Err(error) => {
                    warn!(track = %track.display(), %error, "conversion failed");
                    report.failed.push(FileFailure {
                        input: track,
                        error,
                    });
                }
            }
            progress.inc(1);
        }

        progress.finish_with_message(format!(
            "{} converted, {} failed",
            report.converted.len(),
            report.failed.len()
        ));
        Ok(report)
    }

    async fn convert_track(
        &mut self,
        audio: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<ExportOutcome> {
        let player_path = &self.config.instances.player;
        let root = audio.parent().unwrap_or_else(|| Path::new("."));

        player::set_root_path(self.gateway, player_path, root).await?;
        player::set_track(self.gateway, player_path, audio).await?;

        if options.detect_emotion {
            a2e::generate_keys(self.gateway, self.session, &options.emotion_settings).await?;
        }

        export::export_blendshapes(
            self.gateway,
            &self.config.instances.solver,
            output,
            options.fps,
        )
        .await
    }
}

/// `.wav`/`.mp3` files directly inside `dir`, sorted by path
pub async fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = std::path::absolute(dir).with_path(dir)?;
    let mut entries = tokio::fs::read_dir(&dir).await.with_path(&dir)?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.with_path(&dir)? {
        let path = entry.path();
        let is_audio = path.extension().is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|wanted| ext.eq_ignore_ascii_case(wanted))
        });
        if is_audio && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// `<output_dir>/<stem>_a2f_animation.usd`
pub fn folder_output_path(output_dir: &Path, track: &Path) -> PathBuf {
    let stem = track
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}{FOLDER_OUTPUT_SUFFIX}.usd"))
}

fn folder_progress(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
