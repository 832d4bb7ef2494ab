//! Top-level client
//!
//! [`A2fClient`] owns one server session: the gateway, the lifecycle of the
//! server process, and the mirrored scene and emotion state. All operations
//! take `&mut self`, so a client is used from one task at a time.

use std::path::Path;

use a2f_domain::{AudioChunk, EmotionSettingsPatch, EmotionVector, StreamRequest};
use futures::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::a2e;
use crate::config::A2fConfig;
use crate::error::{A2fError, Result};
use crate::export::{self, ExportOutcome};
use crate::gateway::{Gateway, HttpGateway};
use crate::lifecycle::{DetachedLauncher, ReadinessState, ServerLauncher, ServerLifecycle};
use crate::orchestrator::{ConvertOptions, FolderReport, SceneOrchestrator};
use crate::player;
use crate::session::SessionState;
use crate::streaming::StreamingProtocolClient;

#[derive(Debug)]
pub struct A2fClient<G: Gateway = HttpGateway> {
    config: A2fConfig,
    gateway: G,
    lifecycle: ServerLifecycle,
    session: SessionState,
    cancel: CancellationToken,
}

impl A2fClient<HttpGateway> {
    /// Client for a local installation.
    ///
    /// # Errors
    /// Configuration errors, and `InstallationNotFound` when the install
    /// directory does not exist.
    pub fn new(config: A2fConfig) -> Result<Self> {
        config.validate()?;
        if !config.install_path.is_dir() {
            return Err(A2fError::InstallationNotFound {
                path: config.install_path.clone(),
            });
        }
        Self::remote(config)
    }

    /// Client for a server that is started elsewhere. Starting the server
    /// from this client still requires the installation.
    pub fn remote(config: A2fConfig) -> Result<Self> {
        config.validate()?;
        let gateway = HttpGateway::new(&config)?;
        Ok(Self::with_parts(config, gateway, DetachedLauncher))
    }
}

impl<G: Gateway> A2fClient<G> {
    /// Assemble a client from explicit parts
    pub fn with_parts(
        config: A2fConfig,
        gateway: G,
        launcher: impl ServerLauncher + 'static,
    ) -> Self {
        let lifecycle = ServerLifecycle::with_launcher(&config, launcher);
        let session = SessionState::with_settings(a2f_domain::EmotionSettings::for_instance(
            config.instances.emotion.clone(),
        ));
        Self {
            config,
            gateway,
            lifecycle,
            session,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &A2fConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn readiness(&self) -> ReadinessState {
        self.lifecycle.state()
    }

    /// Token that aborts a pending readiness wait when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One readiness probe without starting anything
    pub async fn is_ready(&self) -> bool {
        ServerLifecycle::probe(&self.gateway).await
    }

    pub async fn ensure_ready(&mut self) -> Result<ReadinessState> {
        let state = self.lifecycle.ensure_ready(&self.gateway, &self.cancel).await;
        self.session.follow_server(self.lifecycle.generation());
        state
    }

    /// Terminate the server this client started, if any. Scene and settings
    /// state mirrored from it is dropped.
    pub fn shutdown(&mut self) -> Result<()> {
        let result = self.lifecycle.shutdown();
        self.session.follow_server(self.lifecycle.generation());
        result
    }

    /// Process id of the server this client started, if any
    pub fn server_pid(&self) -> Option<u32> {
        self.lifecycle.process_id()
    }

    /// Load `scene` unless it is the scene already loaded by this session
    pub async fn load_scene(&mut self, scene: &Path) -> Result<bool> {
        let scene = std::path::absolute(scene).map_err(|source| A2fError::Io {
            path: scene.to_path_buf(),
            source,
        })?;
        self.session
            .load_scene_if_needed(&self.gateway, &scene.to_string_lossy())
            .await
    }

    pub async fn instances(&self) -> Result<Value> {
        player::instances(&self.gateway).await
    }

    pub async fn set_root_path(&self, dir: &Path) -> Result<()> {
        player::set_root_path(&self.gateway, &self.config.instances.player, dir).await
    }

    pub async fn set_track(&self, track: &Path) -> Result<()> {
        player::set_track(&self.gateway, &self.config.instances.player, track).await
    }

    /// Move the emotion core's playhead to `frame`
    pub async fn set_frame(&self, frame: i64, as_timestamp: bool) -> Result<()> {
        player::set_frame(&self.gateway, &self.config.instances.emotion, frame, as_timestamp).await
    }

    /// Merge `patch` into the session settings and push them if they changed.
    ///
    /// Starts the server and loads the conversion scene first when no scene
    /// is loaded yet.
    pub async fn set_emotion_settings(&mut self, patch: &EmotionSettingsPatch) -> Result<bool> {
        self.ensure_scene().await?;
        a2e::set_settings(&self.gateway, &mut self.session, patch).await
    }

    /// Apply a global emotion to the whole track. Like
    /// [`set_emotion_settings`](Self::set_emotion_settings), this brings up
    /// the conversion scene when no scene is loaded.
    pub async fn set_emotion(&mut self, emotion: &EmotionVector, update_settings: bool) -> Result<()> {
        self.ensure_scene().await?;
        a2e::set_emotion(
            &self.gateway,
            &mut self.session,
            &self.config.instances.emotion,
            emotion,
            update_settings,
        )
        .await
    }

    pub async fn set_auto_generate_on_track_change(&self, enable: bool) -> Result<()> {
        a2e::set_auto_generate_on_track_change(&self.gateway, &self.config.instances.emotion, enable)
            .await
    }

    pub async fn generate_keys(&mut self, patch: &EmotionSettingsPatch) -> Result<()> {
        a2e::generate_keys(&self.gateway, &mut self.session, patch).await
    }

    pub async fn emotion_names(&self) -> Result<Vec<String>> {
        a2e::emotion_names(&self.gateway).await
    }

    pub async fn emotion_at(&self, frame: i64) -> Result<EmotionVector> {
        a2e::emotion_at(&self.gateway, &self.config.instances.emotion, frame).await
    }

    pub async fn export(&self, output: &Path, fps: u32) -> Result<ExportOutcome> {
        export::export_blendshapes(&self.gateway, &self.config.instances.solver, output, fps).await
    }

    pub async fn convert_one(
        &mut self,
        audio: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<ExportOutcome> {
        self.orchestrator().convert_one(audio, output, options).await
    }

    pub async fn convert_folder(
        &mut self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<FolderReport> {
        self.orchestrator()
            .convert_folder(input, output, options)
            .await
    }

    /// Stream audio from `source` to the streaming player named in `request`.
    ///
    /// The streaming scene is loaded first. Cancelling the client's token
    /// before the first frame is sent aborts the call.
    pub async fn stream_audio<S>(&mut self, request: &StreamRequest, source: S) -> Result<bool>
    where
        S: Stream<Item = AudioChunk> + Unpin,
    {
        let mut streamer = StreamingProtocolClient::new(self.config.stream_addr()?)?;

        let scene = self.config.streaming_scene.clone();
        self.orchestrator().prepare_scene(&scene).await?;

        if self.cancel.is_cancelled() {
            return Err(A2fError::Cancelled);
        }

        info!(
            addr = streamer.addr(),
            instance = request.target_instance(),
            sample_rate = request.sample_rate(),
            "streaming audio"
        );
        streamer.stream(request, source).await
    }

    async fn ensure_scene(&mut self) -> Result<()> {
        if self.session.loaded_scene().is_some() {
            return Ok(());
        }
        let scene = self.config.mark_scene.clone();
        self.orchestrator().prepare_scene(&scene).await
    }

    fn orchestrator(&mut self) -> SceneOrchestrator<'_, G> {
        SceneOrchestrator::new(
            &self.gateway,
            &mut self.lifecycle,
            &mut self.session,
            &self.config,
            &self.cancel,
        )
    }
}
