//! Local mirror of server-side session state.
//!
//! Remembers the last scene the server confirmed and skips identical loads.
//! Emotion settings work the same way: the complete object last accepted by
//! the server is kept and an identical push is skipped.
//!
//! Both caches describe one server process. When the lifecycle reports a new
//! process generation they are cleared and the next call talks to the server
//! again.

use a2f_domain::{EmotionSettings, EmotionSettingsPatch};
use tracing::{debug, info, warn};

use crate::endpoints::{A2fEndpoint, LoadScene, SetSettings};
use crate::error::{A2fError, Result};
use crate::gateway::Gateway;

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    loaded_scene: Option<String>,
    settings: EmotionSettings,
    pushed_settings: Option<EmotionSettings>,
    server_generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose emotion settings start from `settings`
    pub fn with_settings(settings: EmotionSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Scene last confirmed by the server, if any
    pub fn loaded_scene(&self) -> Option<&str> {
        self.loaded_scene.as_deref()
    }

    /// Current emotion settings of this session
    pub fn settings(&self) -> &EmotionSettings {
        &self.settings
    }

    /// Settings object last accepted by the server, if any
    pub fn pushed_settings(&self) -> Option<&EmotionSettings> {
        self.pushed_settings.as_ref()
    }

    /// Forget everything mirrored from the server.
    ///
    /// The session's own settings are kept; they are pushed again on the
    /// next settings call.
    pub fn invalidate(&mut self) {
        if self.loaded_scene.is_some() || self.pushed_settings.is_some() {
            info!("server process changed, dropping mirrored scene and settings");
        }
        self.loaded_scene = None;
        self.pushed_settings = None;
    }

    /// Invalidate unless `generation` is the server process this session
    /// last saw.
    pub fn follow_server(&mut self, generation: u64) {
        if self.server_generation != generation {
            self.invalidate();
            self.server_generation = generation;
        }
    }

    /// Load `scene` unless it is already the loaded scene.
    ///
    /// Returns `Ok(true)` when a load call was issued and confirmed,
    /// `Ok(false)` when the cached scene matched. A failed load leaves the
    /// cache untouched so the next call tries again.
    pub async fn load_scene_if_needed<G: Gateway>(
        &mut self,
        gateway: &G,
        scene: &str,
    ) -> Result<bool> {
        if self.loaded_scene.as_deref() == Some(scene) {
            debug!(scene, "scene already loaded");
            return Ok(false);
        }

        info!(scene, "load scene");
        let result = gateway.send(&LoadScene { file_name: scene }).await;
        if !result.is_confirmed() {
            let reason = result.failure_reason();
            warn!(scene, %reason, "scene load failed");
            return Err(A2fError::SceneLoad {
                scene: scene.to_string(),
                reason,
            });
        }

        self.loaded_scene = Some(scene.to_string());
        Ok(true)
    }

    /// Merge `patch` into the current settings and push the complete object.
    ///
    /// Returns `Ok(false)` without a remote call when the merged object equals
    /// the one the server already holds. The session's settings only change
    /// once the server confirms the push.
    pub async fn push_settings<G: Gateway>(
        &mut self,
        gateway: &G,
        patch: &EmotionSettingsPatch,
    ) -> Result<bool> {
        let merged = self.settings.merged(patch);
        if self.pushed_settings.as_ref() == Some(&merged) {
            debug!("emotion settings unchanged, skipping push");
            return Ok(false);
        }

        let result = gateway.send(&SetSettings { settings: &merged }).await;
        if !result.is_confirmed() {
            let reason = result.failure_reason();
            warn!(%reason, "emotion settings push failed");
            return Err(A2fError::Transport {
                route: SetSettings::PATH.to_string(),
                cause: reason,
            });
        }

        self.settings = merged.clone();
        self.pushed_settings = Some(merged);
        Ok(true)
    }

    /// Settings to use for a generation call: current settings merged with
    /// `patch`, stored back so later calls see the same values.
    pub fn settings_for_generation(&mut self, patch: &EmotionSettingsPatch) -> &EmotionSettings {
        if !patch.is_empty() {
            self.settings = self.settings.merged(patch);
        }
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RequestResult;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    #[derive(Default)]
    struct Recorder {
        posts: Mutex<Vec<(String, Value)>>,
        fail: bool,
    }

    impl Gateway for Recorder {
        async fn get(&self, _route: &str) -> RequestResult {
            RequestResult::Success(json!("OK"))
        }

        async fn post(&self, route: &str, payload: Value) -> RequestResult {
            self.posts.lock().push((route.to_string(), payload));
            if self.fail {
                RequestResult::TransportError("connection refused".into())
            } else {
                RequestResult::Success(json!({"status": "OK"}))
            }
        }
    }

    #[tokio::test]
    async fn loading_twice_issues_one_call() {
        let gateway = Recorder::default();
        let mut session = SessionState::new();

        assert!(session.load_scene_if_needed(&gateway, "/scenes/mark.usd").await.unwrap());
        assert!(!session.load_scene_if_needed(&gateway, "/scenes/mark.usd").await.unwrap());

        assert_eq!(gateway.posts.lock().len(), 1);
        assert_eq!(session.loaded_scene(), Some("/scenes/mark.usd"));
    }

    #[tokio::test]
    async fn failed_load_keeps_cache_for_retry() {
        let gateway = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut session = SessionState::new();

        assert!(session.load_scene_if_needed(&gateway, "/scenes/mark.usd").await.is_err());
        assert!(session.load_scene_if_needed(&gateway, "/scenes/mark.usd").await.is_err());

        assert_eq!(gateway.posts.lock().len(), 2);
        assert_eq!(session.loaded_scene(), None);
    }

    #[tokio::test]
    async fn server_error_status_is_not_a_confirmed_load() {
        struct Rejecting;
        impl Gateway for Rejecting {
            async fn get(&self, _route: &str) -> RequestResult {
                RequestResult::Success(json!("OK"))
            }
            async fn post(&self, _route: &str, _payload: Value) -> RequestResult {
                RequestResult::Success(json!({"status": "ERROR", "message": "bad usd"}))
            }
        }

        let mut session = SessionState::new();
        let err = session
            .load_scene_if_needed(&Rejecting, "/scenes/broken.usd")
            .await
            .unwrap_err();
        assert!(matches!(err, A2fError::SceneLoad { ref reason, .. } if reason == "bad usd"));
        assert_eq!(session.loaded_scene(), None);
    }

    #[tokio::test]
    async fn identical_settings_are_pushed_once_and_always_whole() {
        let gateway = Recorder::default();
        let mut session = SessionState::new();
        let patch = EmotionSettingsPatch::new().contrast(1.5);

        assert!(session.push_settings(&gateway, &patch).await.unwrap());
        assert!(!session.push_settings(&gateway, &patch).await.unwrap());
        assert!(
            session
                .push_settings(&gateway, &EmotionSettingsPatch::new().max_emotions(2))
                .await
                .unwrap()
        );

        let posts = gateway.posts.lock();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].1["a2e_contrast"], 1.5);
        assert_eq!(posts[1].1["a2e_max_emotions"], 2);
        assert_eq!(posts[1].1["a2e_window_size"], 1.4);
    }

    #[tokio::test]
    async fn rejected_push_leaves_settings_untouched() {
        let gateway = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut session = SessionState::new();

        let result = session
            .push_settings(&gateway, &EmotionSettingsPatch::new().stride(3.0))
            .await;

        assert!(result.is_err());
        assert_eq!(session.settings(), &EmotionSettings::default());
        assert!(session.pushed_settings().is_none());
    }

    #[tokio::test]
    async fn new_server_generation_forgets_scene_and_pushed_settings() {
        let gateway = Recorder::default();
        let mut session = SessionState::new();
        let patch = EmotionSettingsPatch::new().contrast(1.2);

        session.load_scene_if_needed(&gateway, "/scenes/mark.usd").await.unwrap();
        session.push_settings(&gateway, &patch).await.unwrap();

        session.follow_server(0);
        assert_eq!(session.loaded_scene(), Some("/scenes/mark.usd"));

        session.follow_server(1);
        assert_eq!(session.loaded_scene(), None);
        assert!(session.pushed_settings().is_none());
        assert_eq!(session.settings().contrast, 1.2);

        assert!(session.load_scene_if_needed(&gateway, "/scenes/mark.usd").await.unwrap());
        assert!(session.push_settings(&gateway, &patch).await.unwrap());
        assert_eq!(gateway.posts.lock().len(), 4);
    }
}
