//! Audio2Emotion operations
//!
//! Settings always travel as a complete object: every push and every key
//! generation first merges the caller's partial settings into the session's
//! current ones.

use a2f_domain::{EMOTION_COUNT, EmotionSettingsPatch, EmotionVector};
use serde_json::Value;
use tracing::{debug, info};

use crate::endpoints::{
    A2fEndpoint, EnableAutoGenerate, GenerateKeys, GetEmotion, GetEmotionNames, SetEmotion,
};
use crate::error::{A2fError, Result};
use crate::gateway::Gateway;
use crate::player::unwrap_result;
use crate::session::SessionState;

/// Merge `patch` into the session settings and push them if they changed.
pub async fn set_settings<G: Gateway>(
    gateway: &G,
    session: &mut SessionState,
    patch: &EmotionSettingsPatch,
) -> Result<bool> {
    session.push_settings(gateway, patch).await
}

/// Apply a global emotion to the whole track of `instance`.
///
/// With `update_settings`, the vector also becomes the session's preferred
/// emotion so that later key generation blends it in.
pub async fn set_emotion<G: Gateway>(
    gateway: &G,
    session: &mut SessionState,
    instance: &str,
    emotion: &EmotionVector,
    update_settings: bool,
) -> Result<()> {
    if update_settings {
        let patch = EmotionSettingsPatch::new().preferred_emotion(*emotion);
        session.push_settings(gateway, &patch).await?;
    }

    debug!(instance, ?emotion, "set emotion");
    gateway
        .send(&SetEmotion { instance, emotion })
        .await
        .settle(SetEmotion::PATH)?;
    Ok(())
}

/// Toggle automatic key generation whenever the player's track changes.
pub async fn set_auto_generate_on_track_change<G: Gateway>(
    gateway: &G,
    instance: &str,
    enable: bool,
) -> Result<()> {
    gateway
        .send(&EnableAutoGenerate { instance, enable })
        .await
        .settle(EnableAutoGenerate::PATH)?;
    Ok(())
}

/// Generate emotion keys for the current track.
pub async fn generate_keys<G: Gateway>(
    gateway: &G,
    session: &mut SessionState,
    patch: &EmotionSettingsPatch,
) -> Result<()> {
    let settings = session.settings_for_generation(patch);
    info!(instance = %settings.a2f_instance, "generate emotion keys");
    gateway
        .send(&GenerateKeys { settings })
        .await
        .settle(GenerateKeys::PATH)?;
    Ok(())
}

/// Emotion names known to the server, in vector order
pub async fn emotion_names<G: Gateway>(gateway: &G) -> Result<Vec<String>> {
    let value = gateway
        .send(&GetEmotionNames)
        .await
        .into_result(GetEmotionNames::PATH)?;

    match unwrap_result(value) {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()),
        other => Err(A2fError::Decode {
            route: GetEmotionNames::PATH.to_string(),
            body: other.to_string(),
        }),
    }
}

/// Emotion vector of `instance` at `frame`
pub async fn emotion_at<G: Gateway>(
    gateway: &G,
    instance: &str,
    frame: i64,
) -> Result<EmotionVector> {
    let value = gateway
        .send(&GetEmotion { instance, frame })
        .await
        .into_result(GetEmotion::PATH)?;

    let decode_error = |body: &Value| A2fError::Decode {
        route: GetEmotion::PATH.to_string(),
        body: body.to_string(),
    };

    let value = unwrap_result(value);
    let strengths = value
        .as_array()
        .ok_or_else(|| decode_error(&value))?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .filter(|s| s.len() == EMOTION_COUNT)
        .ok_or_else(|| decode_error(&value))?;

    Ok(EmotionVector::try_from(strengths.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RequestResult;
    use a2f_domain::Emotion;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Scripted {
        reply: Value,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl Scripted {
        fn replying(reply: Value) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn routes(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(r, _)| r.clone()).collect()
        }
    }

    impl Gateway for Scripted {
        async fn get(&self, route: &str) -> RequestResult {
            self.calls.lock().push((route.to_string(), Value::Null));
            RequestResult::Success(self.reply.clone())
        }

        async fn post(&self, route: &str, payload: Value) -> RequestResult {
            self.calls.lock().push((route.to_string(), payload));
            RequestResult::Success(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn emotion_with_settings_update_pushes_preferred_first() {
        let gateway = Scripted::replying(json!({"status": "OK"}));
        let mut session = SessionState::new();
        let joy = EmotionVector::NEUTRAL.with(Emotion::Joy, 0.8);

        set_emotion(&gateway, &mut session, "/World/audio2face/CoreFullface", &joy, true)
            .await
            .unwrap();

        assert_eq!(gateway.routes(), ["A2F/A2E/SetSettings", "A2F/A2E/SetEmotion"]);
        assert_eq!(session.settings().preferred_emotion, joy);
        let calls = gateway.calls.lock();
        assert_eq!(calls[1].1["emotion"][6].as_f64().unwrap() as f32, 0.8);
    }

    #[tokio::test]
    async fn generation_uses_merged_settings() {
        let gateway = Scripted::replying(json!({"status": "OK"}));
        let mut session = SessionState::new();

        generate_keys(&gateway, &mut session, &EmotionSettingsPatch::new().emotion_strength(0.9))
            .await
            .unwrap();
        generate_keys(&gateway, &mut session, &EmotionSettingsPatch::new())
            .await
            .unwrap();

        let calls = gateway.calls.lock();
        for (_, payload) in calls.iter() {
            assert_eq!(payload["a2e_emotion_strength"].as_f64().unwrap() as f32, 0.9);
            assert_eq!(payload["a2e_max_emotions"], 5);
        }
    }

    #[tokio::test]
    async fn names_are_read_from_result() {
        let gateway = Scripted::replying(json!({
            "status": "OK",
            "result": ["amazement", "anger", "cheekiness"]
        }));
        let names = emotion_names(&gateway).await.unwrap();
        assert_eq!(names, ["amazement", "anger", "cheekiness"]);
    }

    #[tokio::test]
    async fn emotion_at_rejects_short_vectors() {
        let gateway = Scripted::replying(json!({"status": "OK", "result": [0.1, 0.2]}));
        let err = emotion_at(&gateway, "/World/audio2face/CoreFullface", 12)
            .await
            .unwrap_err();
        assert!(matches!(err, A2fError::Decode { .. }));
    }

    #[tokio::test]
    async fn emotion_at_decodes_full_vector() {
        let gateway = Scripted::replying(json!({
            "status": "OK",
            "result": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.25]
        }));
        let vector = emotion_at(&gateway, "/World/audio2face/CoreFullface", 0)
            .await
            .unwrap();
        assert_eq!(vector.get(Emotion::Joy), 0.5);
        assert_eq!(vector.get(Emotion::Sadness), 0.25);
    }
}
