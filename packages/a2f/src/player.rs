//! Audio player operations

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::endpoints::{A2fEndpoint, GetInstances, SetFrame, SetRootPath, SetTrack};
use crate::error::{A2fError, Result};
use crate::gateway::Gateway;

/// Point `player` at the directory its tracks are resolved against.
pub async fn set_root_path<G: Gateway>(gateway: &G, player: &str, dir: &Path) -> Result<()> {
    let dir_path = dir.to_string_lossy();
    debug!(player, dir = %dir_path, "set root path");
    gateway
        .send(&SetRootPath {
            player,
            dir_path: &dir_path,
        })
        .await
        .settle(SetRootPath::PATH)?;
    Ok(())
}

/// Select `track` as the active track of `player`.
///
/// The track must exist locally; only its file name is sent, relative to the
/// player's root path.
pub async fn set_track<G: Gateway>(gateway: &G, player: &str, track: &Path) -> Result<()> {
    if !track.is_file() {
        return Err(A2fError::TrackNotFound {
            path: track.to_path_buf(),
        });
    }
    let file_name = track
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    debug!(player, track = %file_name, "set track");
    gateway
        .send(&SetTrack {
            player,
            file_name: &file_name,
        })
        .await
        .settle(SetTrack::PATH)?;
    Ok(())
}

/// Move the playhead of `instance`. With `as_timestamp` the value is read as
/// seconds rather than a frame index.
pub async fn set_frame<G: Gateway>(
    gateway: &G,
    instance: &str,
    frame: i64,
    as_timestamp: bool,
) -> Result<()> {
    gateway
        .send(&SetFrame {
            instance,
            frame,
            as_timestamp,
        })
        .await
        .settle(SetFrame::PATH)?;
    Ok(())
}

/// Prim paths of the instances in the loaded scene, as reported by the server
pub async fn instances<G: Gateway>(gateway: &G) -> Result<Value> {
    gateway
        .send(&GetInstances)
        .await
        .into_result(GetInstances::PATH)
        .map(unwrap_result)
}

/// Responses are usually `{"status": .., "result": ..}`; return `result` when
/// present and the whole value otherwise.
pub(crate) fn unwrap_result(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.contains_key("result") => {
            object.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RequestResult;
    use parking_lot::Mutex;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl Gateway for Recorder {
        async fn get(&self, route: &str) -> RequestResult {
            self.calls.lock().push((route.to_string(), Value::Null));
            RequestResult::Success(json!({
                "status": "OK",
                "result": {"fullface_instances": ["/World/audio2face/CoreFullface"]}
            }))
        }

        async fn post(&self, route: &str, payload: Value) -> RequestResult {
            self.calls.lock().push((route.to_string(), payload));
            RequestResult::DecodeError("<empty>".into())
        }
    }

    #[tokio::test]
    async fn missing_track_fails_before_any_call() {
        let gateway = Recorder::default();
        let dir = tempdir().unwrap();

        let err = set_track(&gateway, "/World/audio2face/Player", &dir.path().join("gone.wav"))
            .await
            .unwrap_err();

        assert!(matches!(err, A2fError::TrackNotFound { .. }));
        assert!(gateway.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn track_is_sent_by_file_name() {
        let gateway = Recorder::default();
        let dir = tempdir().unwrap();
        let track = dir.path().join("line_01.wav");
        std::fs::write(&track, b"RIFF").unwrap();

        set_track(&gateway, "/World/audio2face/Player", &track).await.unwrap();

        let calls = gateway.calls.lock();
        assert_eq!(calls[0].0, "A2F/Player/SetTrack");
        assert_eq!(calls[0].1["file_name"], "line_01.wav");
    }

    #[tokio::test]
    async fn instances_unwraps_result_field() {
        let listed = instances(&Recorder::default()).await.unwrap();
        assert_eq!(listed["fullface_instances"][0], "/World/audio2face/CoreFullface");
    }

    #[test]
    fn bare_values_pass_through() {
        assert_eq!(unwrap_result(json!("OK")), json!("OK"));
        assert_eq!(unwrap_result(json!({"a": 1})), json!({"a": 1}));
    }
}
