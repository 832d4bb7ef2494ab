mod common;

use a2f_client::domain::{Emotion, EmotionSettingsPatch, EmotionVector};
use a2f_client::{A2fClient, A2fConfig, A2fError};
use common::{FakeLauncher, RecordingGateway, test_config};
use tempfile::tempdir;

#[tokio::test]
async fn emotion_calls_bring_up_the_conversion_scene_once() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let scene = config.mark_scene.to_string_lossy().into_owned();

    let mut client = A2fClient::with_parts(config, RecordingGateway::ready(), FakeLauncher::default());
    let joyful = EmotionVector::NEUTRAL.with(Emotion::Joy, 0.8);
    client.set_emotion(&joyful, true).await.unwrap();
    client
        .set_emotion_settings(&EmotionSettingsPatch::new().contrast(1.3))
        .await
        .unwrap();

    assert_eq!(
        client.gateway().routes(),
        [
            "status",
            "A2F/USD/Load",
            "A2F/A2E/SetSettings",
            "A2F/A2E/SetEmotion",
            "A2F/A2E/SetSettings",
        ]
    );
    assert_eq!(client.gateway().calls()[1].payload["file_name"], scene);
    assert_eq!(client.session().loaded_scene(), Some(scene.as_str()));
}

#[tokio::test(start_paused = true)]
async fn emotion_settings_without_a_server_fail_before_pushing() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let mut client = A2fClient::with_parts(
        A2fConfig {
            startup_timeout_secs: 1,
            ..config
        },
        RecordingGateway::never_ready(),
        FakeLauncher::default(),
    );
    let err = client
        .set_emotion_settings(&EmotionSettingsPatch::new().max_emotions(3))
        .await
        .unwrap_err();

    assert!(matches!(err, A2fError::Timeout { .. }));
    assert!(client.gateway().mutations().is_empty());
}

#[tokio::test]
async fn set_frame_targets_the_emotion_core() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let emotion_core = config.instances.emotion.clone();

    let client = A2fClient::with_parts(config, RecordingGateway::ready(), FakeLauncher::default());
    client.set_frame(120, false).await.unwrap();

    let calls = client.gateway().calls();
    assert_eq!(calls[0].route, "A2F/Player/SetFrame");
    assert_eq!(calls[0].payload["a2f_instance"], emotion_core);
    assert_eq!(calls[0].payload["frame"], 120);
}
