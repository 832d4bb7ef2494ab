//! Typed descriptions of the headless server's REST routes.
//!
//! Each endpoint is a small struct holding exactly the data its payload
//! needs. The route path and method are associated constants so the gateway
//! can dispatch without string matching.

use serde_json::{Value, json};

use a2f_domain::{EmotionSettings, EmotionVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

pub trait A2fEndpoint {
    const PATH: &'static str;

    const METHOD: Method = Method::Post;

    fn payload(&self) -> Value {
        Value::Null
    }
}

/// `GET status`: readiness probe, answers `"OK"` when ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct Status;

impl A2fEndpoint for Status {
    const PATH: &'static str = "status";
    const METHOD: Method = Method::Get;
}

/// `GET A2F/GetInstances`
#[derive(Debug, Clone, Copy, Default)]
pub struct GetInstances;

impl A2fEndpoint for GetInstances {
    const PATH: &'static str = "A2F/GetInstances";
    const METHOD: Method = Method::Get;
}

#[derive(Debug, Clone)]
pub struct LoadScene<'a> {
    pub file_name: &'a str,
}

impl A2fEndpoint for LoadScene<'_> {
    const PATH: &'static str = "A2F/USD/Load";

    fn payload(&self) -> Value {
        json!({ "file_name": self.file_name })
    }
}

#[derive(Debug, Clone)]
pub struct SetRootPath<'a> {
    pub player: &'a str,
    pub dir_path: &'a str,
}

impl A2fEndpoint for SetRootPath<'_> {
    const PATH: &'static str = "A2F/Player/SetRootPath";

    fn payload(&self) -> Value {
        json!({
            "a2f_player": self.player,
            "dir_path": self.dir_path,
        })
    }
}

/// Selects a track by file name relative to the player's root path; the
/// whole track is played (`time_range: [0, -1]`).
#[derive(Debug, Clone)]
pub struct SetTrack<'a> {
    pub player: &'a str,
    pub file_name: &'a str,
}

impl A2fEndpoint for SetTrack<'_> {
    const PATH: &'static str = "A2F/Player/SetTrack";

    fn payload(&self) -> Value {
        json!({
            "a2f_player": self.player,
            "file_name": self.file_name,
            "time_range": [0, -1],
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetFrame<'a> {
    pub instance: &'a str,
    pub frame: i64,
    pub as_timestamp: bool,
}

impl A2fEndpoint for SetFrame<'_> {
    const PATH: &'static str = "A2F/Player/SetFrame";

    fn payload(&self) -> Value {
        json!({
            "a2f_instance": self.instance,
            "frame": self.frame,
            "as_timestamp": self.as_timestamp,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetSettings<'a> {
    pub settings: &'a EmotionSettings,
}

impl A2fEndpoint for SetSettings<'_> {
    const PATH: &'static str = "A2F/A2E/SetSettings";

    fn payload(&self) -> Value {
        settings_payload(self.settings)
    }
}

#[derive(Debug, Clone)]
pub struct EnableAutoGenerate<'a> {
    pub instance: &'a str,
    pub enable: bool,
}

impl A2fEndpoint for EnableAutoGenerate<'_> {
    const PATH: &'static str = "A2F/A2E/EnableAutoGenerateOnTrackChange";

    fn payload(&self) -> Value {
        json!({
            "a2f_instance": self.instance,
            "enable": self.enable,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetEmotion<'a> {
    pub instance: &'a str,
    pub emotion: &'a EmotionVector,
}

impl A2fEndpoint for SetEmotion<'_> {
    const PATH: &'static str = "A2F/A2E/SetEmotion";

    fn payload(&self) -> Value {
        json!({
            "a2f_instance": self.instance,
            "emotion": self.emotion.as_slice(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GenerateKeys<'a> {
    pub settings: &'a EmotionSettings,
}

impl A2fEndpoint for GenerateKeys<'_> {
    const PATH: &'static str = "A2F/A2E/GenerateKeys";

    fn payload(&self) -> Value {
        settings_payload(self.settings)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetEmotionNames;

impl A2fEndpoint for GetEmotionNames {
    const PATH: &'static str = "A2F/A2E/GetEmotionNames";
    const METHOD: Method = Method::Get;
}

#[derive(Debug, Clone)]
pub struct GetEmotion<'a> {
    pub instance: &'a str,
    pub frame: i64,
}

impl A2fEndpoint for GetEmotion<'_> {
    const PATH: &'static str = "A2F/A2E/GetEmotion";

    fn payload(&self) -> Value {
        json!({
            "a2f_instance": self.instance,
            "as_vector": true,
            "frame": self.frame,
            "as_timestamp": false,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExportBlendshapes<'a> {
    pub solver: &'a str,
    pub export_directory: &'a str,
    pub file_name: &'a str,
    pub format: &'a str,
    pub fps: u32,
}

impl A2fEndpoint for ExportBlendshapes<'_> {
    const PATH: &'static str = "A2F/Exporter/ExportBlendshapes";

    fn payload(&self) -> Value {
        json!({
            "solver_node": self.solver,
            "export_directory": self.export_directory,
            "file_name": self.file_name,
            "format": self.format,
            "batch": false,
            "fps": self.fps,
        })
    }
}

fn settings_payload(settings: &EmotionSettings) -> Value {
    // EmotionSettings only holds plain numbers and strings
    serde_json::to_value(settings).unwrap_or(Value::Null)
}
