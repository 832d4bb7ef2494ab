//! Audio2Emotion generation settings and partial-update merging.
//!
//! The server only supports whole-object replacement of its settings, so the
//! client always pushes a complete [`EmotionSettings`]. Callers describe the
//! fields they want to change with an [`EmotionSettingsPatch`]; [`merge`]
//! folds the patch over the current settings so omitted fields keep whatever
//! value they already had.

use serde::{Deserialize, Serialize};

use crate::emotion::EmotionVector;

/// Prim path of the default emotion core.
pub const DEFAULT_A2E_INSTANCE: &str = "/World/audio2face/CoreFullface";

/// Complete settings object as accepted by `A2F/A2E/SetSettings` and
/// `A2F/A2E/GenerateKeys`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSettings {
    pub a2f_instance: String,
    /// Emotion detection range, seconds of audio per predicted keyframe.
    #[serde(rename = "a2e_window_size")]
    pub window_size: f64,
    /// Seconds between adjacent automated keyframes.
    #[serde(rename = "a2e_stride")]
    pub stride: f64,
    #[serde(rename = "a2e_emotion_strength")]
    pub emotion_strength: f64,
    /// Number of neighbouring keyframes used for smoothing.
    #[serde(rename = "a2e_smoothing_exp")]
    pub smoothing_exp: f64,
    /// Hard limit on simultaneously engaged emotions.
    #[serde(rename = "a2e_max_emotions")]
    pub max_emotions: u32,
    #[serde(rename = "a2e_contrast")]
    pub contrast: f64,
    pub preferred_emotion: EmotionVector,
    #[serde(rename = "a2e_preferred_emotion_strength")]
    pub preferred_emotion_strength: f64,
}

impl Default for EmotionSettings {
    fn default() -> Self {
        Self {
            a2f_instance: DEFAULT_A2E_INSTANCE.to_string(),
            window_size: 1.4,
            stride: 1.0,
            emotion_strength: 0.5,
            smoothing_exp: 0.0,
            max_emotions: 5,
            contrast: 1.0,
            preferred_emotion: EmotionVector::NEUTRAL,
            preferred_emotion_strength: 0.5,
        }
    }
}

impl EmotionSettings {
    /// Defaults bound to a specific emotion core instance.
    pub fn for_instance(instance: impl Into<String>) -> Self {
        Self {
            a2f_instance: instance.into(),
            ..Self::default()
        }
    }

    /// Apply `patch` on top of `self`.
    #[must_use]
    pub fn merged(&self, patch: &EmotionSettingsPatch) -> Self {
        merge(self, patch)
    }
}

/// Partial settings update; `None` means "keep the current value".
///
/// Field names match the REST payload so a patch can be read straight from
/// JSON or TOML supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a2f_instance: Option<String>,
    #[serde(rename = "a2e_window_size", skip_serializing_if = "Option::is_none")]
    pub window_size: Option<f64>,
    #[serde(rename = "a2e_stride", skip_serializing_if = "Option::is_none")]
    pub stride: Option<f64>,
    #[serde(
        rename = "a2e_emotion_strength",
        skip_serializing_if = "Option::is_none"
    )]
    pub emotion_strength: Option<f64>,
    #[serde(rename = "a2e_smoothing_exp", skip_serializing_if = "Option::is_none")]
    pub smoothing_exp: Option<f64>,
    #[serde(rename = "a2e_max_emotions", skip_serializing_if = "Option::is_none")]
    pub max_emotions: Option<u32>,
    #[serde(rename = "a2e_contrast", skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_emotion: Option<EmotionVector>,
    #[serde(
        rename = "a2e_preferred_emotion_strength",
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred_emotion_strength: Option<f64>,
}

impl EmotionSettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn window_size(mut self, seconds: f64) -> Self {
        self.window_size = Some(seconds);
        self
    }

    #[must_use]
    pub fn stride(mut self, seconds: f64) -> Self {
        self.stride = Some(seconds);
        self
    }

    #[must_use]
    pub fn emotion_strength(mut self, strength: f64) -> Self {
        self.emotion_strength = Some(strength);
        self
    }

    #[must_use]
    pub fn smoothing_exp(mut self, value: f64) -> Self {
        self.smoothing_exp = Some(value);
        self
    }

    #[must_use]
    pub fn max_emotions(mut self, count: u32) -> Self {
        self.max_emotions = Some(count);
        self
    }

    #[must_use]
    pub fn contrast(mut self, value: f64) -> Self {
        self.contrast = Some(value);
        self
    }

    #[must_use]
    pub fn preferred_emotion(mut self, vector: EmotionVector) -> Self {
        self.preferred_emotion = Some(vector);
        self
    }

    #[must_use]
    pub fn preferred_emotion_strength(mut self, strength: f64) -> Self {
        self.preferred_emotion_strength = Some(strength);
        self
    }
}

/// Fold `patch` over `current`.
///
/// Every field supplied by the patch overwrites the current value; every
/// omitted field is copied from `current`. Nothing is ever reset to a default.
pub fn merge(current: &EmotionSettings, patch: &EmotionSettingsPatch) -> EmotionSettings {
    EmotionSettings {
        a2f_instance: patch
            .a2f_instance
            .clone()
            .unwrap_or_else(|| current.a2f_instance.clone()),
        window_size: patch.window_size.unwrap_or(current.window_size),
        stride: patch.stride.unwrap_or(current.stride),
        emotion_strength: patch.emotion_strength.unwrap_or(current.emotion_strength),
        smoothing_exp: patch.smoothing_exp.unwrap_or(current.smoothing_exp),
        max_emotions: patch.max_emotions.unwrap_or(current.max_emotions),
        contrast: patch.contrast.unwrap_or(current.contrast),
        preferred_emotion: patch.preferred_emotion.unwrap_or(current.preferred_emotion),
        preferred_emotion_strength: patch
            .preferred_emotion_strength
            .unwrap_or(current.preferred_emotion_strength),
    }
}
