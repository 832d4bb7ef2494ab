//! Canonical emotions and fixed-length emotion vectors.
//!
//! The server exposes exactly ten named emotions in a fixed order. An
//! [`EmotionVector`] holds one strength per emotion, clamped to `0.0..=1.0`,
//! and serializes as the plain array of ten floats the REST API expects.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain_error::DomainError;

/// Number of canonical emotions.
pub const EMOTION_COUNT: usize = 10;

/// The canonical emotions, in server order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Amazement,
    Anger,
    Cheekiness,
    Disgust,
    Fear,
    Grief,
    Joy,
    Outofbreath,
    Pain,
    Sadness,
}

impl Emotion {
    /// All emotions in vector order.
    pub const ALL: [Emotion; EMOTION_COUNT] = [
        Emotion::Amazement,
        Emotion::Anger,
        Emotion::Cheekiness,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Grief,
        Emotion::Joy,
        Emotion::Outofbreath,
        Emotion::Pain,
        Emotion::Sadness,
    ];

    /// Position of this emotion inside an [`EmotionVector`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name as reported by `A2F/A2E/GetEmotionNames`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Amazement => "Amazement",
            Self::Anger => "Anger",
            Self::Cheekiness => "Cheekiness",
            Self::Disgust => "Disgust",
            Self::Fear => "Fear",
            Self::Grief => "Grief",
            Self::Joy => "Joy",
            Self::Outofbreath => "Outofbreath",
            Self::Pain => "Pain",
            Self::Sadness => "Sadness",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Emotion {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownEmotion(s.to_string()))
    }
}

/// One strength per canonical emotion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmotionVector([f32; EMOTION_COUNT]);

impl EmotionVector {
    /// All strengths zero (neutral).
    pub const NEUTRAL: EmotionVector = EmotionVector([0.0; EMOTION_COUNT]);

    /// Set one emotion, clamping into `0.0..=1.0`.
    #[must_use]
    pub fn with(mut self, emotion: Emotion, strength: f32) -> Self {
        self.set(emotion, strength);
        self
    }

    pub fn set(&mut self, emotion: Emotion, strength: f32) {
        self.0[emotion.index()] = clamp_strength(strength);
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.0[emotion.index()]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Build from `name -> strength` pairs; unnamed emotions stay at zero.
    pub fn from_named<'a, I>(pairs: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut vector = Self::NEUTRAL;
        for (name, strength) in pairs {
            vector.set(name.parse()?, strength);
        }
        Ok(vector)
    }

    /// Strengths keyed by emotion name.
    pub fn to_named(&self) -> HashMap<&'static str, f32> {
        Emotion::ALL
            .into_iter()
            .map(|e| (e.name(), self.get(e)))
            .collect()
    }
}

impl TryFrom<&[f32]> for EmotionVector {
    type Error = DomainError;

    fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
        if values.len() != EMOTION_COUNT {
            return Err(DomainError::EmotionVectorLength {
                expected: EMOTION_COUNT,
                actual: values.len(),
            });
        }
        let mut out = [0.0; EMOTION_COUNT];
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = clamp_strength(*value);
        }
        Ok(Self(out))
    }
}

impl Serialize for EmotionVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EmotionVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f32>::deserialize(deserializer)?;
        Self::try_from(values.as_slice()).map_err(serde::de::Error::custom)
    }
}

#[inline]
fn clamp_strength(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
