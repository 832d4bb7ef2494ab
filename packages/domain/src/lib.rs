//! # A2F Domain
//!
//! Shared value types for the Audio2Face client.
//!
//! This crate holds the plain data exchanged with the server (emotion
//! settings, emotion vectors, streaming parameters and audio chunks) so the
//! client crate can stay focused on transport and orchestration.

pub mod audio_chunk;
pub mod domain_error;
pub mod emotion;
pub mod emotion_settings;
pub mod stream_request;

pub use audio_chunk::AudioChunk;
pub use domain_error::DomainError;
pub use emotion::{EMOTION_COUNT, Emotion, EmotionVector};
pub use emotion_settings::{
    DEFAULT_A2E_INSTANCE, EmotionSettings, EmotionSettingsPatch, merge,
};
pub use stream_request::{DEFAULT_STREAM_PLAYER_INSTANCE, StreamRequest};

/// Prelude module containing commonly used types.
pub mod prelude {
    pub use crate::{
        AudioChunk, DomainError, Emotion, EmotionSettings, EmotionSettingsPatch, EmotionVector,
        StreamRequest,
    };
}
