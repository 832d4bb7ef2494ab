//! Parameters fixed at the start of one audio stream.

use serde::{Deserialize, Serialize};

use crate::domain_error::DomainError;

/// Prim path of the default streaming audio player.
pub const DEFAULT_STREAM_PLAYER_INSTANCE: &str = "/World/audio2face/PlayerStreaming";

/// Immutable per-stream parameters carried by the start frame.
///
/// Deserialization goes through [`StreamRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStreamRequest")]
pub struct StreamRequest {
    sample_rate: u32,
    target_instance: String,
    block_until_finished: bool,
}

#[derive(Deserialize)]
struct RawStreamRequest {
    sample_rate: u32,
    target_instance: String,
    block_until_finished: bool,
}

impl TryFrom<RawStreamRequest> for StreamRequest {
    type Error = DomainError;

    fn try_from(raw: RawStreamRequest) -> Result<Self, Self::Error> {
        Self::new(raw.sample_rate, raw.target_instance, raw.block_until_finished)
    }
}

impl StreamRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidStreamRequest` for a zero sample rate or
    /// an empty target instance.
    pub fn new(
        sample_rate: u32,
        target_instance: impl Into<String>,
        block_until_finished: bool,
    ) -> Result<Self, DomainError> {
        let target_instance = target_instance.into();
        if sample_rate == 0 {
            return Err(DomainError::InvalidStreamRequest(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if target_instance.trim().is_empty() {
            return Err(DomainError::InvalidStreamRequest(
                "target instance cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            sample_rate,
            target_instance,
            block_until_finished,
        })
    }

    /// Request against the default streaming player, blocking until playback ends.
    pub fn for_default_player(sample_rate: u32) -> Result<Self, DomainError> {
        Self::new(sample_rate, DEFAULT_STREAM_PLAYER_INSTANCE, true)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn target_instance(&self) -> &str {
        &self.target_instance
    }

    pub fn block_until_finished(&self) -> bool {
        self.block_until_finished
    }
}
