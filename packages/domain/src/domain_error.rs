//! Unified error for domain value construction.
use thiserror::Error;

/// Failure building or converting a domain value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// An emotion name outside the ten canonical emotions.
    #[error("unknown emotion: {0}")]
    UnknownEmotion(String),
    /// A vector with the wrong number of emotion strengths.
    #[error("emotion vector must have {expected} entries, got {actual}")]
    EmotionVectorLength { expected: usize, actual: usize },
    /// A streaming request that the server would reject.
    #[error("invalid stream request: {0}")]
    InvalidStreamRequest(String),
}
