//! Audio chunk types for live streaming
//!
//! A chunk is one unit pulled from a caller-supplied audio source and sent
//! as exactly one data frame. Numeric sample arrays travel as 32-bit float
//! little-endian bytes; already-encoded buffers pass through unchanged.

use bytes::{BufMut, Bytes, BytesMut};

/// A single piece of audio produced by a streaming source.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioChunk {
    /// Mono float samples, sent as f32 LE.
    Samples(Vec<f32>),
    /// Pre-encoded payload, sent verbatim.
    Encoded(Bytes),
}

impl AudioChunk {
    /// Create a chunk from float samples
    pub fn from_samples(samples: impl Into<Vec<f32>>) -> Self {
        Self::Samples(samples.into())
    }

    /// Create a chunk from 16-bit PCM samples.
    ///
    /// Values are widened to f32 as-is, without normalisation.
    pub fn from_pcm16(samples: &[i16]) -> Self {
        Self::Samples(samples.iter().map(|&s| f32::from(s)).collect())
    }

    /// Size of the wire payload in bytes
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Samples(samples) => samples.len() * std::mem::size_of::<f32>(),
            Self::Encoded(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload_len() == 0
    }

    /// Convert this chunk into the raw data-frame payload
    pub fn into_payload(self) -> Bytes {
        match self {
            Self::Samples(samples) => {
                let mut buf = BytesMut::with_capacity(samples.len() * 4);
                for sample in samples {
                    buf.put_f32_le(sample);
                }
                buf.freeze()
            }
            Self::Encoded(bytes) => bytes,
        }
    }
}

impl From<Vec<f32>> for AudioChunk {
    fn from(samples: Vec<f32>) -> Self {
        Self::Samples(samples)
    }
}

impl From<&[f32]> for AudioChunk {
    fn from(samples: &[f32]) -> Self {
        Self::Samples(samples.to_vec())
    }
}

impl From<Vec<u8>> for AudioChunk {
    fn from(data: Vec<u8>) -> Self {
        Self::Encoded(Bytes::from(data))
    }
}

impl From<Bytes> for AudioChunk {
    fn from(data: Bytes) -> Self {
        Self::Encoded(data)
    }
}
