//! Live audio streaming to a streaming audio player instance
//!
//! Unlike the REST routes, streaming uses a raw framed TCP protocol on its
//! own port. See [`frame`] for the wire layout.

mod client;
pub mod frame;

pub use client::{StreamState, StreamingProtocolClient};
pub use frame::{Frame, FrameCodec};
