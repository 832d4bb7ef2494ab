//! Binary framing of the streaming audio protocol
//!
//! ```text
//! +-------------------+--------------------+-----------+
//! | type (u32, BE)    | length (u32, BE)   | payload   |
//! +-------------------+--------------------+-----------+
//! ```
//!
//! | type | payload |
//! |------|---------|
//! | 1 start | sample rate (u32, BE), block flag (u8), UTF-8 instance path |
//! | 2 data  | audio bytes, f32 little-endian for sample buffers |
//! | 3 end   | empty |

use std::io;

use a2f_domain::StreamRequest;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const START: u32 = 1;
pub const DATA: u32 = 2;
pub const END: u32 = 3;

const HEADER_LEN: usize = 8;

/// Frames larger than this are rejected by the decoder.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Start(StreamRequest),
    Data(Bytes),
    End,
}

impl Frame {
    pub fn message_type(&self) -> u32 {
        match self {
            Self::Start(_) => START,
            Self::Data(_) => DATA,
            Self::End => END,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let message_type = frame.message_type();
        match frame {
            Frame::Start(request) => {
                let instance = request.target_instance().as_bytes();
                let len = 4 + 1 + instance.len();
                put_header(dst, message_type, len)?;
                dst.put_u32(request.sample_rate());
                dst.put_u8(u8::from(request.block_until_finished()));
                dst.extend_from_slice(instance);
            }
            Frame::Data(payload) => {
                put_header(dst, message_type, payload.len())?;
                dst.extend_from_slice(&payload);
            }
            Frame::End => put_header(dst, message_type, 0)?,
        }
        Ok(())
    }
}

fn put_header(dst: &mut BytesMut, message_type: u32, len: usize) -> io::Result<()> {
    let wire_len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame payload exceeds u32"))?;
    dst.reserve(HEADER_LEN + len);
    dst.put_u32(message_type);
    dst.put_u32(wire_len);
    Ok(())
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let message_type = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(invalid(format!("frame of {len} bytes exceeds limit")));
        }
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let mut payload = src.split_to(len).freeze();

        let frame = match message_type {
            START => {
                if payload.len() < 5 {
                    return Err(invalid("start frame too short".to_string()));
                }
                let sample_rate = payload.get_u32();
                let block = payload.get_u8() != 0;
                let instance = std::str::from_utf8(&payload)
                    .map_err(|e| invalid(format!("instance path is not UTF-8: {e}")))?;
                let request = StreamRequest::new(sample_rate, instance, block)
                    .map_err(|e| invalid(e.to_string()))?;
                Frame::Start(request)
            }
            DATA => Frame::Data(payload),
            END => Frame::End,
            other => return Err(invalid(format!("unknown message type {other}"))),
        };
        Ok(Some(frame))
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
