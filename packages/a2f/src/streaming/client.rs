use std::fmt;

use a2f_domain::{AudioChunk, StreamRequest};
use futures::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
#[cfg(feature = "streaming")]
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use super::frame::{Frame, FrameCodec};
use crate::error::{A2fError, Result};

/// Progress of a single streaming call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    StartSent,
    Streaming,
    Finished,
    Failed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::StartSent => "StartSent",
            Self::Streaming => "Streaming",
            Self::Finished => "Finished",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Pushes audio to a streaming player over one connection per call.
///
/// Chunks are pulled from the source one at a time; each is written out
/// before the next is requested.
#[derive(Debug)]
pub struct StreamingProtocolClient {
    addr: String,
    state: StreamState,
}

impl StreamingProtocolClient {
    /// # Errors
    /// `StreamingUnavailable` when built without the `streaming` feature.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        if !cfg!(feature = "streaming") {
            return Err(A2fError::StreamingUnavailable);
        }
        Ok(Self {
            addr: addr.into(),
            state: StreamState::Idle,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// State reached by the last call
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Connect to the streaming endpoint and push `source` through it.
    ///
    /// Returns the server's success flag.
    #[cfg(feature = "streaming")]
    pub async fn stream<S>(&mut self, request: &StreamRequest, source: S) -> Result<bool>
    where
        S: Stream<Item = AudioChunk> + Unpin,
    {
        self.state = StreamState::Idle;
        debug!(addr = %self.addr, "connecting to streaming endpoint");
        let io = TcpStream::connect(&self.addr).await.inspect_err(|e| {
            warn!(addr = %self.addr, error = %e, "streaming connection failed");
            self.state = StreamState::Failed;
        })?;
        self.stream_over(io, request, source).await
    }

    /// Without the `streaming` feature there is no TCP transport.
    #[cfg(not(feature = "streaming"))]
    pub async fn stream<S>(&mut self, _request: &StreamRequest, _source: S) -> Result<bool>
    where
        S: Stream<Item = AudioChunk> + Unpin,
    {
        self.state = StreamState::Failed;
        Err(A2fError::StreamingUnavailable)
    }

    /// Run the protocol over an already connected transport.
    ///
    /// Sends start, one data frame per chunk, and end, then half-closes the
    /// write side and waits for the one-byte completion flag. Any I/O failure
    /// aborts the call: no further chunks are pulled and no end frame is sent.
    pub async fn stream_over<IO, S>(
        &mut self,
        io: IO,
        request: &StreamRequest,
        source: S,
    ) -> Result<bool>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
        S: Stream<Item = AudioChunk> + Unpin,
    {
        self.state = StreamState::Idle;
        let result = self.run(io, request, source).await;
        match &result {
            Ok(success) => {
                self.transition(StreamState::Finished);
                info!(success, "stream finished");
            }
            Err(e) => {
                self.transition(StreamState::Failed);
                warn!(error = %e, "stream aborted");
            }
        }
        result
    }

    async fn run<IO, S>(&mut self, io: IO, request: &StreamRequest, mut source: S) -> Result<bool>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
        S: Stream<Item = AudioChunk> + Unpin,
    {
        let mut frames = FramedWrite::new(io, FrameCodec::new());

        frames.send(Frame::Start(request.clone())).await?;
        self.transition(StreamState::StartSent);

        let mut sent = 0usize;
        while let Some(chunk) = source.next().await {
            frames.send(Frame::Data(chunk.into_payload())).await?;
            if sent == 0 {
                self.transition(StreamState::Streaming);
            }
            sent += 1;
        }
        debug!(chunks = sent, "audio source exhausted");

        frames.send(Frame::End).await?;
        // flushes and shuts down the write half
        frames.close().await?;

        let mut io = frames.into_inner();
        let mut ack = [0u8; 1];
        io.read_exact(&mut ack).await?;
        Ok(ack[0] != 0)
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "stream transition");
            self.state = next;
        }
    }
}
