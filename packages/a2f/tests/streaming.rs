#![cfg(feature = "streaming")]

mod common;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use a2f_client::domain::{AudioChunk, StreamRequest};
use a2f_client::streaming::{Frame, FrameCodec, StreamState, StreamingProtocolClient};
use a2f_client::{A2fClient, A2fConfig, A2fError};
use bytes::{Bytes, BytesMut};
use common::{FakeLauncher, RecordingGateway, test_config};
use futures::{Stream, StreamExt, stream};
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::codec::{Encoder, FramedRead};

const PLAYER: &str = "/World/audio2face/PlayerStreaming";

fn wire(frame: Frame) -> Vec<u8> {
    let mut buf = BytesMut::new();
    FrameCodec::new().encode(frame, &mut buf).unwrap();
    buf.to_vec()
}

fn chunk(tag: u8) -> AudioChunk {
    AudioChunk::from(vec![tag; 4])
}

/// Yields `chunks`, counting how many were pulled.
fn counted(chunks: Vec<AudioChunk>, pulled: Arc<AtomicUsize>) -> impl Stream<Item = AudioChunk> + Unpin {
    stream::iter(chunks).inspect(move |_| {
        pulled.fetch_add(1, Ordering::SeqCst);
    })
}

/// Accepts one connection, collects frames until the writer closes, then
/// answers with `ack`.
async fn serve_once(listener: TcpListener, ack: u8) -> Vec<Frame> {
    let (socket, _) = listener.accept().await.unwrap();
    let (read, mut write) = socket.into_split();
    let mut frames = FramedRead::new(read, FrameCodec::new());
    let mut received = Vec::new();
    while let Some(frame) = frames.next().await {
        received.push(frame.unwrap());
    }
    write.write_all(&[ack]).await.unwrap();
    received
}

#[tokio::test]
async fn frames_arrive_in_order_from_a_slow_producer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_once(listener, 1));

    let slow = stream::iter([1u8, 2, 3]).then(|tag| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        chunk(tag)
    });

    let request = StreamRequest::new(16_000, PLAYER, true).unwrap();
    let mut client = StreamingProtocolClient::new(addr.to_string()).unwrap();
    let ok = client.stream(&request, Box::pin(slow)).await.unwrap();

    assert!(ok);
    assert_eq!(client.state(), StreamState::Finished);
    assert_eq!(
        server.await.unwrap(),
        [
            Frame::Start(request),
            Frame::Data(Bytes::from(vec![1u8; 4])),
            Frame::Data(Bytes::from(vec![2u8; 4])),
            Frame::Data(Bytes::from(vec![3u8; 4])),
            Frame::End,
        ]
    );
}

#[tokio::test]
async fn write_failure_stops_production_and_skips_end() {
    let request = StreamRequest::new(16_000, PLAYER, true).unwrap();
    let mock = tokio_test::io::Builder::new()
        .write(&wire(Frame::Start(request.clone())))
        .write(&wire(Frame::Data(Bytes::from(vec![1u8; 4]))))
        .write(&wire(Frame::Data(Bytes::from(vec![2u8; 4]))))
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        .build();

    let pulled = Arc::new(AtomicUsize::new(0));
    let source = counted(vec![chunk(1), chunk(2), chunk(3), chunk(4)], pulled.clone());

    let mut client = StreamingProtocolClient::new("127.0.0.1:50051").unwrap();
    let err = client.stream_over(mock, &request, source).await.unwrap_err();

    assert!(matches!(err, A2fError::Stream(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    assert_eq!(client.state(), StreamState::Failed);
    assert_eq!(pulled.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_blocking_stream_reports_server_flag() {
    let request = StreamRequest::new(48_000, PLAYER, false).unwrap();
    let mock = tokio_test::io::Builder::new()
        .write(&wire(Frame::Start(request.clone())))
        .write(&wire(Frame::Data(Bytes::from(vec![7u8; 4]))))
        .write(&wire(Frame::End))
        .read(&[0])
        .build();

    let mut client = StreamingProtocolClient::new("127.0.0.1:50051").unwrap();
    let ok = client
        .stream_over(mock, &request, stream::iter(vec![chunk(7)]))
        .await
        .unwrap();

    assert!(!ok);
    assert_eq!(client.state(), StreamState::Finished);
}

#[tokio::test]
async fn refused_connection_is_a_stream_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = StreamRequest::for_default_player(16_000).unwrap();
    let mut client = StreamingProtocolClient::new(addr.to_string()).unwrap();
    let err = client
        .stream(&request, stream::iter(vec![chunk(1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, A2fError::Stream(_)));
    assert_eq!(client.state(), StreamState::Failed);
}

#[tokio::test]
async fn client_loads_streaming_scene_before_streaming() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve_once(listener, 1));

    let dir = tempdir().unwrap();
    let config = A2fConfig {
        base_url: "http://127.0.0.1:8011".to_string(),
        stream_port: port,
        ..test_config(dir.path())
    };
    let scene = config.streaming_scene.to_string_lossy().into_owned();

    let mut client = A2fClient::with_parts(config, RecordingGateway::ready(), FakeLauncher::default());
    let request = StreamRequest::for_default_player(16_000).unwrap();
    let ok = client
        .stream_audio(&request, stream::iter(vec![chunk(1), chunk(2)]))
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(client.gateway().routes(), ["status", "A2F/USD/Load"]);
    assert_eq!(client.gateway().calls()[1].payload["file_name"], scene);
    assert_eq!(server.await.unwrap().len(), 4);
}

#[tokio::test]
async fn cancelled_client_does_not_open_a_stream() {
    let dir = tempdir().unwrap();
    let mut client = A2fClient::with_parts(
        test_config(dir.path()),
        RecordingGateway::ready(),
        FakeLauncher::default(),
    );
    client.cancellation_token().cancel();

    let request = StreamRequest::for_default_player(16_000).unwrap();
    let err = client
        .stream_audio(&request, stream::iter(vec![chunk(1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, A2fError::Cancelled));
}
