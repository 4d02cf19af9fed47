//! Unit tests for the in-process transport pair

use ada_client::protocol::{Frame, SocketCodec};
use ada_client::{AdaError, MemoryTransport, Transport};
use serde_json::json;

#[tokio::test]
async fn test_connect_delivers_open_then_namespace_ack() {
    let (mut transport, peer) = MemoryTransport::pair();
    let codec = SocketCodec::default();

    transport.connect().await.unwrap();
    assert!(transport.is_ready());
    assert_eq!(peer.connect_count(), 1);

    let mut frames = transport.read_frames();
    let open = codec
        .deserialize_frame(&frames.recv().await.unwrap().unwrap())
        .unwrap();
    let Frame::Open(handshake) = open else {
        panic!("Expected open, got {open:?}");
    };
    assert_eq!(handshake.sid, "mem-1");

    transport.write(&codec.connect_frame()).await.unwrap();
    let ack = codec
        .deserialize_frame(&frames.recv().await.unwrap().unwrap())
        .unwrap();
    assert_eq!(
        ack,
        Frame::Connected {
            sid: Some("ns-1".into())
        }
    );
}

#[tokio::test]
async fn test_peer_events_and_recording() {
    let (mut transport, peer) = MemoryTransport::pair();
    transport.connect().await.unwrap();
    let mut frames = transport.read_frames();
    let _open = frames.recv().await;

    peer.emit("EOT", json!(null));
    assert_eq!(frames.recv().await.unwrap().unwrap(), r#"42["EOT",null]"#);

    transport.write(r#"42["get_bookmarks",{}]"#).await.unwrap();
    transport.write("3").await.unwrap();

    assert_eq!(peer.sent_event_names(), vec!["get_bookmarks"]);
    assert_eq!(peer.pongs(), 1);
    assert_eq!(peer.sent_frames().len(), 2);

    peer.clear_sent();
    assert!(peer.sent_frames().is_empty());
    assert_eq!(peer.pongs(), 0);
}

#[tokio::test]
async fn test_failed_connect_and_write_while_down() {
    let (mut transport, peer) = MemoryTransport::pair();
    peer.fail_next_connect("refused by test");

    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, AdaError::Connection(ref m) if m == "refused by test"));
    assert!(!transport.is_ready());
    assert!(transport.write("2").await.is_err());

    transport.connect().await.unwrap();
    assert_eq!(peer.connect_count(), 1);
}

#[tokio::test]
async fn test_peer_disconnect_closes_stream() {
    let (mut transport, peer) = MemoryTransport::pair();
    transport.connect().await.unwrap();
    let mut frames = transport.read_frames();
    let _open = frames.recv().await;

    peer.disconnect();

    assert!(frames.recv().await.is_none());
    assert!(!peer.is_connected());
    assert!(!transport.is_ready());
}

#[tokio::test]
async fn test_read_frames_while_down_reports_error() {
    let (mut transport, _peer) = MemoryTransport::pair();
    let mut frames = transport.read_frames();
    assert!(matches!(frames.recv().await, Some(Err(_))));
}

#[tokio::test]
async fn test_refused_namespace() {
    let (mut transport, peer) = MemoryTransport::pair();
    let codec = SocketCodec::default();
    peer.refuse_next_namespace("study closed");

    transport.connect().await.unwrap();
    let mut frames = transport.read_frames();
    let _open = frames.recv().await;
    transport.write(&codec.connect_frame()).await.unwrap();

    let reply = codec
        .deserialize_frame(&frames.recv().await.unwrap().unwrap())
        .unwrap();
    assert_eq!(reply, Frame::ConnectRefused("study closed".into()));
}
