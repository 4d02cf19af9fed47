//! Integration tests for `ChannelManager`
//!
//! Tests the handshake, heartbeats, buffering of outbound events, failure
//! reporting and the discard-on-reconnect behavior against a scripted peer

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ada_client::{
    AdaError, ChannelConfig, ChannelManager, ChannelState, InboundEvent, MemoryPeer,
    MemoryTransport, OutboundEvent, Result, TokenFrame, Transport,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{Notify, mpsc};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> ChannelConfig {
    ChannelConfig {
        connect_timeout: Duration::from_secs(2),
        ..ChannelConfig::default()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn next(manager: &mut ChannelManager<MemoryTransport>) -> InboundEvent {
    tokio::time::timeout(Duration::from_secs(2), manager.next_event())
        .await
        .expect("no event in time")
        .expect("channel ended")
}

fn connected() -> (ChannelManager<MemoryTransport>, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair();
    (ChannelManager::new(transport, config()), peer)
}

/// Transport that connects but never says anything
#[derive(Default)]
struct SilentTransport {
    ready: bool,
    tx: Option<mpsc::UnboundedSender<Result<String>>>,
}

impl Transport for SilentTransport {
    async fn connect(&mut self) -> Result<()> {
        self.ready = true;
        Ok(())
    }

    async fn write(&mut self, _frame: &str) -> Result<()> {
        Ok(())
    }

    fn read_frames(&mut self) -> mpsc::UnboundedReceiver<Result<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn close(&mut self) -> Result<()> {
        self.ready = false;
        self.tx = None;
        Ok(())
    }
}

/// Memory transport that records every attempted write and can hold `close`
struct GatedTransport {
    inner: MemoryTransport,
    written: Arc<Mutex<Vec<String>>>,
    hold_close: Arc<AtomicBool>,
    closing: Arc<Notify>,
    release: Arc<Notify>,
}

impl Transport for GatedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.inner.connect().await
    }

    async fn write(&mut self, frame: &str) -> Result<()> {
        self.written.lock().push(frame.to_string());
        if self.inner.is_ready() {
            self.inner.write(frame).await
        } else {
            Ok(())
        }
    }

    fn read_frames(&mut self) -> mpsc::UnboundedReceiver<Result<String>> {
        self.inner.read_frames()
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn close(&mut self) -> Result<()> {
        if self.hold_close.swap(false, Ordering::SeqCst) {
            self.closing.notify_one();
            self.release.notified().await;
        }
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_open_runs_handshake() {
    init_logger();
    let (mut manager, peer) = connected();
    assert_eq!(manager.state(), ChannelState::Disconnected);

    let handle = manager.open().await.unwrap();

    assert!(handle.is_connected());
    assert_eq!(manager.state(), ChannelState::Connected);
    assert_eq!(next(&mut manager).await, InboundEvent::Connected);
    assert_eq!(peer.sent_frames(), vec!["40".to_string()]);
}

#[tokio::test]
async fn test_open_while_connected_is_a_no_op() {
    let (mut manager, peer) = connected();
    manager.open().await.unwrap();
    let generation = manager.generation();

    manager.open().await.unwrap();

    assert_eq!(peer.connect_count(), 1);
    assert_eq!(manager.generation(), generation);
}

#[tokio::test]
async fn test_inbound_events_keep_order() {
    let (mut manager, peer) = connected();
    manager.open().await.unwrap();
    assert_eq!(next(&mut manager).await, InboundEvent::Connected);

    peer.emit("message", json!({"text": "Hi", "info": "NEW"}));
    peer.emit("message", json!({"text": " there"}));
    peer.emit("telemetry", json!({}));
    peer.emit("EOT", json!(null));

    assert_eq!(
        next(&mut manager).await,
        InboundEvent::Message(TokenFrame::new_turn("Hi"))
    );
    assert_eq!(
        next(&mut manager).await,
        InboundEvent::Message(TokenFrame::chunk(" there"))
    );
    // Unknown events are dropped by the reader
    assert_eq!(next(&mut manager).await, InboundEvent::EndOfTurn);
}

#[tokio::test]
async fn test_events_emitted_before_open_are_flushed_in_order() {
    let (mut manager, peer) = connected();
    let handle = manager.handle();

    handle.emit(OutboundEvent::GetBookmarks);
    handle.emit(OutboundEvent::StartConversation);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(peer.sent_frames().is_empty());

    manager.open().await.unwrap();
    wait_until(|| peer.sent_event_names().len() == 2).await;

    assert_eq!(
        peer.sent_event_names(),
        vec!["get_bookmarks", "start_conversation"]
    );
    // Namespace connect always goes first
    assert_eq!(peer.sent_frames()[0], "40");
}

#[tokio::test]
async fn test_outbound_buffer_drops_oldest() {
    let (transport, peer) = MemoryTransport::pair();
    let mut manager = ChannelManager::new(
        transport,
        ChannelConfig {
            outbound_buffer: 2,
            ..config()
        },
    );
    let handle = manager.handle();

    handle.emit(OutboundEvent::GetBookmarks);
    handle.emit(OutboundEvent::GetPreferences);
    handle.emit(OutboundEvent::StartConversation);
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.open().await.unwrap();
    wait_until(|| peer.sent_event_names().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        peer.sent_event_names(),
        vec!["get_preferences", "start_conversation"]
    );
}

#[tokio::test]
async fn test_ping_is_answered() {
    let (mut manager, peer) = connected();
    manager.open().await.unwrap();

    peer.ping();
    wait_until(|| peer.pongs() == 1).await;

    assert_eq!(manager.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_missing_heartbeat_marks_channel_lost() {
    init_logger();
    let (mut manager, peer) = connected();
    peer.set_heartbeat(30, 30);
    manager.open().await.unwrap();
    assert_eq!(next(&mut manager).await, InboundEvent::Connected);

    let event = next(&mut manager).await;
    let InboundEvent::Disconnected { reason } = event else {
        panic!("Expected disconnect, got {event:?}");
    };
    assert!(reason.contains("no heartbeat"));
    assert!(matches!(manager.state(), ChannelState::Error(_)));
}

#[tokio::test]
async fn test_pings_keep_channel_alive() {
    let (mut manager, peer) = connected();
    peer.set_heartbeat(50, 50);
    manager.open().await.unwrap();

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(40)).await;
        peer.ping();
    }

    assert_eq!(manager.state(), ChannelState::Connected);
    assert!(peer.pongs() >= 5);
}

#[tokio::test]
async fn test_server_disconnect_is_reported() {
    let (mut manager, peer) = connected();
    manager.open().await.unwrap();
    assert_eq!(next(&mut manager).await, InboundEvent::Connected);

    peer.emit("EOT", json!(null));
    peer.disconnect();

    // Events received before the drop are still delivered
    assert_eq!(next(&mut manager).await, InboundEvent::EndOfTurn);
    assert!(matches!(
        next(&mut manager).await,
        InboundEvent::Disconnected { .. }
    ));
    assert!(matches!(manager.state(), ChannelState::Error(_)));
    assert!(manager.next_event().await.is_none());
}

#[tokio::test]
async fn test_socketio_disconnect_packet_is_reported() {
    let (mut manager, peer) = connected();
    manager.open().await.unwrap();
    assert_eq!(next(&mut manager).await, InboundEvent::Connected);

    peer.send_raw("41");

    assert_eq!(
        next(&mut manager).await,
        InboundEvent::Disconnected {
            reason: "server disconnected".into()
        }
    );
}

#[tokio::test]
async fn test_failed_connect_reports_error_without_retry() {
    let (mut manager, peer) = connected();
    peer.fail_next_connect("host unreachable");

    let err = manager.open().await.unwrap_err();

    assert!(err.is_channel_error());
    assert!(matches!(
        manager.state(),
        ChannelState::Error(ref reason) if reason.contains("host unreachable")
    ));
    assert!(matches!(
        next(&mut manager).await,
        InboundEvent::ConnectError { .. }
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(peer.connect_count(), 0);
}

#[tokio::test]
async fn test_refused_namespace_fails_open() {
    let (mut manager, peer) = connected();
    peer.refuse_next_namespace("study closed");

    let err = manager.open().await.unwrap_err();

    assert!(err.to_string().contains("study closed"));
    assert!(!peer.is_connected());
    assert!(matches!(manager.state(), ChannelState::Error(_)));
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let mut manager = ChannelManager::new(
        SilentTransport::default(),
        ChannelConfig {
            connect_timeout: Duration::from_millis(50),
            ..ChannelConfig::default()
        },
    );

    let err = manager.open().await.unwrap_err();

    assert!(matches!(err, AdaError::Timeout(_)));
    assert!(matches!(
        manager.next_event().await,
        Some(InboundEvent::ConnectError { .. })
    ));
}

#[tokio::test]
async fn test_reconnect_discards_pending_events() {
    let (mut manager, peer) = connected();
    manager.open().await.unwrap();
    let first_generation = manager.generation();

    peer.emit("message", json!({"text": "stale", "info": "NEW"}));
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.reconnect().await.unwrap();

    assert!(manager.generation() > first_generation);
    assert_eq!(peer.connect_count(), 2);
    assert_eq!(next(&mut manager).await, InboundEvent::Connected);

    peer.emit("EOT", json!(null));
    assert_eq!(next(&mut manager).await, InboundEvent::EndOfTurn);
}

#[tokio::test]
async fn test_event_queued_during_reconnect_follows_namespace_connect() {
    let (inner, _peer) = MemoryTransport::pair();
    let written = Arc::new(Mutex::new(Vec::new()));
    let hold_close = Arc::new(AtomicBool::new(false));
    let closing = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let transport = GatedTransport {
        inner,
        written: written.clone(),
        hold_close: hold_close.clone(),
        closing: closing.clone(),
        release: release.clone(),
    };
    let mut manager = ChannelManager::new(transport, config());
    let handle = manager.open().await.unwrap();

    hold_close.store(true, Ordering::SeqCst);
    let reconnect = tokio::spawn(async move {
        manager.reconnect().await.map(|()| manager)
    });
    closing.notified().await;

    // The writer sees the old connection as live and waits for the transport
    handle.emit(OutboundEvent::GetBookmarks);
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_one();

    let _manager = reconnect.await.unwrap().unwrap();
    wait_until(|| written.lock().iter().any(|frame| frame.starts_with("42"))).await;

    let frames = written.lock().clone();
    let leave = frames.iter().position(|frame| frame == "41").unwrap();
    let rejoin = leave + frames[leave..].iter().position(|frame| frame == "40").unwrap();
    let event = frames.iter().position(|frame| frame.starts_with("42")).unwrap();
    assert!(event > rejoin, "event written before namespace connect: {frames:?}");
}

#[tokio::test]
async fn test_reconnect_while_disconnected_opens() {
    let (mut manager, peer) = connected();

    manager.reconnect().await.unwrap();

    assert_eq!(manager.state(), ChannelState::Connected);
    assert_eq!(peer.connect_count(), 1);
}

#[tokio::test]
async fn test_close_ends_event_stream() {
    let (mut manager, peer) = connected();
    let mut states = manager.subscribe_state();
    manager.open().await.unwrap();
    peer.emit("EOT", json!(null));
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.close().await.unwrap();

    assert_eq!(manager.state(), ChannelState::Disconnected);
    assert!(manager.next_event().await.is_none());
    assert!(!peer.is_connected());
    assert_eq!(peer.sent_frames().last().map(String::as_str), Some("41"));
    assert_eq!(*states.borrow_and_update(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_events_emitted_while_closed_go_out_after_reopen() {
    let (mut manager, peer) = connected();
    let handle = manager.handle();
    manager.open().await.unwrap();
    manager.close().await.unwrap();
    peer.clear_sent();

    handle.emit(OutboundEvent::GetPreferences);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(peer.sent_event_names().is_empty());

    manager.open().await.unwrap();
    wait_until(|| peer.sent_event_names() == vec!["get_preferences"]).await;
}
