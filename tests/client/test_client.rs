//! End-to-end tests for `AdaClient`
//!
//! Drives a full study client against a scripted in-process agent

use std::sync::Arc;
use std::time::Duration;

use ada_client::sequencer::TASK_SEQUENCE_KEY;
use ada_client::{
    AdaClient, AdaError, ArticleId, ChannelState, ChatTurn, ClientOptions, ConversationStyle,
    InboundEvent, KeyValueStore, MemoryPeer, MemoryStore, MemoryTransport, OptionId, SharedStore,
};
use serde_json::{Value, json};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn options() -> ClientOptions {
    ClientOptions::builder()
        .participant_id("P-042")
        .connect_timeout(Duration::from_secs(2))
        .rng_seed(42)
        .build()
}

fn client_with(
    store: &Arc<MemoryStore>,
    options: ClientOptions,
) -> (AdaClient<MemoryTransport>, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair();
    let shared: SharedStore = store.clone();
    let client = AdaClient::new(transport, shared, options).unwrap();
    (client, peer)
}

async fn pump(client: &mut AdaClient<MemoryTransport>) -> InboundEvent {
    tokio::time::timeout(Duration::from_secs(2), client.process_next_event())
        .await
        .expect("no event in time")
        .expect("channel ended")
}

/// Pump until the event matching `done` has been handled
async fn pump_until(
    client: &mut AdaClient<MemoryTransport>,
    done: impl Fn(&InboundEvent) -> bool,
) {
    loop {
        if done(&pump(client).await) {
            return;
        }
    }
}

async fn sent_until(
    peer: &MemoryPeer,
    done: impl Fn(&[(String, Value)]) -> bool,
) -> Vec<(String, Value)> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let events = peer.sent_events();
            if done(&events) {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("events not sent in time")
}

fn activity(events: &[(String, Value)], name: &str) -> Option<Value> {
    events
        .iter()
        .find(|(event, payload)| event == "log_event" && payload["event"] == name)
        .map(|(_, payload)| payload.clone())
}

fn stream_greeting(peer: &MemoryPeer) {
    peer.emit("init", json!({"style": {"showStyleSwitch": false}}));
    peer.emit("message", json!({"text": "Hi! What", "info": "NEW"}));
    peer.emit("message", json!({"text": " are you looking for?"}));
    peer.emit("EOT", Value::Null);
}

#[tokio::test]
async fn test_construction_resolves_identity_without_connecting() {
    init_logger();
    let store = Arc::new(MemoryStore::new());
    let (client, peer) = client_with(&store, options());

    assert_eq!(client.token().id.as_str(), "P-042");
    assert_eq!(client.channel_state(), ChannelState::Disconnected);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(peer.connect_count(), 0);
    assert!(store.get("userStudyID").unwrap().is_some());
}

#[tokio::test]
async fn test_full_task_flow() {
    init_logger();
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());

    let task = client.enter_task(None).await.unwrap();
    assert_eq!(task.slot, 0);
    assert!(!task.style_switchable);
    assert_eq!(peer.connect_count(), 1);
    assert!(client.chat().is_busy());
    assert!(client.chat().is_awaiting_first_content());

    let events = sent_until(&peer, |events| {
        events.iter().any(|(name, _)| name == "get_bookmarks")
    })
    .await;
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "log_event",
            "set_style",
            "start_conversation",
            "log_event",
            "get_bookmarks"
        ]
    );
    let app_start = activity(&events, "App start").unwrap();
    assert_eq!(app_start["page"], "task");
    assert!(app_start["userStudyID"].is_string());
    assert!(app_start.get("taskSequence").is_none());
    let started = activity(&events, "Start conversation").unwrap();
    assert!(started["taskSequence"].is_string());
    assert_eq!(events[1].1, json!({"style": task.style.as_str()}));

    assert_eq!(pump(&mut client).await, InboundEvent::Connected);
    stream_greeting(&peer);
    pump_until(&mut client, |event| *event == InboundEvent::EndOfTurn).await;

    assert!(!client.chat().is_busy());
    assert_eq!(
        client.chat().transcript(),
        vec![ChatTurn::system("Hi! What are you looking for?")]
    );

    peer.emit(
        "recommendations",
        json!([{"item_id": "2101.00001", "title": "Graph Networks", "score": 0.9}]),
    );
    peer.emit(
        "options",
        json!([{"id": 1, "text": "Tell me more", "short_text": "More"}]),
    );
    pump_until(&mut client, |event| matches!(event, InboundEvent::Options(_))).await;

    assert_eq!(client.side_panel().recommendations().len(), 1);
    assert!(
        client
            .side_panel()
            .add_bookmark(&ArticleId::new("2101.00001"))
            .unwrap()
    );
    client.chat().select_quick_reply(&OptionId::from(1)).unwrap();
    assert!(matches!(
        client.chat().send_message("too early"),
        Err(AdaError::Busy)
    ));
    assert_eq!(client.chat().last_turn(), Some(ChatTurn::user("Tell me more")));

    sent_until(&peer, |events| {
        events.iter().any(|(name, _)| name == "select_option")
            && events.iter().any(|(name, _)| name == "add_bookmark")
    })
    .await;
}

#[tokio::test]
async fn test_stream_before_any_new_frame_is_dropped() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.enter_task(None).await.unwrap();
    assert_eq!(pump(&mut client).await, InboundEvent::Connected);

    peer.emit("message", json!({"text": "orphan"}));
    pump(&mut client).await;

    assert!(client.chat().transcript().is_empty());
}

#[tokio::test]
async fn test_restart_clears_transcript() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.enter_task(None).await.unwrap();
    stream_greeting(&peer);
    pump_until(&mut client, |event| *event == InboundEvent::EndOfTurn).await;

    peer.emit("restart", Value::Null);
    pump_until(&mut client, |event| *event == InboundEvent::Restart).await;

    assert!(client.chat().transcript().is_empty());
}

#[tokio::test]
async fn test_task_transitions_and_reload() {
    init_logger();
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());

    let first = client.enter_task(None).await.unwrap();
    stream_greeting(&peer);
    pump_until(&mut client, |event| *event == InboundEvent::EndOfTurn).await;

    let next = client.complete_task(None).unwrap();
    assert_eq!(next.slot, 1);
    assert_eq!(next.style, first.style.flip());

    let second = client.enter_task(None).await.unwrap();
    assert_eq!(second, next);
    assert_eq!(peer.connect_count(), 2);
    assert!(client.chat().transcript().is_empty());
    let events = sent_until(&peer, |events| activity(events, "Task completed").is_some()).await;
    assert!(activity(&events, "Task completed").is_some());
    client.close().await.unwrap();

    // A reload resumes the stored slot instead of drawing a new sequence
    let (mut reloaded, _peer) = client_with(&store, options());
    let resumed = reloaded.enter_task(None).await.unwrap();
    assert_eq!(resumed, second);
}

#[tokio::test]
async fn test_forced_style_and_switchable_last_task() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, _peer) = client_with(&store, options());

    client.enter_task(Some(ConversationStyle::Involved)).await.unwrap();
    client.complete_task(None).unwrap();
    client.complete_task(None).unwrap();

    let last = client.enter_task(None).await.unwrap();
    assert!(last.is_last());
    assert!(last.style_switchable);
    assert_eq!(last.style, ConversationStyle::Involved);
    assert!(client.chat().style_switchable());

    client.bus().set_busy(false);
    assert_eq!(
        client.chat().toggle_style().unwrap(),
        ConversationStyle::Considerate
    );

    client.complete_task(None).unwrap();
    client.finish_study().unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_expired_identity_wipes_task_sequence() {
    let store = Arc::new(MemoryStore::new());
    store
        .set("userStudyID", r#"{"userid":"old","expiresAt":0}"#)
        .unwrap();
    store.set(TASK_SEQUENCE_KEY, "{}").unwrap();

    let (client, _peer) = client_with(&store, ClientOptions::builder().rng_seed(1).build());

    assert_ne!(client.token().id.as_str(), "old");
    assert!(store.get(TASK_SEQUENCE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_connect_failure_is_reported_not_retried() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    peer.fail_next_connect("agent offline");

    // Task entry still succeeds; the channel reports the failure
    client.enter_task(None).await.unwrap();

    assert!(matches!(client.channel_state(), ChannelState::Error(_)));
    assert!(matches!(
        pump(&mut client).await,
        InboundEvent::ConnectError { .. }
    ));
    assert_eq!(peer.connect_count(), 0);

    client.connect().await.unwrap();
    assert_eq!(client.channel_state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_reconnect_after_lost_connection() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.connect().await.unwrap();
    pump_until(&mut client, |event| *event == InboundEvent::Connected).await;

    peer.disconnect();
    pump_until(&mut client, |event| {
        matches!(event, InboundEvent::Disconnected { .. })
    })
    .await;
    assert!(matches!(client.channel_state(), ChannelState::Error(_)));

    client.reconnect().await.unwrap();

    assert_eq!(client.channel_state(), ChannelState::Connected);
    assert_eq!(peer.connect_count(), 2);
    assert_eq!(pump(&mut client).await, InboundEvent::Connected);
}

#[tokio::test]
async fn test_authentication_result_is_kept() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.connect().await.unwrap();

    client.login("alice", "secret");
    sent_until(&peer, |events| events.iter().any(|(name, _)| name == "login")).await;
    peer.emit("authentication", json!({"success": false, "error": "bad password"}));
    pump_until(&mut client, |event| {
        matches!(event, InboundEvent::Authentication(_))
    })
    .await;

    let result = client.authentication().unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("bad password"));
}

#[tokio::test]
async fn test_navigation_changes_page() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.connect().await.unwrap();

    client.navigate("post-task");
    client.set_hints_open(true);

    let events = sent_until(&peer, |events| activity(events, "Open hints").is_some()).await;
    assert_eq!(activity(&events, "navigation").unwrap()["page"], "task");
    assert_eq!(activity(&events, "Open hints").unwrap()["page"], "post-task");
    assert_eq!(client.activity().page(), "post-task");
}

#[tokio::test]
async fn test_replaced_handler_takes_over() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.connect().await.unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    client
        .multiplexer_mut()
        .on_message(move |frame| sink.lock().push(frame.text.clone()));

    peer.emit("message", json!({"text": "mine", "info": "NEW"}));
    pump_until(&mut client, |event| matches!(event, InboundEvent::Message(_))).await;

    assert_eq!(*seen.lock(), vec!["mine"]);
    assert!(client.chat().transcript().is_empty());
}

#[tokio::test]
async fn test_busy_stall_keeps_waiting() {
    let store = Arc::new(MemoryStore::new());
    let options = ClientOptions::builder()
        .participant_id("P-1")
        .turn_stall_warning(Duration::from_millis(20))
        .build();
    let (mut client, peer) = client_with(&store, options);
    client.enter_task(None).await.unwrap();
    assert_eq!(pump(&mut client).await, InboundEvent::Connected);
    assert!(client.chat().is_busy());

    let late = peer.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        late.emit("EOT", Value::Null);
    });

    assert_eq!(pump(&mut client).await, InboundEvent::EndOfTurn);
    assert!(!client.chat().is_busy());
}

#[tokio::test]
async fn test_close_ends_processing() {
    let store = Arc::new(MemoryStore::new());
    let (mut client, peer) = client_with(&store, options());
    client.connect().await.unwrap();

    client.close().await.unwrap();

    assert!(client.process_next_event().await.is_none());
    assert!(!peer.is_connected());
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let (transport, _peer) = MemoryTransport::pair();
    let options = ClientOptions::builder().outbound_buffer(0).build();

    assert!(matches!(
        AdaClient::new(transport, store, options),
        Err(AdaError::InvalidConfig(_))
    ));
}
