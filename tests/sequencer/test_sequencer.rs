//! Unit tests for `TaskSequencer`
//!
//! Tests the drawn sequence, persistence across reloads, slot transitions and
//! the reconnect issued on every task entry

use std::sync::Arc;

use ada_client::sequencer::{SWITCHABLE_SLOT, TASK_SEQUENCE_KEY};
use ada_client::{
    AdaError, ChannelControl, ConversationStyle, KeyValueStore, MemoryStore, Result, SharedStore,
    TaskSequenceState, TaskSequencer,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

#[derive(Default)]
struct CountingChannel {
    reconnects: usize,
    fail: bool,
}

impl ChannelControl for CountingChannel {
    async fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        if self.fail {
            return Err(AdaError::connection("server down"));
        }
        Ok(())
    }
}

fn sequencer(store: &Arc<MemoryStore>, seed: u64) -> TaskSequencer {
    let shared: SharedStore = store.clone();
    TaskSequencer::new(shared, StdRng::seed_from_u64(seed))
}

fn stored(store: &MemoryStore) -> Value {
    serde_json::from_str(&store.get(TASK_SEQUENCE_KEY).unwrap().unwrap()).unwrap()
}

#[test]
fn test_random_sequence_is_valid() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..50 {
        let state = TaskSequenceState::random(&mut rng);
        assert!(state.is_valid());
        assert_eq!(state.current_task_slot, 0);
        let mut topics = state.topic_permutation;
        topics.sort_unstable();
        assert_eq!(topics, [0, 1, 2]);
    }
}

#[test]
fn test_load_or_create_persists_once() {
    let store = Arc::new(MemoryStore::new());

    let first = sequencer(&store, 7).load_or_create().unwrap();
    let record = stored(&store);
    assert_eq!(record["currentTaskSlot"], 0);
    assert_eq!(record["topicIndex"], first.topic_permutation[0]);

    // Another seed must not matter once a record exists
    let again = sequencer(&store, 99).load_or_create().unwrap();
    assert_eq!(first, again);
}

#[test]
fn test_reload_resumes_stored_slot() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            TASK_SEQUENCE_KEY,
            &json!({
                "topicPermutation": [2, 0, 1],
                "topicSetId": 1,
                "currentTaskSlot": 1,
                "currentStyle": "involved"
            })
            .to_string(),
        )
        .unwrap();

    let state = sequencer(&store, 3).load_or_create().unwrap();
    let assignment = state.assignment();

    assert_eq!(assignment.slot, 1);
    assert_eq!(assignment.topic_index, 0);
    assert_eq!(assignment.topic_set_id, 1);
    assert_eq!(assignment.style, ConversationStyle::Involved);
    assert!(!assignment.style_switchable);
}

#[test]
fn test_invalid_record_is_replaced() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            TASK_SEQUENCE_KEY,
            &json!({
                "topicPermutation": [0, 0, 1],
                "topicSetId": 1,
                "currentTaskSlot": 1,
                "currentStyle": "involved"
            })
            .to_string(),
        )
        .unwrap();

    let state = sequencer(&store, 3).load_or_create().unwrap();

    assert!(state.is_valid());
    assert_eq!(state.current_task_slot, 0);
    assert_eq!(stored(&store)["currentTaskSlot"], 0);
}

#[test]
fn test_three_completions_cycle_back() {
    let store = Arc::new(MemoryStore::new());
    let mut seq = sequencer(&store, 11);
    let start = seq.load_or_create().unwrap();

    let mut styles = vec![start.current_style];
    for _ in 0..3 {
        styles.push(seq.complete_task(None).unwrap().style);
    }

    let end = seq.state().unwrap();
    assert_eq!(end.current_task_slot, 0);
    assert_eq!(end.topic_permutation, start.topic_permutation);
    assert_eq!(end.topic_set_id, start.topic_set_id);
    assert_eq!(styles[1], styles[0].flip());
    assert_eq!(styles[2], styles[0]);
    assert_eq!(styles[3], styles[0].flip());
}

#[test]
fn test_complete_task_persists_and_honors_forced_style() {
    let store = Arc::new(MemoryStore::new());
    let mut seq = sequencer(&store, 5);
    let start = seq.load_or_create().unwrap();

    let next = seq.complete_task(Some(start.current_style)).unwrap();

    assert_eq!(next.slot, 1);
    assert_eq!(next.style, start.current_style);
    assert_eq!(next.topic_index, start.topic_permutation[1]);
    let record = stored(&store);
    assert_eq!(record["currentTaskSlot"], 1);
    assert_eq!(record["topicIndex"], start.topic_permutation[1]);
}

#[test]
fn test_complete_without_task() {
    let store = Arc::new(MemoryStore::new());
    assert!(matches!(
        sequencer(&store, 1).complete_task(None),
        Err(AdaError::NoActiveTask)
    ));
}

#[test]
fn test_last_slot_is_switchable() {
    let store = Arc::new(MemoryStore::new());
    let mut seq = sequencer(&store, 2);
    seq.load_or_create().unwrap();

    let second = seq.complete_task(None).unwrap();
    assert!(!second.style_switchable);
    assert!(!second.is_last());

    let third = seq.complete_task(None).unwrap();
    assert_eq!(third.slot, SWITCHABLE_SLOT);
    assert!(third.style_switchable);
    assert!(third.is_last());
}

#[tokio::test]
async fn test_enter_task_reconnects_every_time() {
    let store = Arc::new(MemoryStore::new());
    let mut seq = sequencer(&store, 4);
    let mut channel = CountingChannel::default();

    let first = seq.enter_task(&mut channel, None).await.unwrap();
    let again = seq.enter_task(&mut channel, None).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(channel.reconnects, 2);
    assert_eq!(seq.current(), Some(first));
}

#[tokio::test]
async fn test_enter_task_with_forced_style_persists_it() {
    let store = Arc::new(MemoryStore::new());
    let mut seq = sequencer(&store, 4);
    let mut channel = CountingChannel::default();
    let natural = seq.load_or_create().unwrap().current_style;

    let assignment = seq
        .enter_task(&mut channel, Some(natural.flip()))
        .await
        .unwrap();

    assert_eq!(assignment.style, natural.flip());
    assert_eq!(stored(&store)["currentStyle"], natural.flip().as_str());
    let reloaded = sequencer(&store, 8).load_or_create().unwrap();
    assert_eq!(reloaded.current_style, natural.flip());
}

#[tokio::test]
async fn test_enter_task_survives_failed_reconnect() {
    let store = Arc::new(MemoryStore::new());
    let mut seq = sequencer(&store, 4);
    let mut channel = CountingChannel {
        fail: true,
        ..CountingChannel::default()
    };

    let assignment = assert_ok!(seq.enter_task(&mut channel, None).await);

    assert_eq!(assignment.slot, 0);
    assert_eq!(channel.reconnects, 1);
    assert_err!(channel.reconnect().await);
}

#[test]
fn test_finish_study_clears_profile() {
    let store = Arc::new(MemoryStore::new());
    store.set("userStudyID", "{}").unwrap();
    let mut seq = sequencer(&store, 4);
    seq.load_or_create().unwrap();

    seq.finish_study().unwrap();

    assert!(store.is_empty());
    assert!(seq.current().is_none());
}
