use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use yatra_agents::{AssistantConfig, BookingAssistant};
use yatra_core::{ConversationContext, KnowledgeBase, Slot, StorageError, TaskKind};
use yatra_observability::AppMetrics;
use yatra_storage::{ContextRepository, MemoryStore};

/// Memory store that can be told to fail and counts every call it receives.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl ContextRepository for FlakyStore {
    async fn load_context(&self, user_id: &str) -> Result<Option<ConversationContext>, StorageError> {
        self.check()?;
        self.inner.load_context(user_id).await
    }

    async fn save_context(&self, context: &ConversationContext) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save_context(context).await
    }

    async fn delete_context(&self, user_id: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete_context(user_id).await
    }

    async fn purge_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.check()?;
        self.inner.purge_inactive(cutoff).await
    }
}

fn assistant_with<S: ContextRepository>(store: S) -> (BookingAssistant<S>, Arc<AppMetrics>) {
    let metrics = AppMetrics::shared();
    let assistant = BookingAssistant::new(
        Arc::new(store),
        Arc::new(KnowledgeBase::builtin()),
        AssistantConfig::default(),
        metrics.clone(),
    );
    (assistant, metrics)
}

#[tokio::test]
async fn progressive_booking_completes_and_clears_slots() {
    let (assistant, metrics) = assistant_with(MemoryStore::new());

    let reply = assistant
        .handle_turn("u1", "I want to book train from Delhi to Mumbai")
        .await;
    assert!(reply.contains("When do you want to travel?"));

    let reply = assistant.handle_turn("u1", "tomorrow").await;
    assert!(reply.contains("Which class would you prefer?"));

    let reply = assistant.handle_turn("u1", "2AC").await;
    assert!(reply.contains("Mumbai"));
    assert!(reply.chars().count() <= assistant.config().max_reply_chars);

    let context = assistant.context("u1").await.unwrap().unwrap();
    assert_eq!(context.active_task, None);
    assert!(context.slots.is_empty());
    assert_eq!(context.turn_count, 3);
    assert_eq!(
        context.last_booking.map(|booking| booking.task),
        Some(TaskKind::TrainBooking)
    );
    assert_eq!(metrics.snapshot().bookings_completed_total, 1);
}

#[tokio::test]
async fn switching_mode_mid_booking_starts_over() {
    let (assistant, metrics) = assistant_with(MemoryStore::new());

    assistant
        .handle_turn("u2", "train from Delhi to Mumbai in 3AC")
        .await;
    let reply = assistant.handle_turn("u2", "actually I need a bus").await;
    assert!(reply.contains("Switching from your train booking to a bus booking."));

    let context = assistant.context("u2").await.unwrap().unwrap();
    assert_eq!(context.active_task, Some(TaskKind::BusBooking));
    assert!(context.slots.is_empty());
    assert_eq!(metrics.snapshot().context_switches_total, 1);
}

#[tokio::test]
async fn cancelling_one_mode_for_another_is_a_switch_not_a_reset() {
    let (assistant, _) = assistant_with(MemoryStore::new());

    assistant
        .handle_turn("u8", "train from Delhi to Mumbai")
        .await;
    let reply = assistant
        .handle_turn("u8", "cancel the train, book a bus instead")
        .await;
    assert!(reply.contains("Switching from your train booking to a bus booking."));

    let context = assistant.context("u8").await.unwrap().unwrap();
    assert_eq!(context.active_task, Some(TaskKind::BusBooking));
}

#[tokio::test]
async fn help_subjects_answer_without_touching_the_booking() {
    let (assistant, _) = assistant_with(MemoryStore::new());

    assistant
        .handle_turn("u9", "train from Delhi to Mumbai")
        .await;
    let reply = assistant.handle_turn("u9", "any tatkal tips?").await;
    assert!(reply.starts_with("Tatkal booking tips:"), "{reply}");

    let reply = assistant.handle_turn("u9", "help with overnight bus journeys").await;
    assert!(reply.starts_with("Overnight bus tips:"), "{reply}");

    let context = assistant.context("u9").await.unwrap().unwrap();
    assert_eq!(context.active_task, Some(TaskKind::TrainBooking));
    assert_eq!(context.slots.get(&Slot::ToCity).map(String::as_str), Some("Mumbai"));
}

#[tokio::test]
async fn storage_failure_asks_to_retry_and_keeps_state() {
    let store = FlakyStore::default();
    let (assistant, metrics) = assistant_with(store.clone());

    assistant
        .handle_turn("u3", "bus from Mumbai to Pune")
        .await;

    store.set_failing(true);
    let reply = assistant.handle_turn("u3", "tomorrow").await;
    assert!(reply.contains("Please try again"));
    store.set_failing(false);

    let context = assistant.context("u3").await.unwrap().unwrap();
    assert_eq!(context.turn_count, 1);
    assert!(!context.slots.contains_key(&Slot::Date));
    assert_eq!(metrics.snapshot().storage_failures_total, 1);
}

#[tokio::test]
async fn malformed_input_never_reaches_the_store() {
    let store = FlakyStore::default();
    let (assistant, metrics) = assistant_with(store.clone());

    for raw in ["", "    ", "?!?!", "\u{1F642}\u{1F642}"] {
        let reply = assistant.handle_turn("u4", raw).await;
        assert!(reply.contains("couldn't read that message"), "{raw:?} gave {reply}");
    }
    let long = "a".repeat(assistant.config().max_input_chars + 1);
    assistant.handle_turn("u4", &long).await;
    assistant.handle_turn("   ", "hello").await;

    assert_eq!(store.calls(), 0);
    assert_eq!(metrics.snapshot().malformed_total, 6);
}

#[tokio::test]
async fn expired_context_starts_fresh() {
    let (assistant, _) = assistant_with(MemoryStore::new());
    let start = Utc::now() - Duration::hours(2);

    assistant
        .handle_turn_at("u5", "train from Delhi to Mumbai", start)
        .await;
    let later = start + assistant.config().context_ttl + Duration::minutes(1);
    let reply = assistant.handle_turn_at("u5", "tomorrow", later).await;
    assert!(reply.contains("I didn't quite understand that."));

    let stored = assistant.store().load_context("u5").await.unwrap().unwrap();
    assert_eq!(stored.turn_count, 1);
    assert_eq!(stored.active_task, None);

    // Two hours old relative to the wall clock, so stats treat it as gone.
    assert!(assistant.get_stats("u5").await.unwrap().is_none());
    assert_eq!(assistant.purge_inactive().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_turns_for_one_user_are_serialized() {
    let (assistant, _) = assistant_with(MemoryStore::new());

    let replies = join_all((0..16).map(|_| assistant.handle_turn("crowd", "hello"))).await;
    assert_eq!(replies.len(), 16);

    let context = assistant.context("crowd").await.unwrap().unwrap();
    assert_eq!(context.turn_count, 16);
    assert_eq!(context.history.len(), assistant.config().history_cap);
}

#[tokio::test]
async fn concurrent_users_do_not_share_state() {
    let (assistant, _) = assistant_with(MemoryStore::new());

    join_all([
        assistant.handle_turn("alice", "train from Delhi to Mumbai"),
        assistant.handle_turn("bob", "bus from Chennai to Bangalore"),
    ])
    .await;

    let alice = assistant.context("alice").await.unwrap().unwrap();
    let bob = assistant.context("bob").await.unwrap().unwrap();
    assert_eq!(alice.active_task, Some(TaskKind::TrainBooking));
    assert_eq!(bob.active_task, Some(TaskKind::BusBooking));
    assert_eq!(bob.slots.get(&Slot::FromCity).map(String::as_str), Some("Chennai"));
}

#[tokio::test]
async fn chat_reset_keeps_counters_and_admin_reset_forgets() {
    let (assistant, _) = assistant_with(MemoryStore::new());

    assistant.handle_turn("u6", "bus from Mumbai to Pune").await;
    let first = assistant.handle_turn("u6", "reset").await;
    let second = assistant.handle_turn("u6", "reset").await;
    assert_eq!(first, second);

    let stats = assistant.get_stats("u6").await.unwrap().unwrap();
    assert_eq!(stats.turn_count, 3);
    assert_eq!(stats.active_task, None);
    assert_eq!(stats.pending_slot, None);

    assert!(assistant.reset("u6").await.unwrap());
    assert!(!assistant.reset("u6").await.unwrap());
    assert!(assistant.get_stats("u6").await.unwrap().is_none());
}

#[tokio::test]
async fn stats_report_the_pending_slot() {
    let (assistant, _) = assistant_with(MemoryStore::new());
    assert!(assistant.get_stats("u7").await.unwrap().is_none());

    assistant.handle_turn("u7", "bus from Mumbai to Pune").await;
    let stats = assistant.get_stats("u7").await.unwrap().unwrap();
    assert_eq!(stats.active_task, Some(TaskKind::BusBooking));
    assert_eq!(stats.pending_slot, Some(Slot::Date));

    let reply = assistant.handle_turn("u7", "stats").await;
    assert!(reply.contains("Messages: 2"));
}
