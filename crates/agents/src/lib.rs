pub mod config;
pub mod locks;

use std::env;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use yatra_core::{
    compose, decide, screen, screen_sender, truncate_reply, understand, ConversationContext,
    KnowledgeBase, Outcome, StorageError, TurnError, UserStats,
};
use yatra_observability::AppMetrics;
use yatra_storage::{ContextRepository, Store};

pub use crate::config::AssistantConfig;
pub use crate::locks::UserLocks;

#[derive(Clone)]
pub struct BookingAssistant<S>
where
    S: ContextRepository,
{
    store: Arc<S>,
    knowledge: Arc<KnowledgeBase>,
    config: AssistantConfig,
    locks: UserLocks,
    metrics: Arc<AppMetrics>,
}

impl<S> BookingAssistant<S>
where
    S: ContextRepository,
{
    pub fn new(
        store: Arc<S>,
        knowledge: Arc<KnowledgeBase>,
        config: AssistantConfig,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            store,
            knowledge,
            config,
            locks: UserLocks::new(),
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Runs one conversational turn and always produces a reply.
    pub async fn handle_turn(&self, user_id: &str, raw_text: &str) -> String {
        self.handle_turn_at(user_id, raw_text, Utc::now()).await
    }

    #[instrument(skip(self, raw_text, now), fields(chars = raw_text.chars().count()))]
    pub async fn handle_turn_at(&self, user_id: &str, raw_text: &str, now: DateTime<Utc>) -> String {
        let started = Instant::now();
        self.metrics.inc_turn();

        let outcome = match self.run_turn(user_id, raw_text, now).await {
            Ok(outcome) => outcome,
            Err(TurnError::Malformed(reason)) => {
                self.metrics.inc_malformed();
                info!(reason = %reason, "rejected malformed input");
                Outcome::InvalidInput
            }
            Err(TurnError::Storage(err)) => {
                self.metrics.inc_storage_failure();
                error!(error = %err, "turn aborted by storage failure");
                Outcome::TryAgain
            }
        };

        match &outcome {
            Outcome::Complete { switched_from, .. } => {
                self.metrics.inc_booking_completed();
                if switched_from.is_some() {
                    self.metrics.inc_context_switch();
                }
            }
            Outcome::Prompt {
                switched_from: Some(_),
                ..
            } => self.metrics.inc_context_switch(),
            _ => {}
        }

        let reply = truncate_reply(
            &compose(&outcome, &self.knowledge),
            self.config.max_reply_chars,
        );

        self.metrics.observe_latency(started.elapsed());
        info!(outcome = outcome.kind(), reply_chars = reply.chars().count(), "turn handled");
        reply
    }

    async fn run_turn(
        &self,
        user_id: &str,
        raw_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome, TurnError> {
        let user_id = screen_sender(user_id)?;
        let text = screen(raw_text, self.config.max_input_chars)?;
        let understanding = understand(&text, self.config.today(now));
        debug!(intent = understanding.intent.as_code(), "message understood");

        let _guard = self.locks.acquire(&user_id).await;

        let mut context = match self.store.load_context(&user_id).await? {
            Some(context) if !context.is_expired(now, self.config.context_ttl) => context,
            Some(_) => {
                debug!("stored context expired, starting fresh");
                ConversationContext::new(user_id.as_str(), now)
            }
            None => ConversationContext::new(user_id.as_str(), now),
        };

        context.record_turn(now, &text, understanding.intent, self.config.history_cap);
        let outcome = decide(&mut context, &understanding, now);
        self.store.save_context(&context).await?;

        Ok(outcome)
    }

    /// Stats for a user with a live context; expired or unknown users yield `None`.
    pub async fn get_stats(&self, user_id: &str) -> Result<Option<UserStats>, StorageError> {
        Ok(self
            .live_context(user_id, Utc::now())
            .await?
            .map(|context| context.stats()))
    }

    pub async fn context(&self, user_id: &str) -> Result<Option<ConversationContext>, StorageError> {
        self.live_context(user_id, Utc::now()).await
    }

    /// Forgets everything stored for the user. Returns whether anything was removed.
    #[instrument(skip(self))]
    pub async fn reset(&self, user_id: &str) -> Result<bool, StorageError> {
        let _guard = self.locks.acquire(user_id).await;
        let removed = self.store.delete_context(user_id).await?;
        info!(removed, "user context reset");
        Ok(removed)
    }

    pub async fn purge_inactive(&self) -> Result<u64, StorageError> {
        let cutoff = Utc::now() - self.config.context_ttl;
        let removed = self.store.purge_inactive(cutoff).await?;
        if removed > 0 {
            info!(removed, "purged inactive contexts");
        }
        Ok(removed)
    }

    async fn live_context(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationContext>, StorageError> {
        let context = self.store.load_context(user_id).await?;
        Ok(context.filter(|context| !context.is_expired(now, self.config.context_ttl)))
    }
}

/// Wires an assistant from `YATRA_*` environment variables.
pub async fn build_assistant_from_env(metrics: Arc<AppMetrics>) -> Result<BookingAssistant<Store>> {
    let database_url = env::var("YATRA_DATABASE_URL").ok();
    let store = Store::from_database_url(database_url.as_deref()).await?;

    let knowledge = match env::var("YATRA_KNOWLEDGE_PATH") {
        Ok(path) if !path.trim().is_empty() => KnowledgeBase::from_path(path.trim())?,
        _ => KnowledgeBase::builtin(),
    };
    if knowledge.train_routes.is_empty() && knowledge.bus_routes.is_empty() {
        warn!("knowledge base has no routes, completions will use generic text");
    }

    info!(store = store.backend_name(), "booking assistant configured");
    Ok(BookingAssistant::new(
        Arc::new(store),
        Arc::new(knowledge),
        AssistantConfig::from_env(),
        metrics,
    ))
}
