pub mod compose;
pub mod engine;
pub mod entities;
pub mod error;
pub mod gate;
pub mod intent;
pub mod knowledge;
pub mod models;
pub mod schema;
pub mod text;

use chrono::NaiveDate;

pub use compose::{compose, truncate_reply};
pub use engine::{decide, Understanding};
pub use entities::{canonical_city, extract, Entities, KNOWN_CITIES};
pub use error::{MalformedInput, StorageError, TurnError};
pub use gate::{screen, screen_sender};
pub use intent::{
    classify, classify_with, help_subject, mentioned_task, IntentRule, INTENT_RULES,
};
pub use knowledge::KnowledgeBase;
pub use models::*;
pub use schema::{schema_for, TaskSchema, BUS_SCHEMA, TRAIN_SCHEMA};
pub use text::normalize_text;

/// Runs the stateless half of a turn over already screened text.
pub fn understand(normalized: &str, today: NaiveDate) -> Understanding {
    Understanding {
        intent: classify(normalized),
        entities: extract(normalized, today),
        topic: mentioned_task(normalized),
        subject: help_subject(normalized),
    }
}
