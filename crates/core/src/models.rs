use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    TrainBooking,
    BusBooking,
    Help,
    Reset,
    Stats,
    Unknown,
}

impl Intent {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::TrainBooking => "train_booking",
            Self::BusBooking => "bus_booking",
            Self::Help => "help",
            Self::Reset => "reset",
            Self::Stats => "stats",
            Self::Unknown => "unknown",
        }
    }

    /// The booking task this intent starts, if any.
    pub fn task(self) -> Option<TaskKind> {
        match self {
            Self::TrainBooking => Some(TaskKind::TrainBooking),
            Self::BusBooking => Some(TaskKind::BusBooking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    TrainBooking,
    BusBooking,
}

impl TaskKind {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::TrainBooking => "train_booking",
            Self::BusBooking => "bus_booking",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TrainBooking => "train booking",
            Self::BusBooking => "bus booking",
        }
    }

    pub fn mode(self) -> &'static str {
        match self {
            Self::TrainBooking => "train",
            Self::BusBooking => "bus",
        }
    }
}

/// A narrower help request within a travel mode, e.g. "tatkal tips" or "help classes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpSubject {
    Booking,
    Classes,
    Tatkal,
    PremiumTatkal,
    Overnight,
    LongDistance,
}

impl HelpSubject {
    /// The travel mode a subject belongs to. Booking steps and classes apply to both.
    pub fn task(self) -> Option<TaskKind> {
        match self {
            Self::Booking | Self::Classes => None,
            Self::Tatkal | Self::PremiumTatkal => Some(TaskKind::TrainBooking),
            Self::Overnight | Self::LongDistance => Some(TaskKind::BusBooking),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    FromCity,
    ToCity,
    Date,
    Class,
    BusType,
}

impl Slot {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::FromCity => "from_city",
            Self::ToCity => "to_city",
            Self::Date => "date",
            Self::Class => "class",
            Self::BusType => "bus_type",
        }
    }

    pub fn is_city(self) -> bool {
        matches!(self, Self::FromCity | Self::ToCity)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

pub type SlotMap = BTreeMap<Slot, String>;

/// Where the dialogue stands for one user between turns. Completion is transient: a task
/// that gathers its last slot is finalized and dropped back to `Idle` within the same turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    Idle,
    Collecting(TaskKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub text: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub task: TaskKind,
    pub from_city: Option<String>,
    pub to_city: Option<String>,
    pub date: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub user_id: String,
    pub active_task: Option<TaskKind>,
    #[serde(default)]
    pub slots: SlotMap,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub last_booking: Option<BookingSummary>,
}

impl ConversationContext {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            active_task: None,
            slots: SlotMap::new(),
            history: Vec::new(),
            turn_count: 0,
            created_at: now,
            last_active_at: now,
            last_booking: None,
        }
    }

    pub fn state(&self) -> DialogueState {
        match self.active_task {
            Some(task) => DialogueState::Collecting(task),
            None => DialogueState::Idle,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active_at > ttl
    }

    /// Appends a turn to the bounded history and refreshes the activity clock.
    pub fn record_turn(&mut self, now: DateTime<Utc>, text: &str, intent: Intent, cap: usize) {
        self.turn_count += 1;
        self.last_active_at = now;
        self.history.push(HistoryEntry {
            at: now,
            text: text.to_string(),
            intent,
        });

        let cap = cap.max(1);
        if self.history.len() > cap {
            let keep_from = self.history.len() - cap;
            self.history = self.history.split_off(keep_from);
        }
    }

    pub fn begin_task(&mut self, task: TaskKind) {
        self.active_task = Some(task);
        self.slots.clear();
    }

    pub fn clear_task(&mut self) {
        self.active_task = None;
        self.slots.clear();
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            turn_count: self.turn_count,
            first_seen: self.created_at,
            last_seen: self.last_active_at,
            active_task: self.active_task,
            pending_slot: self
                .active_task
                .and_then(|task| crate::schema::schema_for(task).first_missing(&self.slots)),
            last_booking: self.last_booking.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub turn_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub active_task: Option<TaskKind>,
    pub pending_slot: Option<Slot>,
    pub last_booking: Option<BookingSummary>,
}

/// What the decision engine resolved a turn to. Rendered into text by `compose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Menu {
        returning: bool,
        not_understood: bool,
    },
    Help {
        topic: Option<TaskKind>,
        subject: Option<HelpSubject>,
    },
    Stats(UserStats),
    ResetConfirmation,
    Prompt {
        task: TaskKind,
        slot: Slot,
        filled: SlotMap,
        switched_from: Option<TaskKind>,
    },
    Clarify {
        task: TaskKind,
        slot: Slot,
    },
    Complete {
        task: TaskKind,
        slots: SlotMap,
        switched_from: Option<TaskKind>,
    },
    InvalidInput,
    TryAgain,
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Menu { .. } => "menu",
            Self::Help { .. } => "help",
            Self::Stats(_) => "stats",
            Self::ResetConfirmation => "reset",
            Self::Prompt { .. } => "prompt",
            Self::Clarify { .. } => "clarify",
            Self::Complete { .. } => "complete",
            Self::InvalidInput => "invalid_input",
            Self::TryAgain => "try_again",
        }
    }
}
