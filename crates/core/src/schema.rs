use crate::compose::{bus_guidance, train_guidance};
use crate::knowledge::KnowledgeBase;
use crate::models::{Slot, SlotMap, TaskKind};

pub type Finalizer = fn(&SlotMap, &KnowledgeBase) -> String;

/// Static description of a booking task: which slots it needs, in the order they are asked
/// for, and how a completed request is rendered.
#[derive(Clone, Copy)]
pub struct TaskSchema {
    pub task: TaskKind,
    pub required_slots: &'static [Slot],
    pub prompts: &'static [(Slot, &'static str)],
    pub finalizer: Finalizer,
}

const FROM_PROMPT: &str = "Which city are you traveling from?";
const TO_PROMPT: &str = "Which city are you traveling to?";
const DATE_PROMPT: &str =
    "When do you want to travel? (for example: tomorrow, next Friday, 25th January)";

pub static TRAIN_SCHEMA: TaskSchema = TaskSchema {
    task: TaskKind::TrainBooking,
    required_slots: &[Slot::FromCity, Slot::ToCity, Slot::Date, Slot::Class],
    prompts: &[
        (Slot::FromCity, FROM_PROMPT),
        (Slot::ToCity, TO_PROMPT),
        (Slot::Date, DATE_PROMPT),
        (
            Slot::Class,
            "Which class would you prefer? (1AC, 2AC, 3AC, SL, CC, EC)",
        ),
    ],
    finalizer: train_guidance,
};

pub static BUS_SCHEMA: TaskSchema = TaskSchema {
    task: TaskKind::BusBooking,
    required_slots: &[Slot::FromCity, Slot::ToCity, Slot::Date, Slot::BusType],
    prompts: &[
        (Slot::FromCity, FROM_PROMPT),
        (Slot::ToCity, TO_PROMPT),
        (Slot::Date, DATE_PROMPT),
        (
            Slot::BusType,
            "What type of bus do you prefer? (AC Sleeper, Non-AC Sleeper, AC Semi-Sleeper, Volvo AC, Multi-Axle, AC, Non-AC)",
        ),
    ],
    finalizer: bus_guidance,
};

pub fn schema_for(task: TaskKind) -> &'static TaskSchema {
    match task {
        TaskKind::TrainBooking => &TRAIN_SCHEMA,
        TaskKind::BusBooking => &BUS_SCHEMA,
    }
}

impl TaskSchema {
    pub fn first_missing(&self, slots: &SlotMap) -> Option<Slot> {
        self.required_slots
            .iter()
            .copied()
            .find(|slot| !slots.contains_key(slot))
    }

    pub fn accepts(&self, slot: Slot) -> bool {
        self.required_slots.contains(&slot)
    }

    pub fn prompt(&self, slot: Slot) -> &'static str {
        self.prompts
            .iter()
            .find(|(candidate, _)| *candidate == slot)
            .map(|(_, prompt)| *prompt)
            .unwrap_or("Could you share a few more details?")
    }

    pub fn finalize(&self, slots: &SlotMap, knowledge: &KnowledgeBase) -> String {
        (self.finalizer)(slots, knowledge)
    }
}
