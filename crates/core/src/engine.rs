use chrono::{DateTime, Utc};

use crate::entities::Entities;
use crate::models::{
    BookingSummary, ConversationContext, HelpSubject, Intent, Outcome, Slot, TaskKind,
};
use crate::schema::{schema_for, TaskSchema};

/// Everything understood from one message before the context is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Understanding {
    pub intent: Intent,
    pub entities: Entities,
    /// Travel mode named in the message, used to pick a help topic.
    pub topic: Option<TaskKind>,
    pub subject: Option<HelpSubject>,
}

/// Advances the dialogue for one turn. The turn must already be recorded on `ctx`.
pub fn decide(ctx: &mut ConversationContext, turn: &Understanding, now: DateTime<Utc>) -> Outcome {
    match turn.intent {
        Intent::Reset => {
            ctx.clear_task();
            return Outcome::ResetConfirmation;
        }
        Intent::Help => {
            return Outcome::Help {
                topic: turn
                    .topic
                    .or(turn.subject.and_then(HelpSubject::task))
                    .or(ctx.active_task),
                subject: turn.subject,
            };
        }
        Intent::Stats => return Outcome::Stats(ctx.stats()),
        _ => {}
    }

    // A new task intent switches before any entity is merged, so the entities are judged
    // against the new schema.
    let mut switched_from = None;
    if let Some(task) = turn.intent.task() {
        if ctx.active_task != Some(task) {
            switched_from = ctx.active_task;
            ctx.begin_task(task);
        }
    }

    let Some(task) = ctx.active_task else {
        return Outcome::Menu {
            returning: ctx.turn_count > 1,
            not_understood: turn.intent != Intent::Greeting,
        };
    };

    let schema = schema_for(task);
    let applied = merge_entities(ctx, schema, &turn.entities);

    if let Some(slot) = schema.first_missing(&ctx.slots) {
        if applied == 0 && turn.intent.task().is_none() {
            return Outcome::Clarify { task, slot };
        }
        return Outcome::Prompt {
            task,
            slot,
            filled: ctx.slots.clone(),
            switched_from,
        };
    }

    let slots = std::mem::take(&mut ctx.slots);
    ctx.active_task = None;
    ctx.last_booking = Some(BookingSummary {
        task,
        from_city: slots.get(&Slot::FromCity).cloned(),
        to_city: slots.get(&Slot::ToCity).cloned(),
        date: slots.get(&Slot::Date).cloned(),
        completed_at: now,
    });

    Outcome::Complete {
        task,
        slots,
        switched_from,
    }
}

/// Writes the entities the schema accepts into the context, overwriting earlier values.
/// Returns how many slots were written.
fn merge_entities(ctx: &mut ConversationContext, schema: &TaskSchema, entities: &Entities) -> usize {
    let mut applied = 0;

    for (slot, value) in &entities.slots {
        if schema.accepts(*slot) {
            ctx.slots.insert(*slot, value.clone());
            applied += 1;
        }
    }

    if let Some(city) = &entities.unanchored_city {
        let open = schema
            .required_slots
            .iter()
            .copied()
            .find(|slot| slot.is_city() && !ctx.slots.contains_key(slot));
        if let Some(slot) = open {
            ctx.slots.insert(slot, city.clone());
            applied += 1;
        }
    }

    applied
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::entities::extract;
    use crate::intent::{classify, help_subject, mentioned_task};
    use crate::text::normalize_text;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn turn(ctx: &mut ConversationContext, raw: &str) -> Outcome {
        let text = normalize_text(raw);
        let understanding = Understanding {
            intent: classify(&text),
            entities: extract(&text, today()),
            topic: mentioned_task(&text),
            subject: help_subject(&text),
        };
        let now = Utc::now();
        ctx.record_turn(now, &text, understanding.intent, 10);
        decide(ctx, &understanding, now)
    }

    fn fresh() -> ConversationContext {
        ConversationContext::new("tester", Utc::now())
    }

    #[test]
    fn progressive_train_booking() {
        let mut ctx = fresh();

        let first = turn(&mut ctx, "I want to book train from Delhi to Mumbai");
        assert!(matches!(first, Outcome::Prompt { slot: Slot::Date, .. }));

        let second = turn(&mut ctx, "tomorrow");
        assert!(matches!(second, Outcome::Prompt { slot: Slot::Class, .. }));
        assert_eq!(ctx.slots.get(&Slot::Date).map(String::as_str), Some("2026-10-15"));

        match turn(&mut ctx, "2AC") {
            Outcome::Complete { task, slots, switched_from } => {
                assert_eq!(task, TaskKind::TrainBooking);
                assert_eq!(slots.get(&Slot::FromCity).map(String::as_str), Some("Delhi"));
                assert_eq!(slots.get(&Slot::ToCity).map(String::as_str), Some("Mumbai"));
                assert_eq!(slots.get(&Slot::Class).map(String::as_str), Some("2AC"));
                assert_eq!(switched_from, None);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(ctx.active_task, None);
        assert!(ctx.slots.is_empty());
        assert_eq!(
            ctx.last_booking.as_ref().and_then(|b| b.to_city.as_deref()),
            Some("Mumbai")
        );
    }

    #[test]
    fn completes_on_the_same_turn() {
        let mut ctx = fresh();
        let outcome = turn(&mut ctx, "book bus from bangalore to chennai tomorrow ac sleeper");
        assert!(matches!(outcome, Outcome::Complete { task: TaskKind::BusBooking, .. }));
        assert_eq!(ctx.active_task, None);
    }

    #[test]
    fn asks_one_question_at_a_time() {
        let mut ctx = fresh();
        match turn(&mut ctx, "book a train") {
            Outcome::Prompt { slot, filled, .. } => {
                assert_eq!(slot, Slot::FromCity);
                assert!(filled.is_empty());
            }
            other => panic!("expected prompt, got {other:?}"),
        }
    }

    #[test]
    fn unanchored_city_fills_the_awaited_slot() {
        let mut ctx = fresh();
        turn(&mut ctx, "book a train");
        turn(&mut ctx, "Delhi");
        let outcome = turn(&mut ctx, "bombay");

        assert!(matches!(outcome, Outcome::Prompt { slot: Slot::Date, .. }));
        assert_eq!(ctx.slots.get(&Slot::FromCity).map(String::as_str), Some("Delhi"));
        assert_eq!(ctx.slots.get(&Slot::ToCity).map(String::as_str), Some("Mumbai"));
    }

    #[test]
    fn later_values_overwrite_earlier_ones() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai tomorrow");
        turn(&mut ctx, "actually from pune");
        assert_eq!(ctx.slots.get(&Slot::FromCity).map(String::as_str), Some("Pune"));
        assert_eq!(ctx.slots.get(&Slot::ToCity).map(String::as_str), Some("Mumbai"));
    }

    #[test]
    fn switching_tasks_discards_old_slots() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai, 3ac");

        match turn(&mut ctx, "actually I need a bus instead") {
            Outcome::Prompt { task, slot, filled, switched_from } => {
                assert_eq!(task, TaskKind::BusBooking);
                assert_eq!(slot, Slot::FromCity);
                assert!(filled.is_empty());
                assert_eq!(switched_from, Some(TaskKind::TrainBooking));
            }
            other => panic!("expected prompt, got {other:?}"),
        }
        assert!(!ctx.slots.contains_key(&Slot::Class));
    }

    #[test]
    fn switch_keeps_entities_valid_for_the_new_task() {
        let mut ctx = fresh();
        turn(&mut ctx, "train please");
        let outcome = turn(&mut ctx, "bus from chennai to bangalore in 2ac");

        assert!(matches!(
            outcome,
            Outcome::Prompt { task: TaskKind::BusBooking, slot: Slot::Date, .. }
        ));
        assert_eq!(ctx.slots.len(), 2);
    }

    #[test]
    fn help_and_stats_leave_the_task_alone() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai");
        let before = ctx.slots.clone();

        assert_eq!(
            turn(&mut ctx, "help"),
            Outcome::Help {
                topic: Some(TaskKind::TrainBooking),
                subject: None,
            }
        );
        assert!(matches!(turn(&mut ctx, "stats"), Outcome::Stats(_)));
        assert_eq!(ctx.active_task, Some(TaskKind::TrainBooking));
        assert_eq!(ctx.slots, before);
    }

    #[test]
    fn help_subject_picks_its_own_mode() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai");

        assert_eq!(
            turn(&mut ctx, "any tips for overnight journeys?"),
            Outcome::Help {
                topic: Some(TaskKind::BusBooking),
                subject: Some(HelpSubject::Overnight),
            }
        );
        assert_eq!(ctx.active_task, Some(TaskKind::TrainBooking));
    }

    #[test]
    fn a_sentence_mentioning_cancel_switches_instead_of_resetting() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai");

        let outcome = turn(&mut ctx, "cancel the train, book a bus instead");
        assert!(matches!(
            outcome,
            Outcome::Prompt {
                task: TaskKind::BusBooking,
                switched_from: Some(TaskKind::TrainBooking),
                ..
            }
        ));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut ctx = fresh();
        turn(&mut ctx, "bus from mumbai to pune");

        assert_eq!(turn(&mut ctx, "reset"), Outcome::ResetConfirmation);
        assert_eq!(ctx.active_task, None);
        assert!(ctx.slots.is_empty());

        assert_eq!(turn(&mut ctx, "start over"), Outcome::ResetConfirmation);
        assert_eq!(ctx.active_task, None);
    }

    #[test]
    fn idle_chatter_shows_the_menu() {
        let mut ctx = fresh();
        assert_eq!(
            turn(&mut ctx, "hello"),
            Outcome::Menu { returning: false, not_understood: false }
        );
        assert_eq!(
            turn(&mut ctx, "what is the weather"),
            Outcome::Menu { returning: true, not_understood: true }
        );
        assert_eq!(ctx.active_task, None);
    }

    #[test]
    fn unrelated_text_mid_task_reprompts_same_slot() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai");

        assert_eq!(
            turn(&mut ctx, "hmm not sure"),
            Outcome::Clarify { task: TaskKind::TrainBooking, slot: Slot::Date }
        );
        assert_eq!(ctx.slots.len(), 2);
    }

    #[test]
    fn foreign_slot_alone_counts_as_unrelated() {
        let mut ctx = fresh();
        turn(&mut ctx, "train from delhi to mumbai tomorrow");
        assert_eq!(
            turn(&mut ctx, "volvo"),
            Outcome::Clarify { task: TaskKind::TrainBooking, slot: Slot::Class }
        );
    }
}
