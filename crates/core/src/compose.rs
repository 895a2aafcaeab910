use std::fmt::Write as _;

use crate::knowledge::{KnowledgeBase, RouteInfo};
use crate::models::{HelpSubject, Outcome, Slot, SlotMap, TaskKind, UserStats};
use crate::schema::schema_for;

const CONTINUATION_NOTE: &str = "\n\n(Message shortened. Reply \"help\" for more.)";

pub fn compose(outcome: &Outcome, knowledge: &KnowledgeBase) -> String {
    match outcome {
        Outcome::Menu {
            returning,
            not_understood,
        } => menu(*returning, *not_understood),
        Outcome::Help { topic, subject } => match subject {
            Some(subject) => subject_help(*subject, *topic, knowledge),
            None => help(*topic, knowledge),
        },
        Outcome::Stats(stats) => stats_text(stats),
        Outcome::ResetConfirmation => {
            "Context reset! How can I help you with your travel booking?".to_string()
        }
        Outcome::Prompt {
            task,
            slot,
            filled,
            switched_from,
        } => {
            let mut reply = switch_note(*task, *switched_from);
            if filled.is_empty() && switched_from.is_none() {
                let _ = writeln!(reply, "Sure, let's sort out your {} ticket.", task.mode());
            } else if !filled.is_empty() {
                let _ = writeln!(reply, "Got it: {}.", progress(filled));
            }
            reply.push_str(schema_for(*task).prompt(*slot));
            reply
        }
        Outcome::Clarify { task, slot } => format!(
            "Sorry, I couldn't find that in your message. {}",
            schema_for(*task).prompt(*slot)
        ),
        Outcome::Complete {
            task,
            slots,
            switched_from,
        } => {
            let mut reply = switch_note(*task, *switched_from);
            reply.push_str(&schema_for(*task).finalize(slots, knowledge));
            reply
        }
        Outcome::InvalidInput => "I couldn't read that message. Please send your travel request \
                                  as text, for example: \"Book train from Delhi to Mumbai tomorrow\"."
            .to_string(),
        Outcome::TryAgain => {
            "Sorry, something went wrong on our side. Please try again in a moment.".to_string()
        }
    }
}

/// Cuts `reply` at the last line that fits within `max_chars` (including the continuation
/// note). A single over-long first line is cut mid-line.
pub fn truncate_reply(reply: &str, max_chars: usize) -> String {
    if reply.chars().count() <= max_chars {
        return reply.to_string();
    }

    let note_len = CONTINUATION_NOTE.chars().count();
    if max_chars <= note_len {
        return reply.chars().take(max_chars).collect();
    }
    let budget = max_chars - note_len;

    let mut kept = String::new();
    let mut used = 0;
    for line in reply.lines() {
        let cost = line.chars().count() + usize::from(!kept.is_empty());
        if used + cost > budget {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        used += cost;
    }

    if kept.trim().is_empty() {
        kept = reply.chars().take(budget).collect();
    }

    kept.trim_end().to_string() + CONTINUATION_NOTE
}

pub fn train_guidance(slots: &SlotMap, knowledge: &KnowledgeBase) -> String {
    let class = slot(slots, Slot::Class);
    let mut out = journey_header(TaskKind::TrainBooking, slots);
    let _ = writeln!(
        out,
        "- Class: {class}{}",
        knowledge
            .train_class(class)
            .map(|info| format!(" ({})", info.name))
            .unwrap_or_default()
    );

    route_section(
        &mut out,
        TaskKind::TrainBooking,
        slots,
        class,
        knowledge,
        ("Popular trains", "Available classes"),
    );

    if let Some(info) = knowledge.train_class(class) {
        let _ = writeln!(out, "\n{} class details:", info.code);
        let _ = writeln!(out, "- {}: {}", info.name, info.description);
        if !info.amenities.is_empty() {
            let _ = writeln!(out, "- Amenities: {}", info.amenities.join(", "));
        }
    }

    platform_section(&mut out, TaskKind::TrainBooking, knowledge);
    out.trim_end().to_string()
}

pub fn bus_guidance(slots: &SlotMap, knowledge: &KnowledgeBase) -> String {
    let bus_type = slot(slots, Slot::BusType);
    let mut out = journey_header(TaskKind::BusBooking, slots);
    let _ = writeln!(out, "- Bus type: {bus_type}");

    route_section(
        &mut out,
        TaskKind::BusBooking,
        slots,
        bus_type,
        knowledge,
        ("Popular operators", "Bus types"),
    );

    let from = slot(slots, Slot::FromCity);
    let to = slot(slots, Slot::ToCity);
    if let Some(route) = knowledge.route(TaskKind::BusBooking, from, to) {
        let rated = route
            .services
            .iter()
            .filter_map(|name| knowledge.operator(name))
            .collect::<Vec<_>>();
        if !rated.is_empty() {
            out.push_str("\nOperator ratings:\n");
            for operator in rated {
                let _ = writeln!(
                    out,
                    "- {}: {:.1}/5, {}",
                    operator.name, operator.rating, operator.speciality
                );
            }
        }
    }

    if let Some(info) = knowledge.bus_type(bus_type) {
        let _ = writeln!(out, "\n{} details:", info.name);
        let _ = writeln!(out, "- {}", info.description);
        if !info.amenities.is_empty() {
            let _ = writeln!(out, "- Amenities: {}", info.amenities.join(", "));
        }
        let _ = writeln!(out, "- Best for: {}", info.best_for);
    }

    platform_section(&mut out, TaskKind::BusBooking, knowledge);
    out.trim_end().to_string()
}

fn slot(slots: &SlotMap, slot: Slot) -> &str {
    slots.get(&slot).map(String::as_str).unwrap_or("-")
}

fn journey_header(task: TaskKind, slots: &SlotMap) -> String {
    let mut out = String::new();
    let mode = task.mode();
    let _ = writeln!(out, "Your {mode} booking request is ready.\n");
    out.push_str("Journey details:\n");
    let _ = writeln!(out, "- From: {}", slot(slots, Slot::FromCity));
    let _ = writeln!(out, "- To: {}", slot(slots, Slot::ToCity));
    let _ = writeln!(out, "- Date: {}", slot(slots, Slot::Date));
    out
}

fn route_section(
    out: &mut String,
    task: TaskKind,
    slots: &SlotMap,
    option: &str,
    knowledge: &KnowledgeBase,
    (services_label, options_label): (&str, &str),
) {
    let from = slot(slots, Slot::FromCity);
    let to = slot(slots, Slot::ToCity);

    let Some(route) = knowledge.route(task, from, to) else {
        let _ = writeln!(
            out,
            "\nI don't have route details for {from} to {to} yet. Check {} for {}s on this route.",
            knowledge.platform(task).website,
            task.mode()
        );
        return;
    };

    out.push_str("\nRoute information:\n");
    let _ = writeln!(out, "- Distance: {} km", route.distance_km);
    let _ = writeln!(out, "- Duration: {}", route.duration);
    write_list(out, services_label, &route.services);
    write_list(out, options_label, &route.options);
    if let Some(fare) = knowledge.fare_estimate(task, route, option) {
        let _ = writeln!(
            out,
            "- Estimated fare: about Rs {fare} in {option} (approximate, actual fares vary)"
        );
    }
    if !offers(route, option) {
        let _ = writeln!(out, "- Note: {option} is not usually offered on this route");
    }
}

fn offers(route: &RouteInfo, option: &str) -> bool {
    route.options.is_empty()
        || route
            .options
            .iter()
            .any(|offered| offered.eq_ignore_ascii_case(option))
}

fn write_list(out: &mut String, label: &str, items: &[String]) {
    if !items.is_empty() {
        let _ = writeln!(out, "- {label}: {}", items.join(", "));
    }
}

fn platform_section(out: &mut String, task: TaskKind, knowledge: &KnowledgeBase) {
    let platform = knowledge.platform(task);

    if !platform.steps.is_empty() {
        let _ = writeln!(out, "\nHow to book on {}:", platform.name);
        for (idx, step) in platform.steps.iter().enumerate() {
            let _ = writeln!(out, "{}. {step}", idx + 1);
        }
    }
    if !platform.tips.is_empty() {
        out.push_str("\nTips:\n");
        for tip in &platform.tips {
            let _ = writeln!(out, "- {tip}");
        }
    }
    let _ = writeln!(out, "\nWebsite: {}", platform.website);
    let _ = writeln!(out, "Helpline: {}", platform.helpline);
}

fn switch_note(task: TaskKind, switched_from: Option<TaskKind>) -> String {
    match switched_from {
        Some(previous) => format!(
            "Switching from your {} to a {}. The {} details so far have been cleared.\n",
            previous.label(),
            task.label(),
            previous.mode()
        ),
        None => String::new(),
    }
}

fn progress(filled: &SlotMap) -> String {
    filled
        .iter()
        .map(|(slot, value)| match slot {
            Slot::FromCity => format!("from {value}"),
            Slot::ToCity => format!("to {value}"),
            Slot::Date => format!("on {value}"),
            Slot::Class => format!("class {value}"),
            Slot::BusType => format!("{value} bus"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn menu(returning: bool, not_understood: bool) -> String {
    let opening = match (returning, not_understood) {
        (_, true) => "I didn't quite understand that. I can help you with:",
        (true, false) => "Welcome back! I can help you with:",
        (false, false) => "Hi! I'm your travel booking assistant. I can help you with:",
    };

    format!(
        "{opening}\n\n\
         - Train tickets (IRCTC): \"Book train from Delhi to Mumbai\"\n\
         - Bus tickets (Redbus): \"Book bus from Bangalore to Chennai\"\n\
         - Help: \"help\", \"help train\" or \"help bus\"\n\n\
         What would you like to do?"
    )
}

fn help(topic: Option<TaskKind>, knowledge: &KnowledgeBase) -> String {
    match topic {
        None => "I can help you put together train and bus booking requests.\n\n\
                 Tell me your plans in one go, like:\n\
                 - \"Book train from Delhi to Mumbai tomorrow in 2AC\"\n\
                 - \"Need bus from Bangalore to Chennai, AC sleeper\"\n\
                 or step by step and I'll ask for what's missing.\n\n\
                 Commands:\n\
                 - \"reset\" to start over\n\
                 - \"stats\" to see your session\n\
                 - \"help train\" or \"help bus\" for details\n\
                 - \"help\" with \"booking process\", \"classes\", \"tatkal\", \"overnight\" or \"long distance\""
            .to_string(),
        Some(task) => {
            let platform = knowledge.platform(task);
            let (needs, options) = match task {
                TaskKind::TrainBooking => (
                    "origin, destination, travel date and class",
                    knowledge
                        .train_classes
                        .iter()
                        .map(|class| format!("{} ({})", class.code, class.name))
                        .collect::<Vec<_>>(),
                ),
                TaskKind::BusBooking => (
                    "origin, destination, travel date and bus type",
                    knowledge
                        .bus_types
                        .iter()
                        .map(|bus_type| bus_type.name.clone())
                        .collect::<Vec<_>>(),
                ),
            };

            let mut out = format!(
                "{} help ({})\n\nFor a {} I need your {needs}.\n",
                capitalize(task.mode()),
                platform.name,
                task.label()
            );
            if !options.is_empty() {
                let _ = writeln!(out, "Options: {}", options.join(", "));
            }
            let _ = writeln!(
                out,
                "Example: \"Book {} from Delhi to Mumbai next Friday\"",
                task.mode()
            );
            let more = match task {
                TaskKind::TrainBooking => "\"booking process\", \"classes\", \"tatkal\" or \"premium tatkal\"",
                TaskKind::BusBooking => "\"booking process\", \"bus types\", \"overnight\" or \"long distance\"",
            };
            let _ = writeln!(out, "More: \"help\" with {more}");
            let _ = write!(out, "Website: {} | Helpline: {}", platform.website, platform.helpline);
            out
        }
    }
}

/// Help for one subject. Subjects that fit either mode default to trains.
fn subject_help(
    subject: HelpSubject,
    topic: Option<TaskKind>,
    knowledge: &KnowledgeBase,
) -> String {
    let task = subject.task().or(topic).unwrap_or(TaskKind::TrainBooking);
    let mut out = String::new();

    match subject {
        HelpSubject::Booking => {
            let _ = writeln!(out, "{} booking process", capitalize(task.mode()));
            platform_section(&mut out, task, knowledge);
            return out.trim_end().to_string();
        }
        HelpSubject::Classes => match task {
            TaskKind::TrainBooking => {
                out.push_str("Train classes:\n");
                for class in &knowledge.train_classes {
                    let _ = writeln!(
                        out,
                        "- {} ({}): {}. {}",
                        class.code,
                        class.name,
                        class.description,
                        class.amenities.join(", ")
                    );
                }
            }
            TaskKind::BusBooking => {
                out.push_str("Bus types:\n");
                for bus_type in &knowledge.bus_types {
                    let _ = writeln!(
                        out,
                        "- {}: {}. Best for {}",
                        bus_type.name,
                        bus_type.description,
                        bus_type.best_for.to_lowercase()
                    );
                }
            }
        },
        HelpSubject::Tatkal
        | HelpSubject::PremiumTatkal
        | HelpSubject::Overnight
        | HelpSubject::LongDistance => {
            let title = match subject {
                HelpSubject::Tatkal => "Tatkal booking tips",
                HelpSubject::PremiumTatkal => "Premium Tatkal tips",
                HelpSubject::Overnight => "Overnight bus tips",
                _ => "Long-distance bus tips",
            };
            let _ = writeln!(out, "{title}:");
            for tip in knowledge.tips(subject) {
                let _ = writeln!(out, "- {tip}");
            }
        }
    }

    let platform = knowledge.platform(task);
    let _ = write!(out, "\nWebsite: {} | Helpline: {}", platform.website, platform.helpline);
    out
}

fn stats_text(stats: &UserStats) -> String {
    let mut out = String::from("Your session:\n");
    let _ = writeln!(out, "- Messages: {}", stats.turn_count);
    let _ = writeln!(
        out,
        "- First message: {}",
        stats.first_seen.format("%Y-%m-%d %H:%M UTC")
    );

    match (stats.active_task, stats.pending_slot) {
        (Some(task), Some(slot)) => {
            let _ = writeln!(
                out,
                "- Current task: {} (waiting for {})",
                task.label(),
                slot_label(slot)
            );
        }
        (Some(task), None) => {
            let _ = writeln!(out, "- Current task: {}", task.label());
        }
        (None, _) => out.push_str("- Current task: none\n"),
    }

    match &stats.last_booking {
        Some(booking) => {
            let _ = write!(
                out,
                "- Last booking: {} from {} to {} on {}",
                booking.task.mode(),
                booking.from_city.as_deref().unwrap_or("-"),
                booking.to_city.as_deref().unwrap_or("-"),
                booking.date.as_deref().unwrap_or("-")
            );
        }
        None => out.push_str("- Last booking: none"),
    }
    out
}

fn slot_label(slot: Slot) -> &'static str {
    match slot {
        Slot::FromCity => "origin city",
        Slot::ToCity => "destination city",
        Slot::Date => "travel date",
        Slot::Class => "class",
        Slot::BusType => "bus type",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
