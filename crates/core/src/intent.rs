use crate::models::{HelpSubject, Intent, TaskKind};
use crate::text::{contains_any, last_mention, tokenize};

const TRAIN_KEYWORDS: &[&str] = &[
    "train", "trains", "railway", "railways", "rail", "irctc", "rajdhani", "shatabdi",
];
const BUS_KEYWORDS: &[&str] = &["bus", "buses", "redbus"];

// Reset and stats are whole-message commands; these are the only extra words tolerated.
const RESET_COMMANDS: &[&str] = &["reset", "restart", "start over", "start again"];
const STATS_COMMANDS: &[&str] = &["stats", "statistics"];
const COMMAND_FILLER: &[&str] = &[
    "please", "pls", "plz", "ok", "okay", "just", "now", "the", "my", "me", "show", "all",
    "everything", "chat", "conversation", "session",
];

const HELP_PHRASES: &[&str] = &[
    "help",
    "assist",
    "assistance",
    "what can you do",
    "tips",
    "tip",
    "guide",
];
const GREETING_PHRASES: &[&str] = &[
    "hello",
    "hi",
    "hii",
    "hey",
    "namaste",
    "namaskar",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

// First match wins, so "premium tatkal" is checked before "tatkal".
const HELP_SUBJECTS: &[(HelpSubject, &[&str])] = &[
    (HelpSubject::PremiumTatkal, &["premium tatkal"]),
    (HelpSubject::Tatkal, &["tatkal"]),
    (
        HelpSubject::Overnight,
        &["overnight", "night journey", "night travel", "night bus"],
    ),
    (
        HelpSubject::LongDistance,
        &["long distance", "long journey", "long trip"],
    ),
    (
        HelpSubject::Classes,
        &["classes", "class", "class differences", "bus types"],
    ),
    (
        HelpSubject::Booking,
        &["booking process", "how to book", "booking steps", "steps", "process"],
    ),
];

/// One classification rule. Predicates see the tokenized message and must stay pure: the
/// position of a rule in [`INTENT_RULES`] is the only source of precedence.
#[derive(Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    pub matches: fn(&[String]) -> bool,
}

pub static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Reset,
        matches: |tokens| is_command(tokens, RESET_COMMANDS),
    },
    IntentRule {
        intent: Intent::Help,
        matches: |tokens| contains_any(tokens, HELP_PHRASES),
    },
    IntentRule {
        intent: Intent::Stats,
        matches: |tokens| is_command(tokens, STATS_COMMANDS),
    },
    IntentRule {
        intent: Intent::BusBooking,
        matches: |tokens| mentioned_task_in(tokens) == Some(TaskKind::BusBooking),
    },
    IntentRule {
        intent: Intent::TrainBooking,
        matches: |tokens| mentioned_task_in(tokens) == Some(TaskKind::TrainBooking),
    },
    IntentRule {
        intent: Intent::Greeting,
        matches: |tokens| contains_any(tokens, GREETING_PHRASES),
    },
];

pub fn classify(text: &str) -> Intent {
    classify_with(INTENT_RULES, text)
}

pub fn classify_with(rules: &[IntentRule], text: &str) -> Intent {
    let tokens = tokenize(text);
    rules
        .iter()
        .find(|rule| (rule.matches)(&tokens))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::Unknown)
}

/// The travel mode a message talks about. When both modes appear, the later mention wins
/// ("not the train, a bus" is about the bus).
pub fn mentioned_task(text: &str) -> Option<TaskKind> {
    mentioned_task_in(&tokenize(text))
}

/// Which part of the help a message asks for, if it names one.
pub fn help_subject(text: &str) -> Option<HelpSubject> {
    let tokens = tokenize(text);
    HELP_SUBJECTS
        .iter()
        .find(|(_, phrases)| contains_any(&tokens, phrases))
        .map(|(subject, _)| *subject)
}

/// True when the message is nothing but one of `commands`, ignoring filler words.
fn is_command(tokens: &[String], commands: &[&str]) -> bool {
    let core = tokens
        .iter()
        .map(String::as_str)
        .filter(|token| !COMMAND_FILLER.contains(token))
        .collect::<Vec<_>>()
        .join(" ");
    commands.contains(&core.as_str())
}

fn mentioned_task_in(tokens: &[String]) -> Option<TaskKind> {
    let train = last_mention(tokens, TRAIN_KEYWORDS);
    let bus = last_mention(tokens, BUS_KEYWORDS);

    match (train, bus) {
        (Some(t), Some(b)) if b > t => Some(TaskKind::BusBooking),
        (Some(_), _) => Some(TaskKind::TrainBooking),
        (None, Some(_)) => Some(TaskKind::BusBooking),
        (None, None) => None,
    }
}
