use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::models::{Slot, SlotMap};
use crate::text::tokenize;

#[derive(Debug, Clone, Copy)]
pub struct City {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub static KNOWN_CITIES: &[City] = &[
    City { name: "Delhi", aliases: &["delhi", "new delhi"] },
    City { name: "Mumbai", aliases: &["mumbai", "bombay"] },
    City { name: "Bangalore", aliases: &["bangalore", "bengaluru"] },
    City { name: "Chennai", aliases: &["chennai", "madras"] },
    City { name: "Kolkata", aliases: &["kolkata", "calcutta"] },
    City { name: "Hyderabad", aliases: &["hyderabad"] },
    City { name: "Pune", aliases: &["pune", "poona"] },
    City { name: "Jaipur", aliases: &["jaipur"] },
    City { name: "Ahmedabad", aliases: &["ahmedabad"] },
    City { name: "Lucknow", aliases: &["lucknow"] },
    City { name: "Kochi", aliases: &["kochi", "cochin"] },
    City { name: "Mysore", aliases: &["mysore", "mysuru"] },
    City { name: "Coimbatore", aliases: &["coimbatore"] },
    City { name: "Varanasi", aliases: &["varanasi", "banaras", "benares"] },
    City { name: "Agra", aliases: &["agra"] },
    City { name: "Chandigarh", aliases: &["chandigarh"] },
    City { name: "Bhopal", aliases: &["bhopal"] },
    City { name: "Indore", aliases: &["indore"] },
    City { name: "Patna", aliases: &["patna"] },
    City { name: "Nagpur", aliases: &["nagpur"] },
    City { name: "Surat", aliases: &["surat"] },
    City { name: "Amritsar", aliases: &["amritsar"] },
    City { name: "Goa", aliases: &["goa", "madgaon"] },
];

const CLASS_PHRASES: &[(&str, &str)] = &[
    ("executive chair car", "EC"),
    ("first class ac", "1AC"),
    ("first ac", "1AC"),
    ("first class", "1AC"),
    ("1st ac", "1AC"),
    ("1 ac", "1AC"),
    ("1ac", "1AC"),
    ("1a", "1AC"),
    ("second ac", "2AC"),
    ("2nd ac", "2AC"),
    ("two tier", "2AC"),
    ("2 tier", "2AC"),
    ("2 ac", "2AC"),
    ("2ac", "2AC"),
    ("2a", "2AC"),
    ("third ac", "3AC"),
    ("3rd ac", "3AC"),
    ("three tier", "3AC"),
    ("3 tier", "3AC"),
    ("3 ac", "3AC"),
    ("3ac", "3AC"),
    ("3a", "3AC"),
    ("chair car", "CC"),
    ("cc", "CC"),
    ("ec", "EC"),
    ("sleeper class", "SL"),
    ("sleeper", "SL"),
    ("sl", "SL"),
];

const BUS_TYPE_PHRASES: &[(&str, &str)] = &[
    ("non ac sleeper", "Non-AC Sleeper"),
    ("sleeper non ac", "Non-AC Sleeper"),
    ("ac semi sleeper", "AC Semi-Sleeper"),
    ("semi sleeper", "AC Semi-Sleeper"),
    ("ac sleeper", "AC Sleeper"),
    ("sleeper ac", "AC Sleeper"),
    ("volvo ac", "Volvo AC"),
    ("volvo", "Volvo AC"),
    ("multi axle", "Multi-Axle"),
    ("non ac", "Non-AC"),
    ("nonac", "Non-AC"),
    ("air conditioned", "AC"),
    ("ac", "AC"),
];

/// "may" is left out: as a bare word it is far more often the verb. See `MAY_DATE`.
const MONTHS: &str = "january|jan|february|feb|march|mar|april|apr|june|jun|july|jul|august|aug|september|sept|sep|october|oct|november|nov|december|dec";

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex"));
// Day/month without a year reads the same as a time range or a fraction, so the year is required.
static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2}|\d{4})\b").expect("valid numeric date regex")
});
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?(?:\s+of)?\s+({MONTHS})\b(?:,?\s+(\d{{4}}))?"
    ))
    .expect("valid day-month regex")
});
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({MONTHS})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}}))?"
    ))
    .expect("valid month-day regex")
});
// May needs an ordinal suffix or an "on"/"of" cue: "on may 5", "may 5th", "5th may", "5 of may".
static MAY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b(?:(?:on|of)\s+may\s+(\d{1,2})(?:st|nd|rd|th)?",
        r"|may\s+(\d{1,2})(?:st|nd|rd|th)",
        r"|(\d{1,2})(?:st|nd|rd|th)(?:\s+of)?\s+may",
        r"|(\d{1,2})\s+of\s+may",
        r"|on\s+(\d{1,2})\s+may)\b(?:,?\s+(\d{4}))?",
    ))
    .expect("valid may date regex")
});
static DAY_AFTER_TOMORROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bday after tomorrow\b").expect("valid relative date regex"));
static TOMORROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:tomorrow|tmrw|tmr)\b").expect("valid relative date regex"));
static TODAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:today|tonight)\b").expect("valid relative date regex"));
/// Every alias as tokens, longest first so "new delhi" is tried before "delhi".
static CITY_ALIASES: Lazy<Vec<(Vec<String>, &'static str)>> = Lazy::new(|| {
    let mut aliases = KNOWN_CITIES
        .iter()
        .flat_map(|city| city.aliases.iter().map(move |alias| (tokenize(alias), city.name)))
        .collect::<Vec<_>>();
    aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    aliases
});
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:(next|this|coming|on)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid weekday regex")
});

/// Entities found in one message. `unanchored_city` holds a lone city mention that carried
/// no "from"/"to" cue; which slot it fills depends on what the dialogue is waiting for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub slots: SlotMap,
    pub unanchored_city: Option<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.unanchored_city.is_none()
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }
}

pub fn extract(text: &str, today: NaiveDate) -> Entities {
    let tokens = tokenize(text);
    let mut entities = Entities::default();

    extract_cities(&tokens, &mut entities);

    if let Some(date) = extract_date(&text.to_lowercase(), today) {
        entities
            .slots
            .insert(Slot::Date, date.format("%Y-%m-%d").to_string());
    }
    if let Some(class) = last_phrase_match(&tokens, CLASS_PHRASES) {
        entities.slots.insert(Slot::Class, class.to_string());
    }
    if let Some(bus_type) = last_phrase_match(&tokens, BUS_TYPE_PHRASES) {
        entities.slots.insert(Slot::BusType, bus_type.to_string());
    }

    entities
}

pub fn canonical_city(name: &str) -> Option<&'static str> {
    let lowered = name.trim().to_lowercase();
    KNOWN_CITIES
        .iter()
        .find(|city| city.aliases.iter().any(|alias| *alias == lowered))
        .map(|city| city.name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cue {
    From,
    To,
}

#[derive(Debug, Clone, Copy)]
struct CityMention {
    name: &'static str,
    cue: Option<Cue>,
}

fn extract_cities(tokens: &[String], entities: &mut Entities) {
    let mut mentions: Vec<CityMention> = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let hit = CITY_ALIASES.iter().find(|(alias, _)| {
            idx + alias.len() <= tokens.len() && tokens[idx..idx + alias.len()] == alias[..]
        });

        match hit {
            Some((alias, name)) => {
                let cue = match idx.checked_sub(1).map(|prev| tokens[prev].as_str()) {
                    Some("from") => Some(Cue::From),
                    Some("to") => Some(Cue::To),
                    _ => None,
                };
                if !mentions.iter().any(|mention| mention.name == *name) {
                    mentions.push(CityMention { name: *name, cue });
                }
                idx += alias.len();
            }
            None => idx += 1,
        }
    }

    match mentions.as_slice() {
        [] => {}
        [only] => match only.cue {
            Some(Cue::From) => {
                entities.slots.insert(Slot::FromCity, only.name.to_string());
            }
            Some(Cue::To) => {
                entities.slots.insert(Slot::ToCity, only.name.to_string());
            }
            None => entities.unanchored_city = Some(only.name.to_string()),
        },
        [first, second, ..] => {
            let swap = (first.cue == Some(Cue::To) && second.cue != Some(Cue::To))
                || (second.cue == Some(Cue::From) && first.cue != Some(Cue::From));
            let (from, to) = if swap { (second, first) } else { (first, second) };
            entities.slots.insert(Slot::FromCity, from.name.to_string());
            entities.slots.insert(Slot::ToCity, to.name.to_string());
        }
    }
}

/// Picks the phrase whose last occurrence ends furthest right; on a tie the phrase listed
/// first (the longer one) wins, so "non-ac sleeper" beats "ac sleeper".
fn last_phrase_match(tokens: &[String], phrases: &[(&str, &'static str)]) -> Option<&'static str> {
    let mut best: Option<(usize, &'static str)> = None;

    for (phrase, value) in phrases {
        let needle = tokenize(phrase);
        if needle.is_empty() || needle.len() > tokens.len() {
            continue;
        }
        let Some(start) = tokens
            .windows(needle.len())
            .rposition(|window| window == needle.as_slice())
        else {
            continue;
        };

        let end = start + needle.len();
        if best.map_or(true, |(best_end, _)| end > best_end) {
            best = Some((end, *value));
        }
    }

    best.map(|(_, value)| value)
}

/// Resolves the travel date. Every recognised phrase yields a candidate; the date is kept
/// only when all candidates agree. Spans already consumed by a more specific pattern are
/// blanked so "day after tomorrow" does not also count as "tomorrow".
fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let mut candidates: Vec<Option<NaiveDate>> = Vec::new();
    let mut rest = text.to_string();

    rest = consume(&ISO_DATE, &rest, |caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }, &mut candidates);

    rest = consume(&NUMERIC_DATE, &rest, |caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let year = if year < 100 { 2000 + year } else { year };
        NaiveDate::from_ymd_opt(year, month, day)
    }, &mut candidates);

    rest = consume(&DAY_MONTH, &rest, |caps| {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        with_optional_year(today, caps.get(3).map(|m| m.as_str()), month, day)
    }, &mut candidates);

    rest = consume(&MONTH_DAY, &rest, |caps| {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        with_optional_year(today, caps.get(3).map(|m| m.as_str()), month, day)
    }, &mut candidates);

    rest = consume(&MAY_DATE, &rest, |caps| {
        let day = (1..=5).find_map(|group| caps.get(group))?;
        let day: u32 = day.as_str().parse().ok()?;
        with_optional_year(today, caps.get(6).map(|m| m.as_str()), 5, day)
    }, &mut candidates);

    rest = consume(&DAY_AFTER_TOMORROW, &rest, |_| Some(today + Duration::days(2)), &mut candidates);
    rest = consume(&TOMORROW, &rest, |_| Some(today + Duration::days(1)), &mut candidates);
    rest = consume(&TODAY, &rest, |_| Some(today), &mut candidates);

    consume(&WEEKDAY, &rest, |caps| {
        let target = weekday(&caps[2])?;
        let strictly_after = caps.get(1).map(|m| m.as_str()) == Some("next");
        Some(next_weekday(today, target, strictly_after))
    }, &mut candidates);

    // An unparseable or past match poisons the result rather than being skipped.
    let mut resolved: Vec<NaiveDate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match candidate {
            Some(date) if date >= today => {
                if !resolved.contains(&date) {
                    resolved.push(date);
                }
            }
            _ => return None,
        }
    }

    match resolved.as_slice() {
        [date] => Some(*date),
        _ => None,
    }
}

fn consume<F>(
    pattern: &Regex,
    text: &str,
    mut resolve: F,
    candidates: &mut Vec<Option<NaiveDate>>,
) -> String
where
    F: FnMut(&Captures<'_>) -> Option<NaiveDate>,
{
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            candidates.push(resolve(caps));
            " ".repeat(caps[0].len())
        })
        .into_owned()
}

fn with_optional_year(today: NaiveDate, year: Option<&str>, month: u32, day: u32) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year.parse().ok()?, month, day),
        None => upcoming(today, month, day),
    }
}

/// Next occurrence of `day`/`month` on or after `today`.
fn upcoming(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

fn next_weekday(today: NaiveDate, target: Weekday, strictly_after: bool) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut ahead = (wanted - current).rem_euclid(7);
    if ahead == 0 && strictly_after {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}
