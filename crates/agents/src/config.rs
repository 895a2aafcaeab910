use std::env;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

const IST_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub context_ttl: Duration,
    pub history_cap: usize,
    pub max_input_chars: usize,
    pub max_reply_chars: usize,
    /// Offset used to decide what "today" means for relative dates.
    pub utc_offset: FixedOffset,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            context_ttl: Duration::minutes(30),
            history_cap: 10,
            max_input_chars: 1_000,
            max_reply_chars: 1_600,
            utc_offset: FixedOffset::east_opt(IST_OFFSET_MINUTES * 60).unwrap_or(Utc.fix()),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            context_ttl: ttl_or(
                env_or("YATRA_CONTEXT_TTL_SECONDS", defaults.context_ttl.num_seconds()),
                defaults.context_ttl,
            ),
            history_cap: env_or("YATRA_HISTORY_CAP", defaults.history_cap).max(1),
            max_input_chars: env_or("YATRA_MAX_INPUT_CHARS", defaults.max_input_chars).max(1),
            max_reply_chars: env_or("YATRA_MAX_REPLY_CHARS", defaults.max_reply_chars).max(1),
            utc_offset: offset_or(
                env_or("YATRA_UTC_OFFSET_MINUTES", IST_OFFSET_MINUTES),
                defaults.utc_offset,
            ),
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.utc_offset).date_naive()
    }
}

/// Out-of-range offsets (beyond a day, or overflowing in seconds) fall back to `default`.
fn offset_or(minutes: i32, default: FixedOffset) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or(default)
}

fn ttl_or(seconds: i64, default: Duration) -> Duration {
    match Duration::try_seconds(seconds) {
        Some(ttl) if ttl > Duration::zero() => ttl,
        _ => default,
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn today_follows_the_configured_offset() {
        let config = AssistantConfig::default();
        // 20:00 UTC is already the next day in India.
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 20, 0, 0).unwrap();
        assert_eq!(config.today(now), NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AssistantConfig::default();
        assert_eq!(config.context_ttl, Duration::seconds(1800));
        assert_eq!(config.history_cap, 10);
        assert_eq!(config.max_reply_chars, 1600);
    }

    #[test]
    fn extreme_offsets_fall_back_to_default() {
        let default = AssistantConfig::default().utc_offset;
        assert_eq!(offset_or(i32::MAX, default), default);
        assert_eq!(offset_or(i32::MIN, default), default);
        assert_eq!(offset_or(24 * 60, default), default);
        assert_eq!(offset_or(-300, default).local_minus_utc(), -300 * 60);
    }

    #[test]
    fn extreme_ttls_fall_back_to_default() {
        let default = Duration::minutes(30);
        assert_eq!(ttl_or(i64::MAX, default), default);
        assert_eq!(ttl_or(i64::MIN, default), default);
        assert_eq!(ttl_or(0, default), default);
        assert_eq!(ttl_or(90, default), Duration::seconds(90));
    }
}
