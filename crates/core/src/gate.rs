use crate::error::MalformedInput;
use crate::text::normalize_text;

/// Screens raw inbound text and returns its normalized form.
pub fn screen(raw: &str, max_chars: usize) -> Result<String, MalformedInput> {
    let normalized = normalize_text(raw);
    if normalized.is_empty() {
        return Err(MalformedInput::Empty);
    }

    let len = normalized.chars().count();
    if len > max_chars {
        return Err(MalformedInput::TooLong {
            len,
            max: max_chars,
        });
    }

    if !normalized.chars().any(char::is_alphanumeric) {
        return Err(MalformedInput::NoText);
    }

    Ok(normalized)
}

pub fn screen_sender(raw: &str) -> Result<String, MalformedInput> {
    let sender = raw.trim();
    if sender.is_empty() {
        return Err(MalformedInput::MissingSender);
    }
    Ok(sender.to_string())
}
