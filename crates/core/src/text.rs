use unicode_segmentation::UnicodeSegmentation;

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_lowercase()
}

/// Splits on Unicode word boundaries, so `non-ac` becomes `non`, `ac` while `2ac` and
/// `25th` stay whole.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .unicode_words()
        .map(|word| word.to_lowercase())
        .collect()
}

/// Index of the first token window equal to `phrase`, compared word by word.
pub fn find_phrase(tokens: &[String], phrase: &str) -> Option<usize> {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return None;
    }

    tokens
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
}

pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    find_phrase(tokens, phrase).is_some()
}

pub fn contains_any(tokens: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| contains_phrase(tokens, phrase))
}

/// Last token index at which any of `phrases` starts.
pub fn last_mention(tokens: &[String], phrases: &[&str]) -> Option<usize> {
    phrases
        .iter()
        .filter_map(|phrase| {
            let needle = tokenize(phrase);
            if needle.is_empty() || needle.len() > tokens.len() {
                return None;
            }
            tokens
                .windows(needle.len())
                .rposition(|window| window == needle.as_slice())
        })
        .max()
}
