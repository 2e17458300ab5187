//! Text helpers shared by the pipeline and retrieval crates

/// Truncate to at most `max_chars` characters, cutting only at whitespace
///
/// Returns the input unchanged (trimmed) when it already fits, and `None`
/// when the first word alone exceeds the limit.
#[must_use]
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> Option<&str> {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return Some(text);
    }

    // Byte offset of the first character past the limit
    let limit = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);

    // The cut is clean if the next character is whitespace
    if text[limit..].starts_with(char::is_whitespace) {
        return Some(text[..limit].trim_end());
    }

    text[..limit]
        .rfind(char::is_whitespace)
        .map(|idx| text[..idx].trim_end())
        .filter(|s| !s.is_empty())
}

/// Truncate to at most `max_chars` characters on a char boundary
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Lowercase, collapse whitespace and strip trailing punctuation
#[must_use]
pub fn normalize_phrase(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_string()
}
