//! Keyword frequency and context snippets for occurrence rows.
//!
//! Both functions are pure: output depends only on their arguments.
//! Positions and window sizes are counted in characters, never bytes, so a
//! snippet never splits a multi-byte character.

/// Marker added where a snippet was cut from a longer text.
pub const ELLIPSIS: &str = "...";

/// Default snippet window, in characters, shared around the match.
pub const DEFAULT_CONTEXT_WINDOW: usize = 200;

/// Count non-overlapping, case-insensitive occurrences of `keyword` in `text`.
///
/// An empty keyword occurs zero times.
pub fn count_occurrences(keyword: &str, text: &str) -> usize {
    let needle = keyword.to_lowercase();
    if needle.is_empty() {
        return 0;
    }
    text.to_lowercase().matches(needle.as_str()).count()
}

/// Excerpt of `text` around the first case-insensitive occurrence of `keyword`.
///
/// Takes up to `window / 2` characters on each side of the match, trims
/// surrounding whitespace, and marks each cut side with [`ELLIPSIS`].
/// Returns an empty string when the keyword is empty or absent.
pub fn extract_context(keyword: &str, text: &str, window: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let needle: Vec<char> = keyword.chars().collect();

    let Some(pos) = find_ignore_case(&chars, &needle) else {
        return String::new();
    };

    let half = window / 2;
    let start = pos.saturating_sub(half);
    let end = (pos + needle.len() + half).min(chars.len());

    let slice: String = chars[start..end].iter().collect();
    let mut context = String::with_capacity(slice.len() + 2 * ELLIPSIS.len());
    if start > 0 {
        context.push_str(ELLIPSIS);
    }
    context.push_str(slice.trim());
    if end < chars.len() {
        context.push_str(ELLIPSIS);
    }
    context
}

/// Character index of the first case-insensitive match of `needle`.
fn find_ignore_case(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| {
        haystack[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| chars_eq_ignore_case(*h, *n))
    })
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
