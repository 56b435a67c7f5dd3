//! Text normalization and comparison for series name matching

/// Normalize a show name for matching.
/// Separators become spaces, punctuation is dropped, whitespace collapsed.
///
/// # Example
/// ```ignore
/// assert_eq!(normalize_show_name("Mr.Robot"), normalize_show_name("mr robot"));
/// ```
pub fn normalize_show_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['.', '-', '_'], " ")
        .replace(['\'', '\u{2019}', ':', ',', '!', '?', '(', ')', '[', ']'], "")
        .replace('&', "and")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized Levenshtein similarity in `0.0..=1.0` of two normalized names
pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_show_name(a), &normalize_show_name(b))
}

/// Whether `needle` occurs in `haystack` on word boundaries
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    let haystack = normalize_show_name(haystack);
    let needle = normalize_show_name(needle);
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}
