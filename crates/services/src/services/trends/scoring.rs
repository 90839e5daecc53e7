//! Trend scoring: base score plus additive keyword and category bonuses.

use utils::hash::sha256_hex;

use crate::services::config::TrendsConfig;

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dedup key: content hash of the normalized title.
pub fn title_key(title: &str) -> String {
    sha256_hex(normalize_title(title))
}

/// Whole-word (or whole-phrase) containment on normalized text.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = normalize_title(term);
    if term.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", term))
}

pub fn score(title: &str, summary: &str, category: &str, config: &TrendsConfig) -> f64 {
    let text = normalize_title(&format!("{} {}", title, summary));
    let keyword_bonus: f64 = config
        .keyword_weights
        .iter()
        .filter(|(keyword, _)| contains_term(&text, keyword))
        .map(|(_, weight)| *weight)
        .sum();
    let category_bonus = config
        .category_weights
        .get(&category.to_lowercase())
        .copied()
        .unwrap_or(0.0);
    config.base_score + keyword_bonus + category_bonus
}
