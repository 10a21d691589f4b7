//! Keyword gate: a cheap filter that runs before the AI judge.

/// What an empty keyword list means. Callers choose explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyKeywordPolicy {
    /// Everything passes (background monitors: the target group is the filter).
    MatchAll,
    /// Nothing passes.
    MatchNone,
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "how", "in", "is",
    "it", "me", "my", "near", "of", "on", "or", "our", "the", "to", "we", "what", "where",
    "who", "with", "you", "your",
];

fn significant_words(keyword: &str) -> Vec<&str> {
    keyword
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w))
        .collect()
}

fn keyword_matches(text: &str, keyword: &str) -> bool {
    if text.contains(keyword) {
        return true;
    }
    let words = significant_words(keyword);
    words.len() >= 2 && words.iter().all(|w| text.contains(w))
}

/// Case-insensitive keyword match.
///
/// A keyword matches when it appears as a substring, or when it has at least
/// two significant words and every one of them appears somewhere in `text`.
#[must_use]
pub fn matches<S: AsRef<str>>(text: &str, keywords: &[S], empty: EmptyKeywordPolicy) -> bool {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return empty == EmptyKeywordPolicy::MatchAll;
    }

    let text = text.to_lowercase();
    keywords.iter().any(|k| keyword_matches(&text, k))
}
