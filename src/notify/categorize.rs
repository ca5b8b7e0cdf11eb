//! Notification categorization for feedwatch.
//!
//! Pure keyword classification; deterministic and side-effect-free so it is
//! independently testable.

use super::types::Category;

/// Source-name keywords that mark a financial source.
const FINANCIAL_KEYWORDS: &[&str] = &[
    "bloomberg",
    "business",
    "crypto",
    "economist",
    "finance",
    "financial",
    "market",
    "stock",
    "trading",
];

/// Source-name keywords that mark a social/timeline source.
const SOCIAL_KEYWORDS: &[&str] = &["account", "mastodon", "social", "timeline", "tweet"];

/// Source-name keywords that mark a general news source.
const NEWS_KEYWORDS: &[&str] = &[
    "bbc", "cnn", "daily", "herald", "journal", "news", "npr", "post", "press", "reuters", "times",
    "tribune", "wire",
];

/// Classify a notification into a display category.
///
/// Priority order, first match wins: Breaking (explicit flag) → Financial →
/// Social → News → Other.
pub fn classify(source_name: &str, is_breaking: bool) -> Category {
    if is_breaking {
        return Category::Breaking;
    }

    let lower = source_name.to_lowercase();

    if FINANCIAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Category::Financial;
    }
    if SOCIAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Category::Social;
    }
    if NEWS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Category::News;
    }

    Category::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaking_flag_wins() {
        // The flag outranks every keyword
        assert_eq!(classify("Financial Times", true), Category::Breaking);
        assert_eq!(classify("Anything", true), Category::Breaking);
    }

    #[test]
    fn test_financial_before_news() {
        // "Financial Times" matches both vocabularies; financial wins
        assert_eq!(classify("Financial Times", false), Category::Financial);
        assert_eq!(classify("Bloomberg Markets", false), Category::Financial);
    }

    #[test]
    fn test_social() {
        assert_eq!(classify("Some Mastodon Account", false), Category::Social);
        assert_eq!(classify("Timeline Watch", false), Category::Social);
    }

    #[test]
    fn test_news() {
        assert_eq!(classify("BBC News", false), Category::News);
        assert_eq!(classify("New York Times", false), Category::News);
        assert_eq!(classify("Reuters", false), Category::News);
    }

    #[test]
    fn test_other() {
        assert_eq!(classify("Example", false), Category::Other);
        assert_eq!(classify("", false), Category::Other);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("bbc news", false), Category::News);
        assert_eq!(classify("BBC NEWS", false), Category::News);
    }

    #[test]
    fn test_deterministic() {
        // Same input, same output, every time
        for _ in 0..3 {
            assert_eq!(classify("BBC News", false), Category::News);
            assert_eq!(classify("BBC News", true), Category::Breaking);
        }
    }
}
