//! Filesystem-safe file names.

use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Characters that are never allowed in an exported file name.
pub const FORBIDDEN_CHARACTERS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replacement used by [`sanitize`].
pub const DEFAULT_REPLACEMENT: &str = "_";

fn forbidden_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("Invalid forbidden character pattern"))
}

/// Replaces every forbidden character in `raw` with `_`.
///
/// # Example
/// ```rust
/// use sqlscript_core::export::sanitize;
///
/// assert_eq!(sanitize("dbo.Orders"), "dbo.Orders");
/// assert_eq!(sanitize("a/b:c"), "a_b_c");
/// ```
pub fn sanitize(raw: &str) -> Cow<'_, str> {
    sanitize_with(raw, DEFAULT_REPLACEMENT)
}

/// Replaces every forbidden character in `raw` with `replacement`.
///
/// Each character is replaced by one copy of `replacement`, taken literally.
/// The result is only free of forbidden characters if `replacement` is.
pub fn sanitize_with<'a>(raw: &'a str, replacement: &str) -> Cow<'a, str> {
    forbidden_pattern().replace_all(raw, NoExpand(replacement))
}

/// Whether `value` contains any forbidden character.
pub fn contains_forbidden(value: &str) -> bool {
    value.contains(FORBIDDEN_CHARACTERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_forbidden_character_is_replaced() {
        assert_eq!(sanitize(r#"\/:*?"<>|"#), "_________");
    }

    #[test]
    fn test_clean_input_is_borrowed() {
        assert!(matches!(sanitize("dbo.Orders"), Cow::Borrowed("dbo.Orders")));
    }

    #[test]
    fn test_custom_replacement_is_literal() {
        assert_eq!(sanitize_with("a<b>", "-"), "a-b-");
        assert_eq!(sanitize_with("a|b", "$0"), "a$0b");
        assert_eq!(sanitize_with("a?b", ""), "ab");
    }

    #[test]
    fn test_pattern_matches_constant() {
        for c in FORBIDDEN_CHARACTERS {
            assert!(forbidden_pattern().is_match(&c.to_string()), "{c} not matched");
        }
        assert!(contains_forbidden("Sales\\Orders"));
        assert!(!contains_forbidden("Sales.Orders"));
    }
}
