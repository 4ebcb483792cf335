//! Brand-safety guardrails for drafted replies.
//!
//! Two pure functions, both infallible: banned-term detection (informational,
//! it flips the stored status to draft but never blocks storage) and reply
//! length enforcement (always applied before storage).

/// Hard cap for reply length, in characters.
pub const MAX_REPLY_CHARS: usize = 220;

/// Case-insensitive substring scan of `text` against `banned`.
/// Returns every banned term that appears, in list order; empty if none.
pub fn detect_banned_terms(text: &str, banned: &[String]) -> Vec<String> {
    let low = text.to_lowercase();
    banned
        .iter()
        .filter(|b| !b.is_empty() && low.contains(&b.to_lowercase()))
        .cloned()
        .collect()
}

/// Trim leading/trailing whitespace, then truncate to at most `max_len`
/// characters. Plain character truncation; cutting mid-word is expected.
pub fn enforce_limits(reply: &str, max_len: usize) -> String {
    let trimmed = reply.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    trimmed.chars().take(max_len).collect()
}

/// `enforce_limits` with the standard reply cap.
pub fn enforce_reply_limits(reply: &str) -> String {
    enforce_limits(reply, MAX_REPLY_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banned() -> Vec<String> {
        vec!["guarantee".into(), "free forever".into(), "100%".into()]
    }

    #[test]
    fn detects_exactly_the_present_terms() {
        let hits = detect_banned_terms("We GUARANTEE a 100% refund", &banned());
        assert_eq!(hits, vec!["guarantee".to_string(), "100%".to_string()]);
    }

    #[test]
    fn empty_when_nothing_matches() {
        assert!(detect_banned_terms("Thanks for visiting!", &banned()).is_empty());
    }

    #[test]
    fn match_is_substring_not_word() {
        let hits = detect_banned_terms("guaranteed satisfaction", &banned());
        assert_eq!(hits, vec!["guarantee".to_string()]);
    }

    #[test]
    fn empty_banned_entry_never_matches() {
        let list = vec![String::new()];
        assert!(detect_banned_terms("anything", &list).is_empty());
    }

    #[test]
    fn trims_then_truncates() {
        assert_eq!(enforce_limits("  hello  ", 220), "hello");
        assert_eq!(enforce_limits("abcdef", 3), "abc");
    }

    #[test]
    fn truncation_ignores_word_boundaries() {
        // Cutting mid-word is expected behavior, not a bug.
        assert_eq!(enforce_limits("thank you", 7), "thank y");
    }

    #[test]
    fn short_input_comes_back_stripped_and_whole() {
        let long = "x".repeat(MAX_REPLY_CHARS + 40);
        assert_eq!(enforce_reply_limits(&long).chars().count(), MAX_REPLY_CHARS);
        assert_eq!(enforce_reply_limits(" ok "), "ok");
    }

    #[test]
    fn multibyte_truncation_counts_chars_not_bytes() {
        let s = "caf\u{e9}caf\u{e9}";
        assert_eq!(enforce_limits(s, 5), "caf\u{e9}c");
    }
}
