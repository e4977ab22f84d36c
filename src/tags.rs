//! Reserved tags recognised in user-provided text.

/// Marker that opts a message or a whole chat out of ingestion.
pub const TAG_NO_BOT: &str = "#nobot";

/// Check whether `text` contains the opt-out tag as a standalone token.
///
/// Tokens are whitespace-separated; `#nobots` or `x#nobot` do not match.
pub fn contains_no_bot_tag(text: &str) -> bool {
    text.split_whitespace().any(|token| token == TAG_NO_BOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_token_matches() {
        assert!(contains_no_bot_tag("#nobot"));
        assert!(contains_no_bot_tag("hello #nobot"));
        assert!(contains_no_bot_tag("line one\n#nobot\tline two"));
    }

    #[test]
    fn partial_tokens_do_not_match() {
        assert!(!contains_no_bot_tag(""));
        assert!(!contains_no_bot_tag("hello world"));
        assert!(!contains_no_bot_tag("#nobots"));
        assert!(!contains_no_bot_tag("x#nobot"));
        assert!(!contains_no_bot_tag("#NOBOT"));
    }
}
