use crate::error::{LabtrackError, Result};
use regex::Regex;
use std::sync::OnceLock;

// Created names only. Identifiers are slash-joined from validated
// segments and are never matched against this pattern themselves.
const NAME_PATTERN: &str = "^[0-9a-zA-Z _-]{2,50}$";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern is valid"))
}

/// Check whether a string is usable as a project/task/subtask name.
pub fn valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// Validate a created name, rejecting with `InvalidName` on failure.
pub fn check_name(name: &str) -> Result<()> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(LabtrackError::InvalidName(format!(
            "'{name}' does not match {NAME_PATTERN}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_word_characters_spaces_and_dashes() {
        assert!(valid_name("proj1"));
        assert!(valid_name("a b"));
        assert!(valid_name("run_2024-06"));
        assert!(valid_name("AB"));
    }

    #[test]
    fn test_rejects_separators_and_specials() {
        assert!(!valid_name("a/b"));
        assert!(!valid_name("task.1"));
        assert!(!valid_name("café"));
        assert!(!valid_name("a\tb"));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(!valid_name(""));
        assert!(!valid_name("x"));
        assert!(valid_name(&"x".repeat(50)));
        assert!(!valid_name(&"x".repeat(51)));
    }

    #[test]
    fn test_check_name_error_kind() {
        let err = check_name("a/b").unwrap_err();
        assert!(matches!(err, LabtrackError::InvalidName(_)));
    }
}
