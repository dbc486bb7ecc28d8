//! Parser Types and Constants
//!
//! Shared types and constants used by the lexer and the pipeline parser.

use std::fmt;
use thiserror::Error;

/// Input field separators: the bytes that split unquoted words.
pub const IFS: &[char] = &[' ', '\t', '\n'];

/// Bytes that terminate a word and form operator tokens.
pub const METACHARS: &[char] = &['|', '&', ';', '(', ')', '<', '>'];

pub fn is_ifs(c: char) -> bool {
    IFS.contains(&c)
}

pub fn is_metachar(c: char) -> bool {
    METACHARS.contains(&c)
}

lazy_static::lazy_static! {
    /// Shell identifier: the part of `NAME=VALUE` before the first `=`.
    static ref IDENTIFIER: regex_lite::Regex =
        regex_lite::Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// True for words of the form `NAME=...` with a valid identifier prefix.
pub fn is_assignment_word(s: &str) -> bool {
    match s.find('=') {
        Some(eq) => is_valid_name(&s[..eq]),
        None => false,
    }
}

/// A token produced by the lexer.
///
/// `text` is absent only for the end-of-input token. META marks a token
/// whose text is composed entirely of metacharacters; PRE-META marks a
/// word that was terminated by an adjacent metacharacter with no IFS in
/// between (so a following redirection operator may claim it as its fd).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: Option<String>,
    pub meta: bool,
    pub premeta: bool,
}

impl Token {
    pub fn word(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), meta: false, premeta: false }
    }

    pub fn word_premeta(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), meta: false, premeta: true }
    }

    pub fn meta(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), meta: true, premeta: false }
    }

    pub fn end() -> Self {
        Self { text: None, meta: false, premeta: false }
    }

    pub fn is_end(&self) -> bool {
        self.text.is_none()
    }
}

/// Error thrown when the lexer or parser rejects the input
#[derive(Debug, Clone, Error)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self { message: message.into(), line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("FOO"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a-b"));
    }

    #[test]
    fn test_is_assignment_word() {
        assert!(is_assignment_word("FOO=bar"));
        assert!(is_assignment_word("_a="));
        assert!(!is_assignment_word("FOO"));
        assert!(!is_assignment_word("=bar"));
        assert!(!is_assignment_word("1a=b"));
        assert!(!is_assignment_word("a.b=c"));
    }

    #[test]
    fn test_metachar_classification() {
        for c in "|&;()<>".chars() {
            assert!(is_metachar(c));
        }
        assert!(!is_metachar('a'));
        assert!(!is_metachar(' '));
    }

    #[test]
    fn test_parse_error_display() {
        let e = ParseError::new("unexpected metacharacter `;'", 3);
        assert_eq!(e.to_string(), "line 3: unexpected metacharacter `;'");
    }
}
