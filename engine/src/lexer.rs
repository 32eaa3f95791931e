//! Table-driven tokenizer shared by every query language.
//!
//! A [`Lexicon`] is an ordered list of [`TokenRule`]s. At each position the
//! first rule whose pattern matches a non-empty prefix of the remaining input
//! wins, so keywords must be listed before the identifier rule that would
//! otherwise swallow them.

use crate::error::{Error, Result};
use regex::Regex;

/// Maximum number of characters quoted back in a syntax error.
const FRAGMENT_LEN: usize = 24;

/// A single lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<K> {
    /// Token category
    pub kind: K,
    /// Exact source text
    pub text: String,
    /// Byte offset into the source
    pub offset: usize,
}

/// A named pattern in a [`Lexicon`].
#[derive(Debug, Clone)]
pub struct TokenRule<K> {
    kind: K,
    pattern: Regex,
    skip: bool,
}

impl<K: Copy> TokenRule<K> {
    /// A rule producing tokens of `kind`.
    pub fn new(kind: K, pattern: &str) -> Self {
        Self::build(kind, pattern, false)
    }

    /// A rule whose matches are consumed but never emitted (whitespace).
    pub fn skip(kind: K, pattern: &str) -> Self {
        Self::build(kind, pattern, true)
    }

    fn build(kind: K, pattern: &str, skip: bool) -> Self {
        let anchored = format!("^(?:{pattern})");
        Self {
            kind,
            pattern: Regex::new(&anchored).expect("invalid token pattern"),
            skip,
        }
    }

    fn match_len(&self, input: &str) -> Option<usize> {
        self.pattern
            .find(input)
            .map(|m| m.end())
            .filter(|len| *len > 0)
    }
}

/// An ordered token table.
#[derive(Debug, Clone)]
pub struct Lexicon<K> {
    rules: Vec<TokenRule<K>>,
}

impl<K: Copy> Lexicon<K> {
    /// Create a lexicon from rules in priority order.
    pub fn new(rules: Vec<TokenRule<K>>) -> Self {
        Self { rules }
    }

    /// Split `source` into tokens, dropping skipped ones.
    pub fn tokenize(&self, source: &str) -> Result<Vec<Token<K>>> {
        let mut tokens = Vec::new();
        let mut offset = 0;

        while offset < source.len() {
            let rest = &source[offset..];
            let (rule, len) = self
                .rules
                .iter()
                .find_map(|rule| rule.match_len(rest).map(|len| (rule, len)))
                .ok_or_else(|| Error::syntax("unrecognised input", fragment(rest)))?;

            if !rule.skip {
                tokens.push(Token {
                    kind: rule.kind,
                    text: rest[..len].to_string(),
                    offset,
                });
            }
            offset += len;
        }

        Ok(tokens)
    }
}

/// Leading slice of `input` suitable for an error message.
pub fn fragment(input: &str) -> String {
    input.chars().take(FRAGMENT_LEN).collect()
}

/// Strip the surrounding quotes from a string literal and resolve escapes.
///
/// A backslash escapes the following character; `\n` and `\t` keep their
/// usual meaning.
pub fn unquote(text: &str) -> String {
    let inner = if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a numeric literal into a JSON number, preferring integers.
pub fn number(text: &str) -> Result<serde_json::Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(int.into());
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .ok_or_else(|| Error::syntax("invalid number", text))
}
