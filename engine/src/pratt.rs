//! Operator-precedence (Pratt) parser builder.
//!
//! A [`Grammar`] pairs a [`Lexicon`] with two rule tables keyed by token kind:
//! prefix rules (what a token means at the start of an expression) and infix
//! rules (what it means after a complete left operand, with a binding power).
//! The grammar is immutable once built; all parse state lives in the
//! [`Cursor`] threaded through the handlers.
//!
//! [`Grammar::parse`] keeps applying infix rules while the next token binds
//! tighter than the caller's threshold. Equal binding powers therefore
//! associate to the left; a handler that recurses with `bp - 1` makes its
//! operator right-associative.

use crate::error::{Error, Result};
use crate::lexer::{Lexicon, Token};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::iter::Peekable;
use std::vec::IntoIter;

/// Handler invoked when a token starts an expression.
pub type PrefixFn<K, T> = fn(&Grammar<K, T>, &mut Cursor<K>, Token<K>) -> Result<T>;

/// Handler invoked when a token follows a complete left operand.
pub type InfixFn<K, T> = fn(&Grammar<K, T>, &mut Cursor<K>, T, Token<K>, u8) -> Result<T>;

struct InfixRule<K, T> {
    binding_power: u8,
    handler: InfixFn<K, T>,
}

/// Position within a token stream.
pub struct Cursor<K> {
    tokens: Peekable<IntoIter<Token<K>>>,
}

impl<K: Copy + PartialEq + Debug> Cursor<K> {
    /// Wrap an already lexed token stream.
    pub fn new(tokens: Vec<Token<K>>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Option<&Token<K>> {
        self.tokens.peek()
    }

    /// Consume the next token.
    pub fn advance(&mut self) -> Option<Token<K>> {
        self.tokens.next()
    }

    /// Consume the next token if it is of `kind`.
    pub fn advance_if(&mut self, kind: K) -> Option<Token<K>> {
        self.tokens.next_if(|token| token.kind == kind)
    }

    /// Consume a token of `kind` or fail with a syntax error.
    pub fn expect(&mut self, kind: K) -> Result<Token<K>> {
        match self.tokens.next() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(Error::syntax(format!("expected {kind:?}"), token.text)),
            None => Err(Error::syntax(
                format!("expected {kind:?}, found end of input"),
                "",
            )),
        }
    }
}

/// Token table plus prefix/infix rule tables.
pub struct Grammar<K, T> {
    lexicon: Lexicon<K>,
    prefix: HashMap<K, PrefixFn<K, T>>,
    infix: HashMap<K, InfixRule<K, T>>,
}

impl<K, T> Grammar<K, T>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Start a grammar with no rules.
    pub fn new(lexicon: Lexicon<K>) -> Self {
        Self {
            lexicon,
            prefix: HashMap::new(),
            infix: HashMap::new(),
        }
    }

    /// Register a prefix rule.
    pub fn prefix(mut self, kind: K, handler: PrefixFn<K, T>) -> Self {
        self.prefix.insert(kind, handler);
        self
    }

    /// Register an infix rule with its binding power.
    pub fn infix(mut self, kind: K, binding_power: u8, handler: InfixFn<K, T>) -> Self {
        self.infix.insert(
            kind,
            InfixRule {
                binding_power,
                handler,
            },
        );
        self
    }

    /// Binding power of `kind` in infix position, 0 if it has no infix rule.
    pub fn binding_power(&self, kind: K) -> u8 {
        self.infix
            .get(&kind)
            .map(|rule| rule.binding_power)
            .unwrap_or(0)
    }

    /// Tokenize `source` into a fresh cursor.
    pub fn cursor(&self, source: &str) -> Result<Cursor<K>> {
        Ok(Cursor::new(self.lexicon.tokenize(source)?))
    }

    /// Parse a complete source string; trailing tokens are an error.
    pub fn parse_source(&self, source: &str) -> Result<T> {
        let mut cursor = self.cursor(source)?;
        let parsed = self.parse(&mut cursor, 0)?;
        match cursor.advance() {
            None => Ok(parsed),
            Some(token) => Err(Error::syntax("unexpected token", token.text)),
        }
    }

    /// Parse one expression whose operators bind tighter than `min_bp`.
    pub fn parse(&self, cursor: &mut Cursor<K>, min_bp: u8) -> Result<T> {
        let token = cursor
            .advance()
            .ok_or_else(|| Error::syntax("unexpected end of input", ""))?;
        let prefix = self
            .prefix
            .get(&token.kind)
            .ok_or_else(|| Error::syntax("unexpected token", token.text.clone()))?;
        let mut left = prefix(self, cursor, token)?;

        loop {
            let Some(next) = cursor.peek() else {
                break;
            };
            let Some(rule) = self.infix.get(&next.kind) else {
                break;
            };
            if rule.binding_power <= min_bp {
                break;
            }
            let handler = rule.handler;
            let binding_power = rule.binding_power;
            let token = cursor
                .advance()
                .ok_or_else(|| Error::syntax("unexpected end of input", ""))?;
            left = handler(self, cursor, left, token, binding_power)?;
        }

        Ok(left)
    }
}
