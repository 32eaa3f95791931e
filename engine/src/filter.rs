//! Catalog filter expressions (`field:value`).
//!
//! ```text
//! categories.id:"c1","c2"
//! variants.attributes.color.key:"red"
//! variants.sku:exists
//! variants.price.centAmount:range (0 TO 500), (1000 TO *)
//! ```
//!
//! A comma list of values or ranges is an OR. All entries in one list must be
//! of the same category; `"a", exists` is a syntax error. Paths beginning
//! with `variants.` are evaluated per product variant.

use crate::error::{Error, Result};
use crate::lexer::{self, Lexicon, Token, TokenRule};
use crate::pratt::{Cursor, Grammar};
use crate::value::{candidates, compare_strict, is_truthy, loose_eq, type_name};
use crate::variant::{self, first_matching, mark_matching, resolve_field};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;

const BP_CLAUSE: u8 = 1;
const BP_ITEM: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Whitespace,
    Str,
    Number,
    Exists,
    Missing,
    Range,
    To,
    Star,
    True,
    False,
    Path,
    Colon,
    Comma,
    LParen,
    RParen,
}

/// One end of a range; `None` is open (`*`).
pub type Bound = Option<Value>;

/// What a filter clause tests for.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals any of the values.
    Values(Vec<Value>),
    /// Each entry is `true` for `exists`, `false` for `missing`.
    Presence(Vec<bool>),
    /// Field lies within any of the inclusive intervals.
    Ranges(Vec<(Bound, Bound)>),
}

#[derive(Debug)]
enum Node {
    Path(String),
    Value(Value),
    Presence(bool),
    Ranges(Vec<(Bound, Bound)>),
    Clause(FilterExpression),
}

enum Category {
    Values,
    Presence,
    Ranges,
}

type FilterGrammar = Grammar<Kind, Node>;

fn grammar() -> &'static FilterGrammar {
    static GRAMMAR: OnceLock<FilterGrammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let lexicon = Lexicon::new(vec![
            TokenRule::skip(Kind::Whitespace, r"\s+"),
            TokenRule::new(Kind::Str, r#""(?:[^"\\]|\\.)*""#),
            TokenRule::new(Kind::Str, r"'(?:[^'\\]|\\.)*'"),
            TokenRule::new(Kind::Number, r"-?\d+(?:\.\d+)?"),
            TokenRule::new(Kind::Exists, r"exists\b"),
            TokenRule::new(Kind::Missing, r"missing\b"),
            TokenRule::new(Kind::Range, r"range\b"),
            TokenRule::new(Kind::To, r"TO\b"),
            TokenRule::new(Kind::True, r"true\b"),
            TokenRule::new(Kind::False, r"false\b"),
            TokenRule::new(Kind::Path, r"[A-Za-z_][A-Za-z0-9_\-]*(?:\.[A-Za-z0-9_\-]+)*"),
            TokenRule::new(Kind::Star, r"\*"),
            TokenRule::new(Kind::Colon, r":"),
            TokenRule::new(Kind::Comma, r","),
            TokenRule::new(Kind::LParen, r"\("),
            TokenRule::new(Kind::RParen, r"\)"),
        ]);

        Grammar::new(lexicon)
            .prefix(Kind::Path, |_, _, token| Ok(Node::Path(token.text)))
            .prefix(Kind::Str, |_, _, token| {
                Ok(Node::Value(Value::String(lexer::unquote(&token.text))))
            })
            .prefix(Kind::Number, |_, _, token| {
                Ok(Node::Value(lexer::number(&token.text)?))
            })
            .prefix(Kind::True, |_, _, _| Ok(Node::Value(Value::Bool(true))))
            .prefix(Kind::False, |_, _, _| Ok(Node::Value(Value::Bool(false))))
            .prefix(Kind::Exists, |_, _, _| Ok(Node::Presence(true)))
            .prefix(Kind::Missing, |_, _, _| Ok(Node::Presence(false)))
            .prefix(Kind::Range, parse_ranges)
            .infix(Kind::Colon, BP_CLAUSE, parse_clause)
    })
}

fn parse_clause(
    g: &FilterGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    _: u8,
) -> Result<Node> {
    let Node::Path(path) = left else {
        return Err(Error::syntax("expected a field path", token.text));
    };

    let mut items = vec![g.parse(cursor, BP_ITEM)?];
    while cursor.advance_if(Kind::Comma).is_some() {
        items.push(g.parse(cursor, BP_ITEM)?);
    }

    let category = match items.first() {
        Some(Node::Value(_)) => Category::Values,
        Some(Node::Presence(_)) => Category::Presence,
        Some(Node::Ranges(_)) => Category::Ranges,
        _ => return Err(Error::syntax("expected a filter value", path)),
    };

    let condition = match category {
        Category::Values => Condition::Values(collect(items, &path, |node| match node {
            Node::Value(value) => Some(value),
            _ => None,
        })?),
        Category::Presence => Condition::Presence(collect(items, &path, |node| match node {
            Node::Presence(exists) => Some(exists),
            _ => None,
        })?),
        Category::Ranges => Condition::Ranges(
            collect(items, &path, |node| match node {
                Node::Ranges(ranges) => Some(ranges),
                _ => None,
            })?
            .into_iter()
            .flatten()
            .collect(),
        ),
    };

    Ok(Node::Clause(FilterExpression { path, condition }))
}

/// Unwrap every item with `pick`, rejecting lists that mix categories.
fn collect<T>(items: Vec<Node>, path: &str, pick: fn(Node) -> Option<T>) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(|node| {
            pick(node).ok_or_else(|| {
                Error::syntax("cannot mix value, exists/missing and range expressions", path)
            })
        })
        .collect()
}

fn parse_ranges(
    _: &FilterGrammar,
    cursor: &mut Cursor<Kind>,
    _: Token<Kind>,
) -> Result<Node> {
    let mut ranges = Vec::new();
    loop {
        cursor.expect(Kind::LParen)?;
        let from = parse_bound(cursor)?;
        cursor.expect(Kind::To)?;
        let to = parse_bound(cursor)?;
        cursor.expect(Kind::RParen)?;
        ranges.push((from, to));

        // A comma followed by another tuple continues this range list.
        if cursor.peek().map(|t| t.kind) != Some(Kind::Comma) {
            break;
        }
        cursor.advance();
        if cursor.peek().map(|t| t.kind) != Some(Kind::LParen) {
            let text = cursor.peek().map(|t| t.text.clone()).unwrap_or_default();
            return Err(Error::syntax(
                "cannot mix value, exists/missing and range expressions",
                text,
            ));
        }
    }
    Ok(Node::Ranges(ranges))
}

fn parse_bound(cursor: &mut Cursor<Kind>) -> Result<Bound> {
    let token = cursor
        .advance()
        .ok_or_else(|| Error::syntax("expected a range bound", ""))?;
    match token.kind {
        Kind::Star => Ok(None),
        Kind::Number => Ok(Some(lexer::number(&token.text)?)),
        Kind::Str => Ok(Some(Value::String(lexer::unquote(&token.text)))),
        _ => Err(Error::syntax("expected a range bound", token.text)),
    }
}

/// A compiled `field:value` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    path: String,
    condition: Condition,
}

impl FilterExpression {
    /// Parse a filter clause.
    pub fn compile(source: &str) -> Result<Self> {
        match grammar().parse_source(source)? {
            Node::Clause(clause) => Ok(clause),
            _ => Err(Error::syntax(
                "expected 'field:expression'",
                lexer::fragment(source),
            )),
        }
    }

    /// The field path this clause tests.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The parsed condition.
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Whether the clause addresses product variants.
    pub fn is_variant_filter(&self) -> bool {
        variant::variant_path(&self.path).is_some()
    }

    /// Test a document without modifying it.
    pub fn matches(&self, doc: &Value) -> Result<bool> {
        match variant::variant_path(&self.path) {
            Some(path) => Ok(first_matching(doc, |v| self.test(v, path))?.is_some()),
            None => self.test(doc, &self.path),
        }
    }

    /// Test a document, optionally flagging the first matching variant.
    pub fn evaluate(&self, doc: &mut Value, mark_matching_variant: bool) -> Result<bool> {
        let Some(path) = variant::variant_path(&self.path) else {
            return self.test(doc, &self.path);
        };
        let matched = first_matching(doc, |v| self.test(v, path))?;
        if mark_matching_variant {
            mark_matching(doc, matched);
        }
        Ok(matched.is_some())
    }

    fn test(&self, target: &Value, path: &str) -> Result<bool> {
        let resolved = resolve_field(target, path);
        match &self.condition {
            Condition::Presence(checks) => {
                let present = is_truthy(resolved.as_ref());
                Ok(checks.iter().any(|exists| *exists == present))
            }
            Condition::Values(values) => {
                let Some(resolved) = resolved else {
                    return Ok(false);
                };
                let found = candidates(&resolved)
                    .any(|candidate| values.iter().any(|v| loose_eq(Some(candidate), v)));
                Ok(found)
            }
            Condition::Ranges(ranges) => {
                let Some(resolved) = resolved else {
                    return Ok(false);
                };
                for candidate in candidates(&resolved) {
                    for (from, to) in ranges {
                        if in_range(candidate, from.as_ref(), to.as_ref())? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }
}

fn in_range(value: &Value, from: Option<&Value>, to: Option<&Value>) -> Result<bool> {
    let order = |bound: &Value| {
        compare_strict(value, bound).ok_or_else(|| {
            Error::Evaluation(format!(
                "cannot compare {} with range bound of type {}",
                type_name(value),
                type_name(bound)
            ))
        })
    };
    if let Some(from) = from {
        if order(from)? == Ordering::Less {
            return Ok(false);
        }
    }
    if let Some(to) = to {
        if order(to)? == Ordering::Greater {
            return Ok(false);
        }
    }
    Ok(true)
}
