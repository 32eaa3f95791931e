//! `where`-clause predicates.
//!
//! A predicate is a boolean expression over document fields:
//!
//! ```text
//! name = "Alice" and age > 30
//! masterData(current(name(en = "Shirt")))
//! lineItems(quantity >= 2) or not (state in ("Open", "Ordered"))
//! sku is defined and tags contains any ("sale", :extraTag)
//! ```
//!
//! `IDENT(expr)` evaluates `expr` against the sub-object named by `IDENT`
//! (or against each element when it is an array). Scalar comparisons
//! against an array-valued field match if any element matches.
//!
//! Compilation is separated from evaluation: [`Predicate::compile`] runs
//! once and produces a reusable, thread-safe matcher.

use crate::error::{Error, Result};
use crate::lexer::{self, Lexicon, Token, TokenRule};
use crate::pratt::{Cursor, Grammar};
use crate::value::{compare_loose, is_truthy, loose_eq};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Named values bound to `:name` placeholders at evaluation time.
pub type Variables = HashMap<String, Value>;

type Matcher = Arc<dyn Fn(&Value, &Variables) -> Result<bool> + Send + Sync>;

const BP_OR: u8 = 5;
const BP_AND: u8 = 6;
const BP_NOT: u8 = 7;
const BP_COMPARE: u8 = 10;
const BP_DESCEND: u8 = 20;
const BP_OPERAND: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Whitespace,
    Str,
    Number,
    Variable,
    And,
    Or,
    Not,
    In,
    Is,
    Defined,
    Empty,
    Contains,
    Any,
    All,
    True,
    False,
    Identifier,
    NotEq,
    Gte,
    Lte,
    Eq,
    Gt,
    Lt,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
enum Operand {
    Value(Value),
    Variable(String),
}

impl Operand {
    fn resolve<'a>(&'a self, vars: &'a Variables) -> Result<&'a Value> {
        match self {
            Operand::Value(value) => Ok(value),
            Operand::Variable(name) => vars
                .get(name)
                .ok_or_else(|| Error::InvalidInput(format!("missing value for parameter :{name}"))),
        }
    }

    /// Resolve a list of operands, splicing in array-valued variables.
    fn resolve_list(list: &[Operand], vars: &Variables) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(list.len());
        for operand in list {
            match (operand, operand.resolve(vars)?) {
                (Operand::Variable(_), Value::Array(items)) => values.extend(items.iter().cloned()),
                (_, value) => values.push(value.clone()),
            }
        }
        Ok(values)
    }
}

enum Node {
    Field(String),
    Operand(Operand),
    Test(Matcher),
}

impl Node {
    fn into_field(self, fragment: &str) -> Result<String> {
        match self {
            Node::Field(name) => Ok(name),
            _ => Err(Error::syntax("expected a field name", fragment)),
        }
    }

    fn into_operand(self, fragment: &str) -> Result<Operand> {
        match self {
            Node::Operand(operand) => Ok(operand),
            _ => Err(Error::syntax("expected a literal or parameter", fragment)),
        }
    }

    fn into_test(self, fragment: &str) -> Result<Matcher> {
        match self {
            Node::Test(matcher) => Ok(matcher),
            _ => Err(Error::syntax("expected a predicate", fragment)),
        }
    }
}

type WhereGrammar = Grammar<Kind, Node>;

fn grammar() -> &'static WhereGrammar {
    static GRAMMAR: OnceLock<WhereGrammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let lexicon = Lexicon::new(vec![
            TokenRule::skip(Kind::Whitespace, r"\s+"),
            TokenRule::new(Kind::Str, r#""(?:[^"\\]|\\.)*""#),
            TokenRule::new(Kind::Str, r"'(?:[^'\\]|\\.)*'"),
            TokenRule::new(Kind::Number, r"-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?"),
            TokenRule::new(Kind::Variable, r":[A-Za-z_][A-Za-z0-9_]*"),
            TokenRule::new(Kind::And, r"(?i)and\b"),
            TokenRule::new(Kind::Or, r"(?i)or\b"),
            TokenRule::new(Kind::Not, r"(?i)not\b"),
            TokenRule::new(Kind::In, r"(?i)in\b"),
            TokenRule::new(Kind::Is, r"(?i)is\b"),
            TokenRule::new(Kind::Defined, r"(?i)defined\b"),
            TokenRule::new(Kind::Empty, r"(?i)empty\b"),
            TokenRule::new(Kind::Contains, r"(?i)contains\b"),
            TokenRule::new(Kind::Any, r"(?i)any\b"),
            TokenRule::new(Kind::All, r"(?i)all\b"),
            TokenRule::new(Kind::True, r"true\b"),
            TokenRule::new(Kind::False, r"false\b"),
            TokenRule::new(Kind::Identifier, r"[A-Za-z_][A-Za-z0-9_]*"),
            TokenRule::new(Kind::NotEq, r"!=|<>"),
            TokenRule::new(Kind::Gte, r">="),
            TokenRule::new(Kind::Lte, r"<="),
            TokenRule::new(Kind::Eq, r"="),
            TokenRule::new(Kind::Gt, r">"),
            TokenRule::new(Kind::Lt, r"<"),
            TokenRule::new(Kind::LParen, r"\("),
            TokenRule::new(Kind::RParen, r"\)"),
            TokenRule::new(Kind::Comma, r","),
        ]);

        Grammar::new(lexicon)
            .prefix(Kind::Identifier, |_, _, token| Ok(Node::Field(token.text)))
            .prefix(Kind::Str, |_, _, token| {
                Ok(Node::Operand(Operand::Value(Value::String(lexer::unquote(
                    &token.text,
                )))))
            })
            .prefix(Kind::Number, |_, _, token| {
                Ok(Node::Operand(Operand::Value(lexer::number(&token.text)?)))
            })
            .prefix(Kind::True, |_, _, _| {
                Ok(Node::Operand(Operand::Value(Value::Bool(true))))
            })
            .prefix(Kind::False, |_, _, _| {
                Ok(Node::Operand(Operand::Value(Value::Bool(false))))
            })
            .prefix(Kind::Variable, |_, _, token| {
                Ok(Node::Operand(Operand::Variable(token.text[1..].to_string())))
            })
            .prefix(Kind::LParen, parse_group)
            .prefix(Kind::Not, parse_negation)
            .infix(Kind::And, BP_AND, parse_logical)
            .infix(Kind::Or, BP_OR, parse_logical)
            .infix(Kind::Eq, BP_COMPARE, parse_comparison)
            .infix(Kind::NotEq, BP_COMPARE, parse_comparison)
            .infix(Kind::Gt, BP_COMPARE, parse_comparison)
            .infix(Kind::Lt, BP_COMPARE, parse_comparison)
            .infix(Kind::Gte, BP_COMPARE, parse_comparison)
            .infix(Kind::Lte, BP_COMPARE, parse_comparison)
            .infix(Kind::In, BP_COMPARE, parse_membership)
            .infix(Kind::Not, BP_COMPARE, parse_membership)
            .infix(Kind::Is, BP_COMPARE, parse_is)
            .infix(Kind::Contains, BP_COMPARE, parse_contains)
            .infix(Kind::LParen, BP_DESCEND, parse_descend)
    })
}

fn parse_group(g: &WhereGrammar, cursor: &mut Cursor<Kind>, token: Token<Kind>) -> Result<Node> {
    let inner = g.parse(cursor, 0)?.into_test(&token.text)?;
    cursor.expect(Kind::RParen)?;
    Ok(Node::Test(inner))
}

fn parse_negation(
    g: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    token: Token<Kind>,
) -> Result<Node> {
    let inner = g.parse(cursor, BP_NOT)?.into_test(&token.text)?;
    Ok(Node::Test(matcher(move |doc, vars| Ok(!inner(doc, vars)?))))
}

fn parse_logical(
    g: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    bp: u8,
) -> Result<Node> {
    let left = left.into_test(&token.text)?;
    let right = g.parse(cursor, bp - 1)?.into_test(&token.text)?;
    let test: Matcher = if token.kind == Kind::And {
        matcher(move |doc, vars| Ok(left(doc, vars)? && right(doc, vars)?))
    } else {
        matcher(move |doc, vars| Ok(left(doc, vars)? || right(doc, vars)?))
    };
    Ok(Node::Test(test))
}

fn parse_comparison(
    g: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    bp: u8,
) -> Result<Node> {
    let field = left.into_field(&token.text)?;
    let operand = g.parse(cursor, bp)?.into_operand(&token.text)?;
    let kind = token.kind;

    let test = matcher(move |doc, vars| {
        let expected = operand.resolve(vars)?;
        let actual = doc.get(&field);
        let matched = match kind {
            Kind::Eq => any_element(actual, |v| loose_eq(v, expected)),
            Kind::NotEq => !any_element(actual, |v| loose_eq(v, expected)),
            _ => any_element(actual, |v| {
                let Some(ordering) = v.and_then(|v| compare_loose(v, expected)) else {
                    return false;
                };
                match kind {
                    Kind::Gt => ordering == Ordering::Greater,
                    Kind::Lt => ordering == Ordering::Less,
                    Kind::Gte => ordering != Ordering::Less,
                    Kind::Lte => ordering != Ordering::Greater,
                    _ => false,
                }
            }),
        };
        Ok(matched)
    });
    Ok(Node::Test(test))
}

fn parse_membership(
    g: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    _: u8,
) -> Result<Node> {
    let field = left.into_field(&token.text)?;
    let negated = token.kind == Kind::Not;
    if negated {
        cursor.expect(Kind::In)?;
    }
    let list = parse_operand_list(g, cursor)?;

    Ok(Node::Test(matcher(move |doc, vars| {
        let candidates = Operand::resolve_list(&list, vars)?;
        let found = any_element(doc.get(&field), |v| {
            candidates.iter().any(|candidate| loose_eq(v, candidate))
        });
        Ok(found != negated)
    })))
}

fn parse_is(
    _: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    _: u8,
) -> Result<Node> {
    let field = left.into_field(&token.text)?;
    let negated = cursor.advance_if(Kind::Not).is_some();
    let check = cursor
        .advance()
        .ok_or_else(|| Error::syntax("expected 'defined' or 'empty'", token.text.clone()))?;

    let test: Matcher = match check.kind {
        Kind::Defined => matcher(move |doc, _| {
            let defined = !matches!(doc.get(&field), None | Some(Value::Null));
            Ok(defined != negated)
        }),
        Kind::Empty => matcher(move |doc, _| {
            Ok(match doc.get(&field) {
                None | Some(Value::Null) => false,
                Some(value) => is_empty(value) != negated,
            })
        }),
        _ => {
            return Err(Error::syntax(
                "expected 'defined' or 'empty'",
                check.text,
            ))
        }
    };
    Ok(Node::Test(test))
}

fn parse_contains(
    g: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    _: u8,
) -> Result<Node> {
    let field = left.into_field(&token.text)?;
    let require_all = match cursor.advance() {
        Some(t) if t.kind == Kind::All => true,
        Some(t) if t.kind == Kind::Any => false,
        Some(t) => return Err(Error::syntax("expected 'any' or 'all'", t.text)),
        None => return Err(Error::syntax("expected 'any' or 'all'", token.text)),
    };
    let list = parse_operand_list(g, cursor)?;

    Ok(Node::Test(matcher(move |doc, vars| {
        let wanted = Operand::resolve_list(&list, vars)?;
        let Some(Value::Array(items)) = doc.get(&field) else {
            return Ok(false);
        };
        let contains = |w: &Value| items.iter().any(|item| loose_eq(Some(item), w));
        Ok(if require_all {
            wanted.iter().all(contains)
        } else {
            wanted.iter().any(contains)
        })
    })))
}

fn parse_descend(
    g: &WhereGrammar,
    cursor: &mut Cursor<Kind>,
    left: Node,
    token: Token<Kind>,
    _: u8,
) -> Result<Node> {
    let field = left.into_field(&token.text)?;
    let inner = g.parse(cursor, 0)?.into_test(&token.text)?;
    cursor.expect(Kind::RParen)?;

    Ok(Node::Test(matcher(move |doc, vars| {
        let child = doc.get(&field);
        if !is_truthy(child) {
            return Ok(false);
        }
        match child {
            Some(Value::Array(items)) => {
                for item in items {
                    if inner(item, vars)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some(child) => inner(child, vars),
            None => Ok(false),
        }
    })))
}

/// `( operand [, operand]* )`, or a single bare `:variable`.
fn parse_operand_list(g: &WhereGrammar, cursor: &mut Cursor<Kind>) -> Result<Vec<Operand>> {
    if let Some(token) = cursor.advance_if(Kind::Variable) {
        return Ok(vec![Operand::Variable(token.text[1..].to_string())]);
    }
    let open = cursor.expect(Kind::LParen)?;
    let mut list = Vec::new();
    loop {
        list.push(g.parse(cursor, BP_OPERAND)?.into_operand(&open.text)?);
        if cursor.advance_if(Kind::Comma).is_none() {
            break;
        }
    }
    cursor.expect(Kind::RParen)?;
    Ok(list)
}

fn matcher<F>(f: F) -> Matcher
where
    F: Fn(&Value, &Variables) -> Result<bool> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn any_element(value: Option<&Value>, mut test: impl FnMut(Option<&Value>) -> bool) -> bool {
    match value {
        Some(Value::Array(items)) => items.iter().any(|item| test(Some(item))),
        other => test(other),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A compiled `where` predicate.
#[derive(Clone)]
pub struct Predicate {
    source: Arc<str>,
    matcher: Matcher,
}

impl Predicate {
    /// Compile a single predicate string.
    pub fn compile(source: &str) -> Result<Self> {
        let matcher = grammar()
            .parse_source(source)?
            .into_test(&lexer::fragment(source))?;
        Ok(Self {
            source: Arc::from(source),
            matcher,
        })
    }

    /// Compile several predicates that must all hold.
    pub fn compile_all<S: AsRef<str>>(sources: &[S]) -> Result<Self> {
        let compiled = sources
            .iter()
            .map(|s| Self::compile(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let source = sources
            .iter()
            .map(|s| format!("({})", s.as_ref()))
            .collect::<Vec<_>>()
            .join(" and ");

        Ok(Self {
            source: Arc::from(source.as_str()),
            matcher: matcher(move |doc, vars| {
                for predicate in &compiled {
                    if !(predicate.matcher)(doc, vars)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }),
        })
    }

    /// The source text this predicate was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a document with no bound variables.
    pub fn matches(&self, doc: &Value) -> Result<bool> {
        self.matches_with(doc, &Variables::new())
    }

    /// Evaluate against a document, resolving `:name` placeholders from `vars`.
    pub fn matches_with(&self, doc: &Value, vars: &Variables) -> Result<bool> {
        (self.matcher)(doc, vars)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str, doc: Value) -> bool {
        Predicate::compile(source).unwrap().matches(&doc).unwrap()
    }

    #[test]
    fn numeric_comparison() {
        assert!(eval("numberProperty > 1233", json!({"numberProperty": 1234})));
        assert!(!eval("numberProperty > 1233", json!({"numberProperty": 1200})));
        assert!(eval("numberProperty < 1300", json!({"numberProperty": 1234})));
        assert!(eval("n >= 5 and n <= 5", json!({"n": 5})));
    }

    #[test]
    fn loose_equality() {
        assert!(eval("version = 2", json!({"version": 2})));
        assert!(eval("version = \"2\"", json!({"version": 2})));
        assert!(eval("key = 'my-key'", json!({"key": "my-key"})));
        assert!(!eval("key = 'other'", json!({"key": "my-key"})));
        assert!(!eval("key = 'x'", json!({})));
    }

    #[test]
    fn inequality() {
        assert!(eval("key != \"a\"", json!({"key": "b"})));
        assert!(eval("key <> \"a\"", json!({"key": "b"})));
        assert!(!eval("key != \"a\"", json!({"key": "a"})));
    }

    #[test]
    fn boolean_composition() {
        let doc = json!({"a": 1, "b": 2});
        assert!(eval("a = 1 and b = 2", doc.clone()));
        assert!(!eval("a = 1 and b = 3", doc.clone()));
        assert!(eval("a = 9 or b = 2", doc.clone()));
        assert!(eval("a = 9 or a = 8 or b = 2", doc.clone()));
        assert!(eval("(a = 9 or b = 2) and a = 1", doc.clone()));
        assert!(eval("not (a = 9)", doc));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let doc = json!({"a": 1, "b": 2, "c": 3});
        assert!(eval("a = 1 or b = 9 and c = 9", doc.clone()));
        assert!(!eval("a = 9 and b = 2 or c = 9", doc));
    }

    #[test]
    fn nested_dereference() {
        let doc = json!({"masterData": {"current": {"name": {"en": "Shirt"}}}});
        assert!(eval("masterData(current(name(en = \"Shirt\")))", doc.clone()));
        assert!(!eval("masterData(staged(name(en = \"Shirt\")))", doc));
    }

    #[test]
    fn falsy_sub_object_is_false() {
        assert!(!eval("custom(type = \"x\")", json!({"custom": null})));
        assert!(!eval("custom(type = \"x\")", json!({})));
    }

    #[test]
    fn dereference_into_arrays() {
        let doc = json!({"lineItems": [{"quantity": 1}, {"quantity": 3}]});
        assert!(eval("lineItems(quantity >= 2)", doc.clone()));
        assert!(!eval("lineItems(quantity > 5)", doc));
    }

    #[test]
    fn scalar_comparison_against_array_field() {
        let doc = json!({"tags": ["a", "b"]});
        assert!(eval("tags = \"b\"", doc.clone()));
        assert!(!eval("tags = \"c\"", doc));
    }

    #[test]
    fn membership() {
        let doc = json!({"state": "Open"});
        assert!(eval("state in (\"Open\", \"Ordered\")", doc.clone()));
        assert!(!eval("state not in (\"Open\", \"Ordered\")", doc.clone()));
        assert!(eval("state not in (\"Closed\")", doc));
    }

    #[test]
    fn definedness_and_emptiness() {
        let doc = json!({"sku": "A-1", "tags": [], "nothing": null});
        assert!(eval("sku is defined", doc.clone()));
        assert!(eval("nothing is not defined", doc.clone()));
        assert!(eval("missing is not defined", doc.clone()));
        assert!(eval("tags is empty", doc.clone()));
        assert!(!eval("tags is not empty", doc));
    }

    #[test]
    fn contains_any_and_all() {
        let doc = json!({"tags": ["sale", "new"]});
        assert!(eval("tags contains any (\"sale\", \"old\")", doc.clone()));
        assert!(!eval("tags contains all (\"sale\", \"old\")", doc.clone()));
        assert!(eval("tags contains all (\"sale\", \"new\")", doc));
    }

    #[test]
    fn boolean_literals() {
        assert!(eval("published = true", json!({"published": true})));
        assert!(eval("published = false", json!({"published": false})));
    }

    #[test]
    fn variables() {
        let predicate = Predicate::compile("key = :key and id in :ids").unwrap();
        let doc = json!({"key": "k", "id": "2"});
        let mut vars = Variables::new();
        vars.insert("key".into(), json!("k"));
        vars.insert("ids".into(), json!(["1", "2"]));
        assert!(predicate.matches_with(&doc, &vars).unwrap());

        let err = predicate.matches(&doc).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn compile_once_evaluate_many() {
        let predicate = Predicate::compile("n > 2").unwrap();
        for n in 0..10 {
            let doc = json!({ "n": n });
            let fresh = Predicate::compile("n > 2").unwrap();
            assert_eq!(
                predicate.matches(&doc).unwrap(),
                fresh.matches(&doc).unwrap()
            );
        }
    }

    #[test]
    fn compile_all_is_conjunction() {
        let predicate = Predicate::compile_all(&["a = 1", "b = 2"]).unwrap();
        assert!(predicate.matches(&json!({"a": 1, "b": 2})).unwrap());
        assert!(!predicate.matches(&json!({"a": 1, "b": 3})).unwrap());
        assert_eq!(predicate.source(), "(a = 1) and (b = 2)");
    }

    #[test]
    fn escaped_strings() {
        assert!(eval(r#"name = "say \"hi\"""#, json!({"name": "say \"hi\""})));
        assert!(eval(r"name = 'it\'s'", json!({"name": "it's"})));
    }

    #[test]
    fn syntax_errors() {
        for source in ["a = ", "a = 1)", "= 1", "a = 1 and", "a $ 1", "a(b = 1", "a"] {
            let err = Predicate::compile(source).unwrap_err();
            assert!(
                matches!(err, Error::Syntax { .. }),
                "expected syntax error for {source:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn unmatched_paren_names_fragment() {
        let err = Predicate::compile("a = 1)").unwrap_err();
        assert_eq!(err, Error::syntax("unexpected token", ")"));
    }
}
