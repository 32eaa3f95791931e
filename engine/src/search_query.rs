//! Structured search queries.
//!
//! The request body of a product search is a JSON tree:
//!
//! ```json
//! {"and": [
//!   {"exact": {"field": "variants.sku", "value": "A-1"}},
//!   {"range": {"field": "variants.prices.centAmount", "gte": 100, "lt": 500}},
//!   {"not": {"exists": {"field": "key"}}}
//! ]}
//! ```
//!
//! Each node deserializes into one [`SearchQuery`] variant; an unknown tag
//! or a malformed node is rejected up front instead of silently matching
//! nothing.

use crate::error::{Error, Result};
use crate::value::{candidates, compare_strict, strict_eq, type_name};
use crate::variant::{first_matching, mark_matching, resolve_field, variant_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A search query node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchQuery {
    And(Vec<SearchQuery>),
    Or(Vec<SearchQuery>),
    Not(Negation),
    /// Children are AND-ed; boosting is not modelled.
    Filter(Vec<SearchQuery>),
    Range(RangeExpression),
    Exact(ExactExpression),
    Exists(FieldExpression),
    FullText(TextExpression),
    FullTextPrefix(TextExpression),
    Prefix(TextExpression),
    Wildcard(TextExpression),
}

/// Operand of `not`: a single node, or a list that must all fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Negation {
    One(Box<SearchQuery>),
    Many(Vec<SearchQuery>),
}

/// Field addressing shared by all leaf nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldExpression {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeExpression {
    #[serde(flatten)]
    pub target: FieldExpression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactExpression {
    #[serde(flatten)]
    pub target: FieldExpression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default)]
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextExpression {
    #[serde(flatten)]
    pub target: FieldExpression,
    pub value: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Tracks the variant match to flag once evaluation finishes.
struct Marks {
    enabled: bool,
    last: Option<Option<usize>>,
}

impl SearchQuery {
    /// Build a query tree from its wire JSON.
    pub fn compile(json: &Value) -> Result<Self> {
        serde_json::from_value(json.clone())
            .map_err(|e| Error::InvalidInput(format!("malformed search query: {e}")))
    }

    /// Test a document without modifying it.
    pub fn matches(&self, doc: &Value) -> Result<bool> {
        let mut marks = Marks {
            enabled: false,
            last: None,
        };
        self.eval(doc, &mut marks)
    }

    /// Test a document, optionally flagging the matching variant.
    ///
    /// When several variant clauses are evaluated, the last one decides
    /// which variant carries the flag.
    pub fn evaluate(&self, doc: &mut Value, mark_matching_variant: bool) -> Result<bool> {
        let mut marks = Marks {
            enabled: mark_matching_variant,
            last: None,
        };
        let matched = self.eval(doc, &mut marks)?;
        if let Some(index) = marks.last {
            mark_matching(doc, index);
        }
        Ok(matched)
    }

    fn eval(&self, doc: &Value, marks: &mut Marks) -> Result<bool> {
        match self {
            SearchQuery::And(children) | SearchQuery::Filter(children) => {
                for child in children {
                    if !child.eval(doc, marks)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            SearchQuery::Or(children) => {
                for child in children {
                    if child.eval(doc, marks)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            SearchQuery::Not(negation) => {
                let mut inner = Marks {
                    enabled: false,
                    last: None,
                };
                let matched = match negation {
                    Negation::One(child) => child.eval(doc, &mut inner)?,
                    Negation::Many(children) => {
                        let mut any = false;
                        for child in children {
                            if child.eval(doc, &mut inner)? {
                                any = true;
                                break;
                            }
                        }
                        any
                    }
                };
                Ok(!matched)
            }
            SearchQuery::Range(expr) => {
                if expr.gte.is_none() && expr.gt.is_none() && expr.lte.is_none() && expr.lt.is_none()
                {
                    return Err(Error::InvalidInput(format!(
                        "range on '{}' has no bounds",
                        expr.target.field
                    )));
                }
                leaf(doc, &expr.target, marks, |value| {
                    any_candidate(value, |candidate| in_range(candidate, expr))
                })
            }
            SearchQuery::Exact(expr) => {
                let operands: Vec<&Value> = match (&expr.value, &expr.values) {
                    (Some(value), _) => vec![value],
                    (None, Some(values)) if !values.is_empty() => values.iter().collect(),
                    _ => {
                        return Err(Error::InvalidInput(format!(
                            "exact on '{}' needs 'value' or 'values'",
                            expr.target.field
                        )))
                    }
                };
                leaf(doc, &expr.target, marks, |value| {
                    any_candidate(value, |candidate| {
                        Ok(operands
                            .iter()
                            .any(|operand| exact_eq(candidate, operand, expr.case_insensitive)))
                    })
                })
            }
            SearchQuery::Exists(target) => leaf(doc, target, marks, |value| Ok(value.is_some())),
            SearchQuery::FullText(expr) => leaf(doc, &expr.target, marks, |value| {
                text_candidate(value, |text| text.contains(expr.value.as_str()))
            }),
            SearchQuery::FullTextPrefix(expr) => leaf(doc, &expr.target, marks, |value| {
                text_candidate(value, |text| text.starts_with(expr.value.as_str()))
            }),
            SearchQuery::Prefix(expr) => leaf(doc, &expr.target, marks, |value| {
                text_candidate(value, |text| {
                    if expr.case_insensitive {
                        text.to_lowercase().starts_with(&expr.value.to_lowercase())
                    } else {
                        text.starts_with(expr.value.as_str())
                    }
                })
            }),
            SearchQuery::Wildcard(expr) => leaf(doc, &expr.target, marks, |value| {
                text_candidate(value, |text| wildcard_match(text, &expr.value, expr.case_insensitive))
            }),
        }
    }
}

/// Resolve the leaf's field (per variant when needed) and apply `test`.
fn leaf<F>(doc: &Value, target: &FieldExpression, marks: &mut Marks, test: F) -> Result<bool>
where
    F: Fn(Option<&Value>) -> Result<bool>,
{
    match variant_path(&target.field) {
        Some(path) => {
            let matched = first_matching(doc, |variant| test(resolve(variant, path, target).as_ref()))?;
            if marks.enabled {
                marks.last = Some(matched);
            }
            Ok(matched.is_some())
        }
        None => test(resolve(doc, &target.field, target).as_ref()),
    }
}

fn resolve(doc: &Value, path: &str, target: &FieldExpression) -> Option<Value> {
    let value = resolve_field(doc, path)?;
    let value = match target.language.as_deref() {
        Some(language) => localized(&value, language)?,
        None => value,
    };
    match target.field_type.as_deref() {
        Some(kind) if kind.ends_with("enum") => enum_keys(value),
        _ => Some(value),
    }
}

/// Pick the entry of a localized value matching `language`.
///
/// The first key that equals the tag, or is a region-qualified form of it
/// in either direction, wins: `"nl"` matches `"nl-NL"` and vice versa, but
/// never `"en"`. Comparison ignores case.
pub fn localized(value: &Value, language: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map
            .iter()
            .find(|(key, _)| language_matches(key, language))
            .map(|(_, text)| text.clone()),
        Value::Array(items) => {
            let found: Vec<Value> = items
                .iter()
                .filter_map(|item| localized(item, language))
                .collect();
            (!found.is_empty()).then_some(Value::Array(found))
        }
        _ => None,
    }
}

fn language_matches(key: &str, language: &str) -> bool {
    let key = key.to_ascii_lowercase();
    let language = language.to_ascii_lowercase();
    key == language
        || key.starts_with(&format!("{language}-"))
        || language.starts_with(&format!("{key}-"))
}

fn enum_keys(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => map.get("key").cloned(),
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(enum_keys).collect(),
        )),
        other => Some(other),
    }
}

fn any_candidate<F>(value: Option<&Value>, mut test: F) -> Result<bool>
where
    F: FnMut(&Value) -> Result<bool>,
{
    let Some(value) = value else {
        return Ok(false);
    };
    for candidate in candidates(value) {
        if test(candidate)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn text_candidate<F>(value: Option<&Value>, test: F) -> Result<bool>
where
    F: Fn(&str) -> bool,
{
    any_candidate(value, |candidate| Ok(candidate.as_str().is_some_and(&test)))
}

fn exact_eq(candidate: &Value, operand: &Value, case_insensitive: bool) -> bool {
    match (candidate, operand) {
        (Value::String(a), Value::String(b)) if case_insensitive => a.to_lowercase() == b.to_lowercase(),
        _ => strict_eq(candidate, operand),
    }
}

fn in_range(value: &Value, expr: &RangeExpression) -> Result<bool> {
    let order = |bound: &Value| {
        compare_strict(value, bound).ok_or_else(|| {
            Error::Evaluation(format!(
                "cannot compare {} field '{}' with {} bound",
                type_name(value),
                expr.target.field,
                type_name(bound)
            ))
        })
    };
    let checks: [(&Option<Value>, fn(Ordering) -> bool); 4] = [
        (&expr.gte, |o| o != Ordering::Less),
        (&expr.gt, |o| o == Ordering::Greater),
        (&expr.lte, |o| o != Ordering::Greater),
        (&expr.lt, |o| o == Ordering::Less),
    ];
    for (bound, accept) in checks {
        if let Some(bound) = bound {
            if !accept(order(bound)?) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// `*`-separated segments must all occur in `text`.
fn wildcard_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    pattern
        .split('*')
        .filter(|segment| !segment.is_empty())
        .all(|segment| text.contains(segment))
}
