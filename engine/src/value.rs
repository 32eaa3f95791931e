//! Comparison and path helpers over JSON values.
//!
//! The emulated platform compares values the way a dynamically typed
//! runtime would: `=` coerces between numbers, numeric strings and booleans,
//! while the search interpreter compares strictly. Both flavours live here so
//! every query language resolves fields and orders values identically.

use serde_json::Value;
use std::cmp::Ordering;

/// Truthiness of a resolved value. Absent values are never truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Numeric coercion of a scalar, mirroring the platform's loose semantics.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            if trimmed
                .chars()
                .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
            {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Loose (coercing) equality between a resolved field and a literal.
///
/// A missing field only equals `null`.
pub fn loose_eq(field: Option<&Value>, literal: &Value) -> bool {
    let Some(field) = field else {
        return literal.is_null();
    };
    match (field, literal) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(_), Value::Number(_)) => strict_eq(field, literal),
        (Value::Array(_), _) | (Value::Object(_), _) => field == literal,
        (_, Value::Array(_)) | (_, Value::Object(_)) => false,
        _ => match (to_number(field), to_number(literal)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Strict equality: no coercion between types, numbers compared by value.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering used by `<` and `>` in predicates.
///
/// Two strings compare lexicographically; anything else is coerced to a
/// number. Returns `None` when the values cannot be ordered.
pub fn compare_loose(field: &Value, literal: &Value) -> Option<Ordering> {
    match (field, literal) {
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => {
            let a = to_number(field)?;
            let b = to_number(literal)?;
            a.partial_cmp(&b)
        }
    }
}

/// Ordering used by range filters: numbers with numbers, strings with strings.
pub fn compare_strict(field: &Value, bound: &Value) -> Option<Ordering> {
    match (field, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

/// Short type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Dotted lookup that flattens arrays met along the way.
///
/// `categories.id` on `{"categories": [{"id": "a"}, {"id": "b"}]}` yields
/// `["a", "b"]`. Returns `None` when nothing along the path exists.
pub fn resolve_path(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => map.get(*head).and_then(|next| resolve_path(next, rest)),
        Value::Array(items) => {
            let mut collected = Vec::new();
            for item in items {
                match resolve_path(item, segments) {
                    Some(Value::Array(inner)) => collected.extend(inner),
                    Some(found) => collected.push(found),
                    None => {}
                }
            }
            if collected.is_empty() {
                None
            } else {
                Some(Value::Array(collected))
            }
        }
        _ => None,
    }
}

/// Iterate a value as candidates: array elements, or the value itself.
pub fn candidates(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(null))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!([]))));
        assert!(is_truthy(Some(&json!({}))));
        assert!(is_truthy(Some(&json!("0"))));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(loose_eq(Some(&json!(1234)), &json!("1234")));
        assert!(loose_eq(Some(&json!("1")), &json!(true)));
        assert!(loose_eq(Some(&json!(1)), &json!(1.0)));
        assert!(!loose_eq(Some(&json!("abc")), &json!(0)));
        assert!(!loose_eq(None, &json!("x")));
        assert!(loose_eq(None, &json!(null)));
    }

    #[test]
    fn loose_ordering() {
        assert_eq!(
            compare_loose(&json!(1234), &json!(1233)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_loose(&json!("b"), &json!("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_loose(&json!("10"), &json!(9)),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_loose(&json!("abc"), &json!(9)), None);
    }

    #[test]
    fn strict_ordering_rejects_mixed_types() {
        assert_eq!(compare_strict(&json!(5), &json!("5")), None);
        assert_eq!(compare_strict(&json!(5), &json!(5.0)), Some(Ordering::Equal));
    }

    #[test]
    fn flattening_resolution() {
        let doc = json!({"categories": [{"id": "a"}, {"id": "b"}, {"name": "c"}]});
        assert_eq!(
            resolve_path(&doc, &["categories", "id"]),
            Some(json!(["a", "b"]))
        );
        assert_eq!(resolve_path(&doc, &["missing"]), None);
    }
}
