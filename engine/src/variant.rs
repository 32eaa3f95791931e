//! Product variant traversal and catalog field resolution.
//!
//! Catalog filters address fields relative to a product variant. A product
//! (projection) carries a `masterVariant` and a list of additional
//! `variants`; a `variants.*` clause matches the product when any of them
//! matches, and can flag the first matching one with `isMatchingVariant`.

use crate::error::Result;
use crate::value::resolve_path;
use serde_json::Value;

/// Prefix that makes a field path variant-relative.
pub const VARIANTS_PREFIX: &str = "variants.";

/// Flag set on variants by match marking.
pub const MATCHING_FLAG: &str = "isMatchingVariant";

/// Split off the variant prefix, if present.
pub fn variant_path(path: &str) -> Option<&str> {
    path.strip_prefix(VARIANTS_PREFIX)
}

/// All variants of a product: master first, then the others in order.
pub fn variants(product: &Value) -> Vec<&Value> {
    let mut all = Vec::new();
    if let Some(master) = product.get("masterVariant").filter(|v| v.is_object()) {
        all.push(master);
    }
    if let Some(Value::Array(others)) = product.get("variants") {
        all.extend(others.iter());
    }
    all
}

fn variants_mut(product: &mut Value) -> Vec<&mut Value> {
    let Value::Object(map) = product else {
        return Vec::new();
    };
    let mut all = Vec::new();
    // Field order in the map is not master-first, so collect separately.
    let mut master = None;
    let mut others = Vec::new();
    for (name, value) in map.iter_mut() {
        match (name.as_str(), value) {
            ("masterVariant", v) if v.is_object() => master = Some(v),
            ("variants", Value::Array(items)) => others.extend(items.iter_mut()),
            _ => {}
        }
    }
    all.extend(master);
    all.extend(others);
    all
}

/// Index of the first variant for which `test` holds.
pub fn first_matching<F>(product: &Value, mut test: F) -> Result<Option<usize>>
where
    F: FnMut(&Value) -> Result<bool>,
{
    for (index, variant) in variants(product).into_iter().enumerate() {
        if test(variant)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Flag the variant at `matched` and clear the flag on all siblings.
pub fn mark_matching(product: &mut Value, matched: Option<usize>) {
    for (index, variant) in variants_mut(product).into_iter().enumerate() {
        if let Value::Object(map) = variant {
            map.insert(MATCHING_FLAG.into(), Value::Bool(Some(index) == matched));
        }
    }
}

/// Resolve a field path relative to a variant (or any document).
///
/// Handles the catalog special cases before falling back to a dotted
/// lookup that flattens arrays:
/// - `attributes.<name>[.rest]` finds the attribute by name and resolves
///   `rest` inside its value.
/// - `price.centAmount`, `prices.currentCentAmount` and (when the variant
///   has no scoped price) `scopedPrice.value.centAmount` resolve to the
///   first price's amount.
pub fn resolve_field(target: &Value, path: &str) -> Option<Value> {
    if let Some(attribute) = path.strip_prefix("attributes.") {
        let (name, rest) = match attribute.split_once('.') {
            Some((name, rest)) => (name, Some(rest)),
            None => (attribute, None),
        };
        return resolve_attribute(target, name, rest);
    }

    match path {
        "price.centAmount" | "prices.currentCentAmount" => return first_price_amount(target),
        "scopedPrice.value.centAmount" if target.get("scopedPrice").is_none() => {
            return first_price_amount(target)
        }
        _ => {}
    }

    let segments: Vec<&str> = path.split('.').collect();
    resolve_path(target, &segments)
}

fn resolve_attribute(target: &Value, name: &str, rest: Option<&str>) -> Option<Value> {
    let Value::Array(attributes) = target.get("attributes")? else {
        return None;
    };
    let value = attributes
        .iter()
        .find(|attr| attr.get("name").and_then(Value::as_str) == Some(name))?
        .get("value")?;

    match rest {
        None => Some(value.clone()),
        Some(rest) => {
            let segments: Vec<&str> = rest.split('.').collect();
            resolve_path(value, &segments)
        }
    }
}

fn first_price_amount(target: &Value) -> Option<Value> {
    target
        .get("prices")?
        .get(0)?
        .get("value")?
        .get("centAmount")
        .cloned()
}
