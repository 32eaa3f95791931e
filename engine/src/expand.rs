//! Reference expansion.
//!
//! An expand clause such as `lineItems[*].variant` or `category.parent`
//! names a path to one or more references. Every reference reached is
//! looked up in the store and the target attached as `obj`. Expansion works
//! on a copy and is best-effort: a missing path segment or a dangling
//! reference leaves that branch untouched, unless the store is configured
//! with strict references.

use crate::document::{deep_copy, ResourceIdentifier, EXPANDED_FIELD};
use crate::error::{Error, Result};
use crate::Store;
use serde_json::Value;
use std::str::FromStr;

/// Which array elements a clause segment addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandIndex {
    /// `[*]`
    All,
    /// `[n]`
    At(usize),
}

/// One parsed expand clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandClause {
    pub element: String,
    pub index: Option<ExpandIndex>,
    pub rest: Option<Box<ExpandClause>>,
}

impl ExpandClause {
    /// Parse a dotted clause, e.g. `a.b[2].c`.
    pub fn parse(source: &str) -> Result<Self> {
        let (head, tail) = match source.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (source, None),
        };
        let (element, index) = parse_element(head, source)?;
        let rest = match tail {
            Some(tail) => Some(Box::new(Self::parse(tail)?)),
            None => None,
        };
        Ok(Self {
            element,
            index,
            rest,
        })
    }
}

impl FromStr for ExpandClause {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_element(head: &str, source: &str) -> Result<(String, Option<ExpandIndex>)> {
    let invalid = || Error::InvalidInput(format!("invalid expand clause '{source}'"));
    if head.is_empty() {
        return Err(invalid());
    }
    let Some(open) = head.find('[') else {
        return Ok((head.to_string(), None));
    };
    let inner = head[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
    let index = match inner {
        "*" => ExpandIndex::All,
        n => ExpandIndex::At(n.parse().map_err(|_| invalid())?),
    };
    let element = &head[..open];
    if element.is_empty() {
        return Err(invalid());
    }
    Ok((element.to_string(), Some(index)))
}

/// Resolves expand clauses against the documents of one tenant.
pub struct Expander<'a> {
    store: &'a Store,
    tenant: &'a str,
    strict: bool,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a Store, tenant: &'a str) -> Self {
        Self {
            store,
            tenant,
            strict: store.config().strict_references,
        }
    }

    /// Return an expanded copy of `doc`.
    ///
    /// Clauses are applied in order to the same copy, so `a` followed by
    /// `a.b` expands both levels.
    pub fn resolve<S: AsRef<str>>(&self, doc: &Value, clauses: &[S]) -> Result<Value> {
        let mut copy = deep_copy(doc);
        for clause in clauses {
            let clause = ExpandClause::parse(clause.as_ref())?;
            self.apply(&mut copy, &clause)?;
        }
        Ok(copy)
    }

    fn apply(&self, target: &mut Value, clause: &ExpandClause) -> Result<()> {
        let Some(value) = target.get_mut(&clause.element) else {
            tracing::trace!(element = %clause.element, "expand path not present");
            return Ok(());
        };
        let rest = clause.rest.as_deref();
        match clause.index {
            None => self.expand_value(value, rest),
            Some(ExpandIndex::At(i)) => match value.get_mut(i) {
                Some(item) => self.expand_value(item, rest),
                None => Ok(()),
            },
            Some(ExpandIndex::All) => {
                if let Value::Array(items) = value {
                    for item in items {
                        self.expand_value(item, rest)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn expand_value(&self, value: &mut Value, rest: Option<&ExpandClause>) -> Result<()> {
        let Some(reference) = ResourceIdentifier::from_value(value) else {
            return match rest {
                Some(rest) => self.apply(value, rest),
                None => Ok(()),
            };
        };

        if value.get(EXPANDED_FIELD).is_none() {
            match self.store.get_by_resource_identifier(self.tenant, &reference) {
                Some(target) => {
                    if let Some(map) = value.as_object_mut() {
                        map.insert(EXPANDED_FIELD.into(), target);
                    }
                }
                None if self.strict => {
                    let identifier = reference.identifier().to_string();
                    return Err(Error::ReferenceNotFound {
                        type_id: reference.type_id,
                        identifier,
                    });
                }
                None => {
                    tracing::debug!(
                        type_id = %reference.type_id,
                        identifier = reference.identifier(),
                        "skipping dangling reference"
                    );
                    return Ok(());
                }
            }
        }

        match (rest, value.get_mut(EXPANDED_FIELD)) {
            (Some(rest), Some(target)) => self.apply(target, rest),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreConfig;
    use serde_json::json;

    #[test]
    fn parse_clauses() {
        let clause = ExpandClause::parse("a.b[2].c").unwrap();
        assert_eq!(clause.element, "a");
        assert_eq!(clause.index, None);
        let b = clause.rest.as_deref().unwrap();
        assert_eq!(b.element, "b");
        assert_eq!(b.index, Some(ExpandIndex::At(2)));
        assert_eq!(b.rest.as_deref().unwrap().element, "c");

        let all: ExpandClause = "lineItems[*].variant".parse().unwrap();
        assert_eq!(all.index, Some(ExpandIndex::All));
    }

    #[test]
    fn reject_bad_clauses() {
        for bad in ["", "a..b", "a[x]", "a[1", "[1]"] {
            let err = ExpandClause::parse(bad).unwrap_err();
            assert!(err.is_invalid_input(), "{bad} should be rejected");
        }
    }

    fn store() -> Store {
        let mut store = Store::new();
        store
            .add("t", "category", json!({"id": "c1", "version": 1, "key": "shirts",
                "parent": {"typeId": "category", "id": "c0"}}))
            .unwrap();
        store
            .add("t", "category", json!({"id": "c0", "version": 1, "key": "root"}))
            .unwrap();
        store
    }

    #[test]
    fn expand_nested_and_indexed() {
        let store = store();
        let doc = json!({
            "categories": [
                {"typeId": "category", "id": "c1"},
                {"typeId": "category", "key": "root"}
            ]
        });
        let expanded = Expander::new(&store, "t")
            .resolve(&doc, &["categories[*].parent"])
            .unwrap();
        assert_eq!(expanded["categories"][0]["obj"]["id"], "c1");
        assert_eq!(expanded["categories"][0]["obj"]["parent"]["obj"]["id"], "c0");
        // c0 has no parent, so only the first level is attached.
        assert_eq!(expanded["categories"][1]["obj"]["id"], "c0");
        assert!(doc["categories"][0].get("obj").is_none());

        let first_only = Expander::new(&store, "t")
            .resolve(&doc, &["categories[1]"])
            .unwrap();
        assert!(first_only["categories"][0].get("obj").is_none());
        assert_eq!(first_only["categories"][1]["obj"]["key"], "root");
    }

    #[test]
    fn clauses_accumulate() {
        let store = store();
        let doc = json!({"category": {"typeId": "category", "id": "c1"}});
        let expanded = Expander::new(&store, "t")
            .resolve(&doc, &["category", "category.parent"])
            .unwrap();
        assert_eq!(expanded["category"]["obj"]["parent"]["obj"]["key"], "root");
    }

    #[test]
    fn absent_path_is_noop() {
        let store = store();
        let doc = json!({"name": "x"});
        let expanded = Expander::new(&store, "t")
            .resolve(&doc, &["missing.deeper"])
            .unwrap();
        assert_eq!(expanded, doc);
    }

    #[test]
    fn dangling_reference() {
        let doc = json!({"category": {"typeId": "category", "id": "nope"}});

        let lenient = store();
        let expanded = Expander::new(&lenient, "t")
            .resolve(&doc, &["category"])
            .unwrap();
        assert_eq!(expanded, doc);

        let mut strict = Store::with_config(StoreConfig::default().with_strict_references(true));
        strict
            .add("t", "category", json!({"id": "c1", "version": 1}))
            .unwrap();
        let err = Expander::new(&strict, "t")
            .resolve(&doc, &["category"])
            .unwrap_err();
        match err {
            Error::ReferenceNotFound { type_id, identifier } => {
                assert_eq!(type_id, "category");
                assert_eq!(identifier, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tenants_are_isolated() {
        let store = store();
        let doc = json!({"category": {"typeId": "category", "id": "c1"}});
        let expanded = Expander::new(&store, "other")
            .resolve(&doc, &["category"])
            .unwrap();
        assert!(expanded["category"].get("obj").is_none());
    }
}
