//! Document helpers.
//!
//! Documents are JSON objects owned by the [`Store`](crate::Store). Every
//! stored document carries `id`, `version`, `createdAt` and
//! `lastModifiedAt`; everything else is resource specific.

use crate::{error::Result, DocumentId, Error, Version};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored resource.
pub type Document = Value;

/// Field attached to an expanded reference. Never persisted.
pub const EXPANDED_FIELD: &str = "obj";

/// Format a timestamp the way the platform does (millisecond precision, UTC).
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accessors for the base properties every document carries.
pub trait DocumentExt {
    /// The document id, if present.
    fn id(&self) -> Option<&str>;
    /// The document key, if present.
    fn key(&self) -> Option<&str>;
    /// The current version, if present.
    fn version(&self) -> Option<Version>;
    /// Increment the version and refresh `lastModifiedAt`.
    ///
    /// Fails without changing the document when the version cannot be
    /// incremented.
    fn touch(&mut self, now: DateTime<Utc>) -> Result<()>;
}

impl DocumentExt for Value {
    fn id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }

    fn key(&self) -> Option<&str> {
        self.get("key").and_then(Value::as_str)
    }

    fn version(&self) -> Option<Version> {
        self.get("version").and_then(Value::as_u64)
    }

    fn touch(&mut self, now: DateTime<Utc>) -> Result<()> {
        let current = self.version().unwrap_or(0);
        let next = current.checked_add(1).ok_or_else(|| {
            Error::InvalidDocument(format!("version {current} cannot be incremented"))
        })?;
        if let Value::Object(map) = self {
            map.insert("version".into(), next.into());
            map.insert("lastModifiedAt".into(), Value::String(timestamp(now)));
        }
        Ok(())
    }
}

/// Check that a document carries an id and a positive version.
pub fn validate(doc: &Value) -> Result<(DocumentId, Version)> {
    if !doc.is_object() {
        return Err(Error::InvalidDocument("document must be an object".into()));
    }
    let id = doc
        .id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidDocument("missing id".into()))?;
    let version = doc
        .version()
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::InvalidDocument(format!("missing or invalid version on {id}")))?;
    Ok((id.to_string(), version))
}

/// Stamp base properties onto a draft.
///
/// A draft `id` is kept; otherwise a random one is assigned. Any `version`
/// or timestamps in the draft are overwritten.
pub fn from_draft(draft: Value, now: DateTime<Utc>) -> Result<Value> {
    let Value::Object(mut fields) = draft else {
        return Err(Error::InvalidInput("draft must be a JSON object".into()));
    };

    let id = match fields.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };
    let stamp = timestamp(now);

    fields.insert("id".into(), Value::String(id));
    fields.insert("version".into(), 1.into());
    fields.insert("createdAt".into(), Value::String(stamp.clone()));
    fields.insert("lastModifiedAt".into(), Value::String(stamp));
    let mut doc = Value::Object(fields);
    strip_expansions(&mut doc);
    Ok(doc)
}

/// Structural deep copy of a document.
///
/// Walks the tree explicitly so no store-owned node is ever shared with the
/// returned value.
pub fn deep_copy(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => Value::Array(items.iter().map(deep_copy).collect()),
        Value::Object(map) => {
            let mut copy = Map::with_capacity(map.len());
            for (key, item) in map {
                copy.insert(key.clone(), deep_copy(item));
            }
            Value::Object(copy)
        }
    }
}

/// Identifier of a referenced resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ResourceIdentifier {
    /// Identify by id.
    pub fn by_id(type_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            id: Some(id.into()),
            key: None,
        }
    }

    /// Identify by key.
    pub fn by_key(type_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            id: None,
            key: Some(key.into()),
        }
    }

    /// Read a reference out of a JSON value.
    ///
    /// Anything with a string `typeId` and a string `id` or `key` counts.
    pub fn from_value(value: &Value) -> Option<Self> {
        let type_id = value.get("typeId")?.as_str()?;
        let id = value.get("id").and_then(Value::as_str);
        let key = value.get("key").and_then(Value::as_str);
        if id.is_none() && key.is_none() {
            return None;
        }
        Some(Self {
            type_id: type_id.to_string(),
            id: id.map(str::to_string),
            key: key.map(str::to_string),
        })
    }

    /// The id or key, for messages.
    pub fn identifier(&self) -> &str {
        self.id
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or_default()
    }
}

/// Remove every `obj` attached to a reference-shaped object.
pub fn strip_expansions(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("typeId").is_some_and(Value::is_string) {
                map.remove(EXPANDED_FIELD);
            }
            for item in map.values_mut() {
                strip_expansions(item);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_expansions),
        _ => {}
    }
}
