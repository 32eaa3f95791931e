//! Generic resource handlers: query, get, create, update, delete.

use super::{last, parse_number, values, QueryPairs};
use crate::error::{AppError, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use shelf_engine::{Document, DocumentExt, PagedQueryResponse, QueryParams, Store, Version};

/// Path segment prefix that addresses a resource by key.
pub const KEY_PREFIX: &str = "key=";

/// Prefix of query parameters that bind predicate variables.
const VARIABLE_PREFIX: &str = "var.";

/// Fields an update body may not touch.
const PROTECTED_FIELDS: [&str; 4] = ["id", "version", "createdAt", "lastModifiedAt"];

/// Map a URL resource segment to the type id documents are stored under.
pub fn type_id_for(resource: &str) -> Result<&'static str> {
    let type_id = match resource {
        "carts" => "cart",
        "cart-discounts" => "cart-discount",
        "categories" => "category",
        "channels" => "channel",
        "custom-objects" => "key-value-document",
        "customer-groups" => "customer-group",
        "customers" => "customer",
        "discount-codes" => "discount-code",
        "inventory" => "inventory-entry",
        "orders" => "order",
        "payments" => "payment",
        "product-discounts" => "product-discount",
        "product-types" => "product-type",
        "products" => "product",
        "shipping-methods" => "shipping-method",
        "shopping-lists" => "shopping-list",
        "states" => "state",
        "stores" => "store",
        "subscriptions" => "subscription",
        "tax-categories" => "tax-category",
        "types" => "type",
        "zones" => "zone",
        other => {
            return Err(AppError::NotFound(format!(
                "resource type '{other}' is not supported"
            )))
        }
    };
    Ok(type_id)
}

/// Build query parameters from a decoded query string.
///
/// `where` and `expand` may repeat. `var.<name>` binds a predicate
/// variable; a repeated variable becomes a list.
pub fn query_params(pairs: &[(String, String)]) -> Result<QueryParams> {
    let mut params = QueryParams::new();
    params.where_ = values(pairs, "where").map(str::to_string).collect();
    params.expand = values(pairs, "expand").map(str::to_string).collect();
    if let Some(offset) = last(pairs, "offset") {
        params.offset = Some(parse_number("offset", offset)?);
    }
    if let Some(limit) = last(pairs, "limit") {
        params.limit = Some(parse_number("limit", limit)?);
    }

    for (key, value) in pairs {
        let Some(name) = key.strip_prefix(VARIABLE_PREFIX) else {
            continue;
        };
        let value = Value::String(value.clone());
        match params.variables.remove(name) {
            None => {
                params.variables.insert(name.to_string(), value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                params.variables.insert(name.to_string(), Value::Array(items));
            }
            Some(previous) => {
                params
                    .variables
                    .insert(name.to_string(), Value::Array(vec![previous, value]));
            }
        }
    }
    Ok(params)
}

fn expand_clauses(pairs: &[(String, String)]) -> Vec<&str> {
    values(pairs, "expand").collect()
}

fn not_found(type_id: &str, id_or_key: &str) -> AppError {
    AppError::NotFound(format!(
        "The Resource with ID '{id_or_key}' of type '{type_id}' was not found."
    ))
}

/// Resolve a path segment (`<id>` or `key=<key>`) to a document id.
fn resolve_id(store: &Store, project: &str, type_id: &str, id_or_key: &str) -> Result<String> {
    let found = match id_or_key.strip_prefix(KEY_PREFIX) {
        Some(key) => store.get_by_key::<&str>(project, type_id, key, &[])?,
        None => store.get::<&str>(project, type_id, id_or_key, &[])?,
    };
    found
        .as_ref()
        .and_then(|doc| doc.id())
        .map(str::to_string)
        .ok_or_else(|| not_found(type_id, id_or_key))
}

/// GET /{project}/{resource}
pub fn handle_query(
    store: &Store,
    project: &str,
    resource: &str,
    pairs: &QueryPairs,
) -> Result<PagedQueryResponse> {
    let type_id = type_id_for(resource)?;
    let params = query_params(pairs)?;
    Ok(store.query(project, type_id, &params)?)
}

/// GET /{project}/{resource}/{id} and /{project}/{resource}/key={key}
pub fn handle_get(
    store: &Store,
    project: &str,
    resource: &str,
    id_or_key: &str,
    pairs: &QueryPairs,
) -> Result<Document> {
    let type_id = type_id_for(resource)?;
    let expand = expand_clauses(pairs);
    let found = match id_or_key.strip_prefix(KEY_PREFIX) {
        Some(key) => store.get_by_key(project, type_id, key, &expand)?,
        None => store.get(project, type_id, id_or_key, &expand)?,
    };
    found.ok_or_else(|| not_found(type_id, id_or_key))
}

/// POST /{project}/{resource}
pub fn handle_create(
    store: &mut Store,
    project: &str,
    resource: &str,
    draft: Value,
) -> Result<Document> {
    let type_id = type_id_for(resource)?;
    let created = store.create(project, type_id, draft, Utc::now())?;
    tracing::info!(project, type_id, id = created.id().unwrap_or_default(), "created");
    Ok(created)
}

/// Body of an update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Version the client last saw
    pub version: Version,
    /// Top-level fields to set; `null` removes a field
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// POST /{project}/{resource}/{id}
pub fn handle_update(
    store: &mut Store,
    project: &str,
    resource: &str,
    id_or_key: &str,
    request: UpdateRequest,
) -> Result<Document> {
    let type_id = type_id_for(resource)?;
    let id = resolve_id(store, project, type_id, id_or_key)?;
    let updated = store.update(project, type_id, &id, request.version, |doc| {
        let Some(target) = doc.as_object_mut() else {
            return Ok(());
        };
        for (name, value) in request.fields {
            if PROTECTED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            if value.is_null() {
                target.remove(&name);
            } else {
                target.insert(name, value);
            }
        }
        Ok(())
    })?;
    Ok(updated)
}

/// DELETE /{project}/{resource}/{id}?version=N
pub fn handle_delete(
    store: &mut Store,
    project: &str,
    resource: &str,
    id_or_key: &str,
    pairs: &QueryPairs,
) -> Result<Document> {
    let type_id = type_id_for(resource)?;
    let version = last(pairs, "version")
        .ok_or_else(|| AppError::BadRequest("Missing required parameter 'version'".into()))?;
    let version: Version = parse_number("version", version)?;

    let id = resolve_id(store, project, type_id, id_or_key)?;
    let removed = store.delete_versioned(project, type_id, &id, version)?;
    tracing::info!(project, type_id, id = %id, "deleted");
    Ok(store.expand(project, &removed, &expand_clauses(pairs))?)
}
