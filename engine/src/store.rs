//! Store - the in-memory document container.
//!
//! Documents are partitioned by tenant (project key) and type id. Every read
//! hands out a deep copy so callers can never mutate stored state through a
//! returned value; every mutation after creation goes through a version
//! check.

use crate::{
    config::StoreConfig,
    document::{self, deep_copy, strip_expansions, Document, DocumentExt, ResourceIdentifier},
    error::Result,
    expand::Expander,
    predicate::{Predicate, Variables},
    DocumentId, Error, TenantKey, TypeId, Version,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Documents of one type within one tenant.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    documents: HashMap<DocumentId, Document>,
    order: Vec<DocumentId>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a document by id.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Get a document by its `key` field. Linear scan.
    pub fn get_by_key(&self, key: &str) -> Option<&Document> {
        self.iter().find(|doc| doc.key() == Some(key))
    }

    /// Insert or replace a document.
    pub fn insert(&mut self, id: DocumentId, doc: Document) {
        if self.documents.insert(id.clone(), doc).is_none() {
            self.order.push(id);
        }
    }

    /// Remove a document.
    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let doc = self.documents.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(doc)
    }

    /// Documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.order.iter().filter_map(|id| self.documents.get(id))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedQueryResponse {
    /// Number of results on this page
    pub count: usize,
    /// Number of matching documents before paging
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub results: Vec<Document>,
}

impl PagedQueryResponse {
    /// Page an already filtered result set.
    pub fn paginate(matching: Vec<Document>, offset: usize, limit: usize) -> Self {
        let total = matching.len();
        let results: Vec<Document> = matching.into_iter().skip(offset).take(limit).collect();
        Self {
            count: results.len(),
            total,
            offset,
            limit,
            results,
        }
    }
}

/// Parameters of a collection query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    /// Predicates, AND-ed together
    #[serde(rename = "where")]
    pub where_: Vec<String>,
    /// Expand clauses applied to each result
    pub expand: Vec<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Values for `:name` placeholders in the predicates
    #[serde(skip)]
    pub variables: Variables,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `where` predicate.
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.where_.push(predicate.into());
        self
    }

    /// Add an expand clause.
    pub fn expand(mut self, clause: impl Into<String>) -> Self {
        self.expand.push(clause.into());
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Bind a predicate variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// The main store holding all documents.
#[derive(Debug, Default)]
pub struct Store {
    config: StoreConfig,
    tenants: HashMap<TenantKey, HashMap<TypeId, Collection>>,
    /// Compiled predicates by source text
    predicates: DashMap<String, Predicate>,
}

impl Store {
    /// Create an empty store with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get a collection, if anything was ever stored in it.
    pub fn collection(&self, tenant: &str, type_id: &str) -> Option<&Collection> {
        self.tenants.get(tenant)?.get(type_id)
    }

    fn collection_mut(&mut self, tenant: &str, type_id: &str) -> &mut Collection {
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .entry(type_id.to_string())
            .or_default()
    }

    /// Insert or overwrite a document by id.
    ///
    /// No version check happens here: callers that replace a document are
    /// expected to have bumped its version already. Expanded references are
    /// stripped before storing.
    pub fn add(&mut self, tenant: &str, type_id: &str, doc: Document) -> Result<Document> {
        let (id, version) = document::validate(&doc)?;
        let mut doc = deep_copy(&doc);
        strip_expansions(&mut doc);
        tracing::debug!(tenant, type_id, id = %id, version, "add document");
        self.collection_mut(tenant, type_id).insert(id, doc.clone());
        Ok(doc)
    }

    /// Create a document from a draft, stamping base properties.
    pub fn create(
        &mut self,
        tenant: &str,
        type_id: &str,
        draft: Value,
        now: DateTime<Utc>,
    ) -> Result<Document> {
        let doc = document::from_draft(draft, now)?;
        if let Some(id) = doc.id() {
            if self.collection(tenant, type_id).and_then(|c| c.get(id)).is_some() {
                return Err(Error::InvalidInput(format!(
                    "a {type_id} with id '{id}' already exists"
                )));
            }
        }
        self.add(tenant, type_id, doc)
    }

    /// Get an expanded copy of a document by id.
    pub fn get<S: AsRef<str>>(
        &self,
        tenant: &str,
        type_id: &str,
        id: &str,
        expand: &[S],
    ) -> Result<Option<Document>> {
        let found = self.collection(tenant, type_id).and_then(|c| c.get(id));
        found.map(|doc| self.expand(tenant, doc, expand)).transpose()
    }

    /// Get an expanded copy of a document by key.
    pub fn get_by_key<S: AsRef<str>>(
        &self,
        tenant: &str,
        type_id: &str,
        key: &str,
        expand: &[S],
    ) -> Result<Option<Document>> {
        let found = self
            .collection(tenant, type_id)
            .and_then(|c| c.get_by_key(key));
        found.map(|doc| self.expand(tenant, doc, expand)).transpose()
    }

    /// Look up the target of a reference.
    ///
    /// An id takes precedence over a key. Returns `None` when the
    /// identifier carries neither or nothing matches.
    pub fn get_by_resource_identifier(
        &self,
        tenant: &str,
        identifier: &ResourceIdentifier,
    ) -> Option<Document> {
        let collection = self.collection(tenant, &identifier.type_id)?;
        let found = match (&identifier.id, &identifier.key) {
            (Some(id), _) => collection.get(id),
            (None, Some(key)) => collection.get_by_key(key),
            (None, None) => None,
        };
        found.map(deep_copy)
    }

    /// Query a collection.
    ///
    /// `total` counts every match; the page is then sliced from `offset`
    /// and only the page is expanded.
    pub fn query(
        &self,
        tenant: &str,
        type_id: &str,
        params: &QueryParams,
    ) -> Result<PagedQueryResponse> {
        let predicates = params
            .where_
            .iter()
            .map(|source| self.predicate(source))
            .collect::<Result<Vec<_>>>()?;

        let mut matching = Vec::new();
        if let Some(collection) = self.collection(tenant, type_id) {
            'docs: for doc in collection.iter() {
                for predicate in &predicates {
                    if !predicate.matches_with(doc, &params.variables)? {
                        continue 'docs;
                    }
                }
                matching.push(doc);
            }
        }

        let offset = params.offset.unwrap_or(0);
        let limit = self.config.effective_limit(params.limit);
        let total = matching.len();
        let results = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|doc| self.expand(tenant, doc, &params.expand))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(tenant, type_id, total, count = results.len(), "query");
        Ok(PagedQueryResponse {
            count: results.len(),
            total,
            offset,
            limit,
            results,
        })
    }

    /// Remove a document, returning its last state.
    pub fn delete<S: AsRef<str>>(
        &mut self,
        tenant: &str,
        type_id: &str,
        id: &str,
        expand: &[S],
    ) -> Result<Option<Document>> {
        let Some(removed) = self
            .tenants
            .get_mut(tenant)
            .and_then(|types| types.get_mut(type_id))
            .and_then(|c| c.remove(id))
        else {
            return Ok(None);
        };
        tracing::debug!(tenant, type_id, id, "delete document");
        self.expand(tenant, &removed, expand).map(Some)
    }

    /// Remove a document if its version still equals `expected_version`.
    pub fn delete_versioned(
        &mut self,
        tenant: &str,
        type_id: &str,
        id: &str,
        expected_version: Version,
    ) -> Result<Document> {
        let current = self.current_version(tenant, type_id, id)?;
        if current != expected_version {
            return Err(Error::ConcurrentModification {
                expected: expected_version,
                actual: current,
            });
        }
        let removed = self.delete::<&str>(tenant, type_id, id, &[])?;
        removed.ok_or_else(|| Error::NotFound {
            type_id: type_id.to_string(),
            id: id.to_string(),
        })
    }

    /// Apply `mutate` to a copy of a document and store the result.
    ///
    /// The update is rejected unless `expected_version` equals the stored
    /// version. On success the version goes up by exactly one and
    /// `lastModifiedAt` is refreshed; `id` cannot be changed.
    pub fn update<F>(
        &mut self,
        tenant: &str,
        type_id: &str,
        id: &str,
        expected_version: Version,
        mutate: F,
    ) -> Result<Document>
    where
        F: FnOnce(&mut Document) -> Result<()>,
    {
        self.update_at(tenant, type_id, id, expected_version, Utc::now(), mutate)
    }

    /// [`Store::update`] with an explicit modification time.
    pub fn update_at<F>(
        &mut self,
        tenant: &str,
        type_id: &str,
        id: &str,
        expected_version: Version,
        now: DateTime<Utc>,
        mutate: F,
    ) -> Result<Document>
    where
        F: FnOnce(&mut Document) -> Result<()>,
    {
        let current = self.current_version(tenant, type_id, id)?;
        if current != expected_version {
            tracing::debug!(tenant, type_id, id, expected_version, current, "version conflict");
            return Err(Error::ConcurrentModification {
                expected: expected_version,
                actual: current,
            });
        }

        let mut updated = self
            .collection(tenant, type_id)
            .and_then(|c| c.get(id))
            .map(deep_copy)
            .ok_or_else(|| Error::NotFound {
                type_id: type_id.to_string(),
                id: id.to_string(),
            })?;
        mutate(&mut updated)?;

        if let Some(map) = updated.as_object_mut() {
            map.insert("id".into(), Value::String(id.to_string()));
            map.insert("version".into(), current.into());
        }
        updated.touch(now)?;
        self.add(tenant, type_id, updated)
    }

    /// Copies of every document of a type, in insertion order.
    pub fn all(&self, tenant: &str, type_id: &str) -> Vec<Document> {
        self.collection(tenant, type_id)
            .map(|c| c.iter().map(deep_copy).collect())
            .unwrap_or_default()
    }

    /// Tenants the store has seen, in no particular order.
    pub fn tenants(&self) -> impl Iterator<Item = &str> {
        self.tenants.keys().map(String::as_str)
    }

    /// Number of documents of a type.
    pub fn count(&self, tenant: &str, type_id: &str) -> usize {
        self.collection(tenant, type_id).map_or(0, Collection::len)
    }

    /// Return an expanded copy of `doc`.
    pub fn expand<S: AsRef<str>>(&self, tenant: &str, doc: &Value, clauses: &[S]) -> Result<Document> {
        Expander::new(self, tenant).resolve(doc, clauses)
    }

    /// Compile a predicate, reusing an earlier compilation of the same text.
    ///
    /// The cache holds at most `predicate_cache_size` entries and is reset
    /// when a new predicate would exceed that.
    pub fn predicate(&self, source: &str) -> Result<Predicate> {
        if let Some(cached) = self.predicates.get(source) {
            return Ok(cached.clone());
        }
        let compiled = Predicate::compile(source)?;
        tracing::debug!(predicate = source, "compiled predicate");

        let capacity = self.config.predicate_cache_size;
        if capacity > 0 {
            if self.predicates.len() >= capacity {
                tracing::debug!(capacity, "predicate cache full, clearing");
                self.predicates.clear();
            }
            self.predicates.insert(source.to_string(), compiled.clone());
        }
        Ok(compiled)
    }

    fn current_version(&self, tenant: &str, type_id: &str, id: &str) -> Result<Version> {
        let doc = self
            .collection(tenant, type_id)
            .and_then(|c| c.get(id))
            .ok_or_else(|| Error::NotFound {
                type_id: type_id.to_string(),
                id: id.to_string(),
            })?;
        doc.version()
            .ok_or_else(|| Error::InvalidDocument(format!("stored {type_id} {id} has no version")))
    }
}
