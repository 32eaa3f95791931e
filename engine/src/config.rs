//! Store configuration.

use serde::{Deserialize, Serialize};

/// Default page size for queries that do not ask for one.
pub const DEFAULT_LIMIT: usize = 20;

/// Upper bound applied to any requested page size.
pub const MAX_LIMIT: usize = 500;

/// Number of compiled predicates kept before the cache is reset.
pub const PREDICATE_CACHE_SIZE: usize = 1024;

/// Behaviour switches for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Fail expansion on dangling references instead of skipping them.
    pub strict_references: bool,
    /// Page size used when a query has no `limit`.
    pub default_limit: usize,
    /// Largest page a query may request.
    pub max_limit: usize,
    /// Compiled predicates to keep; `0` disables caching.
    pub predicate_cache_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strict_references: false,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            predicate_cache_size: PREDICATE_CACHE_SIZE,
        }
    }
}

impl StoreConfig {
    /// Enable or disable strict reference checking.
    pub fn with_strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }

    /// Set the default page size.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the maximum page size.
    pub fn with_max_limit(mut self, limit: usize) -> Self {
        self.max_limit = limit;
        self
    }

    /// Set how many compiled predicates the store keeps.
    pub fn with_predicate_cache_size(mut self, size: usize) -> Self {
        self.predicate_cache_size = size;
        self
    }

    /// The page size to use for a request.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}
