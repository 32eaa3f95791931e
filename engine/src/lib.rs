//! # Shelf Engine
//!
//! The query, filter and expansion core of an in-process commerce API test
//! double.
//!
//! This crate holds documents in memory and answers the questions a
//! commerce platform client asks of them: `where` predicates, catalog
//! `field:value` filters, structured search queries and reference
//! expansion. It performs no IO; an HTTP front lives in a separate crate.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine knows nothing about sockets or files
//! - **Compile once**: every query language compiles to a reusable matcher
//! - **Copies out**: reads return deep copies, never live documents
//! - **Versioned writes**: updates are compare-and-increment on `version`
//!
//! ## Core Concepts
//!
//! ### Documents
//!
//! JSON objects partitioned by tenant and type id, each carrying `id`,
//! `version`, `createdAt` and `lastModifiedAt`. See [`document`].
//!
//! ### Query languages
//!
//! - [`Predicate`] - `where` clauses such as `name(en = "Shirt") and n > 3`
//! - [`FilterExpression`] - catalog filters such as
//!   `variants.price.centAmount:range (0 TO 500)`
//! - [`SearchQuery`] - the JSON search tree of the product search endpoint
//!
//! The first two are built on a small Pratt parser framework ([`lexer`]
//! and [`pratt`]).
//!
//! ### Expansion
//!
//! References (`{"typeId": ..., "id": ...}`) can be inlined on read with
//! expand clauses like `lineItems[*].variant`. See [`expand`].
//!
//! ## Quick Start
//!
//! ```rust
//! use shelf_engine::{QueryParams, Store};
//! use serde_json::json;
//!
//! let mut store = Store::new();
//! store
//!     .add("my-project", "category", json!({"id": "c1", "version": 1, "key": "shirts"}))
//!     .unwrap();
//! store
//!     .add(
//!         "my-project",
//!         "product",
//!         json!({"id": "p1", "version": 1, "stock": 12,
//!                "category": {"typeId": "category", "id": "c1"}}),
//!     )
//!     .unwrap();
//!
//! let params = QueryParams::new().filter("stock > 10").expand("category");
//! let page = store.query("my-project", "product", &params).unwrap();
//! assert_eq!(page.total, 1);
//! assert_eq!(page.results[0]["category"]["obj"]["key"], "shirts");
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod expand;
pub mod filter;
pub mod lexer;
pub mod pratt;
pub mod predicate;
pub mod search;
pub mod search_query;
pub mod store;
pub mod value;
pub mod variant;

// Re-export main types at crate root
pub use config::StoreConfig;
pub use document::{Document, DocumentExt, ResourceIdentifier};
pub use error::{Error, Result};
pub use expand::{ExpandClause, ExpandIndex, Expander};
pub use filter::{Condition, FilterExpression};
pub use predicate::{Predicate, Variables};
pub use search::{project, ProductSearch, ProductSearchRequest, ProjectionSearchParams};
pub use search_query::SearchQuery;
pub use store::{Collection, PagedQueryResponse, QueryParams, Store};

/// Type aliases for clarity
pub type TenantKey = String;
pub type TypeId = String;
pub type DocumentId = String;
pub type Version = u64;
