//! Product catalog search.
//!
//! Products are stored with their catalog data under `masterData.current`
//! and `masterData.staged`. Searches run against projections: a flat view of
//! one of the two, carrying the product's base properties. Projection search
//! takes `field:value` filters; product search takes a [`SearchQuery`] tree.

use crate::error::Result;
use crate::filter::FilterExpression;
use crate::search_query::SearchQuery;
use crate::store::PagedQueryResponse;
use crate::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type id products are stored under.
pub const PRODUCT_TYPE: &str = "product";

const BASE_FIELDS: [&str; 6] = [
    "id",
    "version",
    "key",
    "productType",
    "createdAt",
    "lastModifiedAt",
];

/// Build a product projection.
///
/// Returns `None` for the current projection of a product that was never
/// published. A document without `masterData` is treated as a projection
/// already and copied as is.
pub fn project(product: &Value, staged: bool) -> Option<Value> {
    let Some(master_data) = product.get("masterData") else {
        return Some(product.clone());
    };
    let published = master_data
        .get("published")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if !staged && !published {
        return None;
    }

    let data = master_data.get(if staged { "staged" } else { "current" })?;
    let mut projection = match data {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    for field in BASE_FIELDS {
        if let Some(value) = product.get(field) {
            projection.insert(field.into(), value.clone());
        }
    }
    projection.insert("published".into(), Value::Bool(published));
    if let Some(changes) = master_data.get("hasStagedChanges") {
        projection.insert("hasStagedChanges".into(), changes.clone());
    }
    Some(Value::Object(projection))
}

/// Parameters of a projection search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectionSearchParams {
    pub filter: Vec<String>,
    #[serde(rename = "filter.query")]
    pub filter_query: Vec<String>,
    #[serde(rename = "filter.facets")]
    pub filter_facets: Vec<String>,
    pub mark_matching_variants: bool,
    pub staged: bool,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub expand: Vec<String>,
}

impl ProjectionSearchParams {
    fn clauses(&self) -> impl Iterator<Item = &String> {
        self.filter
            .iter()
            .chain(&self.filter_query)
            .chain(&self.filter_facets)
    }
}

/// Body of a structured product search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductSearchRequest {
    /// Matches everything when absent.
    pub query: Option<SearchQuery>,
    pub mark_matching_variants: bool,
    pub staged: bool,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Searches the products of one tenant.
pub struct ProductSearch<'a> {
    store: &'a Store,
    tenant: &'a str,
}

impl<'a> ProductSearch<'a> {
    pub fn new(store: &'a Store, tenant: &'a str) -> Self {
        Self { store, tenant }
    }

    /// Filter projections with `field:value` clauses, all of which must hold.
    pub fn search_projections(&self, params: &ProjectionSearchParams) -> Result<PagedQueryResponse> {
        let filters = params
            .clauses()
            .map(|clause| FilterExpression::compile(clause))
            .collect::<Result<Vec<_>>>()?;

        let mut matching = Vec::new();
        'products: for mut projection in self.projections(params.staged) {
            for filter in &filters {
                if !filter.evaluate(&mut projection, params.mark_matching_variants)? {
                    continue 'products;
                }
            }
            matching.push(projection);
        }
        tracing::trace!(
            tenant = self.tenant,
            filters = filters.len(),
            total = matching.len(),
            "projection search"
        );
        self.page(matching, params.offset, params.limit, &params.expand)
    }

    /// Evaluate a search query tree against projections.
    pub fn search(&self, request: &ProductSearchRequest) -> Result<PagedQueryResponse> {
        let mut matching = Vec::new();
        for mut projection in self.projections(request.staged) {
            let matched = match &request.query {
                Some(query) => query.evaluate(&mut projection, request.mark_matching_variants)?,
                None => true,
            };
            if matched {
                matching.push(projection);
            }
        }
        self.page(matching, request.offset, request.limit, &[] as &[&str])
    }

    fn projections(&self, staged: bool) -> Vec<Value> {
        self.store
            .collection(self.tenant, PRODUCT_TYPE)
            .map(|products| {
                products
                    .iter()
                    .filter_map(|product| project(product, staged))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn page<S: AsRef<str>>(
        &self,
        matching: Vec<Value>,
        offset: Option<usize>,
        limit: Option<usize>,
        expand: &[S],
    ) -> Result<PagedQueryResponse> {
        let limit = self.store.config().effective_limit(limit);
        let mut page = PagedQueryResponse::paginate(matching, offset.unwrap_or(0), limit);
        if !expand.is_empty() {
            page.results = page
                .results
                .iter()
                .map(|doc| self.store.expand(self.tenant, doc, expand))
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(page)
    }
}
