//! Product search handlers.

use super::{last, parse_flag, parse_number, values, QueryPairs};
use crate::error::Result;
use shelf_engine::{
    PagedQueryResponse, ProductSearch, ProductSearchRequest, ProjectionSearchParams, Store,
};

/// Build projection search parameters from a decoded query string.
pub fn projection_search_params(pairs: &[(String, String)]) -> Result<ProjectionSearchParams> {
    let collect = |name: &'static str| values(pairs, name).map(str::to_string).collect::<Vec<_>>();
    let mut params = ProjectionSearchParams {
        filter: collect("filter"),
        filter_query: collect("filter.query"),
        filter_facets: collect("filter.facets"),
        expand: collect("expand"),
        ..Default::default()
    };
    if let Some(mark) = last(pairs, "markMatchingVariants") {
        params.mark_matching_variants = parse_flag("markMatchingVariants", mark)?;
    }
    if let Some(staged) = last(pairs, "staged") {
        params.staged = parse_flag("staged", staged)?;
    }
    if let Some(offset) = last(pairs, "offset") {
        params.offset = Some(parse_number("offset", offset)?);
    }
    if let Some(limit) = last(pairs, "limit") {
        params.limit = Some(parse_number("limit", limit)?);
    }
    Ok(params)
}

/// GET /{project}/product-projections/search
pub fn handle_projection_search(
    store: &Store,
    project: &str,
    pairs: &QueryPairs,
) -> Result<PagedQueryResponse> {
    let params = projection_search_params(pairs)?;
    Ok(ProductSearch::new(store, project).search_projections(&params)?)
}

/// POST /{project}/products/search
pub fn handle_product_search(
    store: &Store,
    project: &str,
    request: &ProductSearchRequest,
) -> Result<PagedQueryResponse> {
    Ok(ProductSearch::new(store, project).search(request)?)
}
