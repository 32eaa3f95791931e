//! Product search routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use shelf_engine::{PagedQueryResponse, ProductSearchRequest};

use crate::error::Result;
use crate::handlers::{handle_product_search, handle_projection_search, QueryPairs};
use super::JsonBody;
use crate::AppState;

/// Create search routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{project}/product-projections/search",
            get(projection_search_handler),
        )
        .route("/{project}/products/search", post(product_search_handler))
}

/// GET /{project}/product-projections/search - Filter projections.
async fn projection_search_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<PagedQueryResponse>> {
    let store = state.store.read().await;
    let page = handle_projection_search(&store, &project, &pairs)?;
    Ok(Json(page))
}

/// POST /{project}/products/search - Structured product search.
async fn product_search_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    body: JsonBody<ProductSearchRequest>,
) -> Result<Json<PagedQueryResponse>> {
    let Json(request) = body?;
    let store = state.store.read().await;
    let page = handle_product_search(&store, &project, &request)?;
    Ok(Json(page))
}
