//! Generic resource routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use shelf_engine::{Document, PagedQueryResponse};

use crate::error::Result;
use crate::handlers::{
    handle_create, handle_delete, handle_get, handle_query, handle_update, QueryPairs,
    UpdateRequest,
};
use super::JsonBody;
use crate::AppState;

/// Create resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{project}/{resource}",
            get(query_handler).post(create_handler),
        )
        .route(
            "/{project}/{resource}/{id}",
            get(get_handler).post(update_handler).delete(delete_handler),
        )
}

/// GET /{project}/{resource} - Query a collection.
async fn query_handler(
    State(state): State<AppState>,
    Path((project, resource)): Path<(String, String)>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<PagedQueryResponse>> {
    let store = state.store.read().await;
    let page = handle_query(&store, &project, &resource, &pairs)?;
    Ok(Json(page))
}

/// POST /{project}/{resource} - Create from a draft.
async fn create_handler(
    State(state): State<AppState>,
    Path((project, resource)): Path<(String, String)>,
    body: JsonBody<Value>,
) -> Result<(StatusCode, Json<Document>)> {
    let Json(draft) = body?;
    let mut store = state.store.write().await;
    let created = handle_create(&mut store, &project, &resource, draft)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /{project}/{resource}/{id} - Fetch by id or `key=`.
async fn get_handler(
    State(state): State<AppState>,
    Path((project, resource, id)): Path<(String, String, String)>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<Document>> {
    let store = state.store.read().await;
    let doc = handle_get(&store, &project, &resource, &id, &pairs)?;
    Ok(Json(doc))
}

/// POST /{project}/{resource}/{id} - Version-checked update.
async fn update_handler(
    State(state): State<AppState>,
    Path((project, resource, id)): Path<(String, String, String)>,
    body: JsonBody<UpdateRequest>,
) -> Result<Json<Document>> {
    let Json(request) = body?;
    let mut store = state.store.write().await;
    let updated = handle_update(&mut store, &project, &resource, &id, request)?;
    Ok(Json(updated))
}

/// DELETE /{project}/{resource}/{id}?version=N - Version-checked delete.
async fn delete_handler(
    State(state): State<AppState>,
    Path((project, resource, id)): Path<(String, String, String)>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<Document>> {
    let mut store = state.store.write().await;
    let removed = handle_delete(&mut store, &project, &resource, &id, &pairs)?;
    Ok(Json(removed))
}
