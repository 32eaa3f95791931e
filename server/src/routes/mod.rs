//! HTTP route definitions.

mod health;
mod resources;
mod search;

use crate::AppState;
use axum::{extract::rejection::JsonRejection, Json, Router};

/// A JSON request body whose rejection is rendered as a platform error.
type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(search::routes())
        .merge(resources::routes())
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::{app, AppState};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        app(AppState::new(&Config::default()))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn product(id: &str, sku: &str, published: bool) -> Value {
        let data = json!({
            "name": {"en": format!("Product {id}")},
            "masterVariant": {"id": 1, "sku": sku},
            "variants": []
        });
        json!({
            "id": id,
            "key": id,
            "masterData": {"published": published, "current": data, "staged": data}
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["projects"], 0);
        assert_eq!(body["strictReferences"], false);

        send(&app, Method::POST, "/shop/zones", Some(json!({"id": "z1"}))).await;
        let (_, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(body["projects"], 1);
    }

    #[tokio::test]
    async fn create_then_fetch_and_query() {
        let app = test_app();
        let (status, created) = send(
            &app,
            Method::POST,
            "/shop/categories",
            Some(json!({"key": "shirts", "name": {"en": "Shirts"}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["version"], 1);

        let (status, fetched) = send(&app, Method::GET, "/shop/categories/key=shirts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], created["id"]);

        let (status, page) = send(
            &app,
            Method::GET,
            "/shop/categories?where=key%3D%22shirts%22&limit=5",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["limit"], 5);
        assert_eq!(page["results"][0]["key"], "shirts");

        let (_, other) = send(&app, Method::GET, "/other/categories", None).await;
        assert_eq!(other["total"], 0);
    }

    #[tokio::test]
    async fn expansion_through_the_api() {
        let app = test_app();
        send(&app, Method::POST, "/shop/categories", Some(json!({"id": "c1", "key": "shirts"}))).await;
        send(
            &app,
            Method::POST,
            "/shop/categories",
            Some(json!({"id": "c2", "parent": {"typeId": "category", "id": "c1"}})),
        )
        .await;

        let (status, doc) = send(&app, Method::GET, "/shop/categories/c2?expand=parent", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["parent"]["obj"]["key"], "shirts");

        let (_, plain) = send(&app, Method::GET, "/shop/categories/c2", None).await;
        assert!(plain["parent"].get("obj").is_none());
    }

    #[tokio::test]
    async fn malformed_predicate_is_bad_request() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/shop/categories?where=key%3D", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["errors"][0]["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn unknown_search_node_is_invalid_input() {
        let app = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/shop/products/search",
            Some(json!({"query": {"fuzzy": {"field": "name", "value": "shirt"}}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["errors"][0]["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn unreadable_bodies_are_invalid_input() {
        let app = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/shop/categories")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["errors"][0]["code"], "InvalidInput");

        send(&app, Method::POST, "/shop/zones", Some(json!({"id": "z1"}))).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/shop/zones/z1",
            Some(json!({"fields": {"name": "EU"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "InvalidInput");
    }

    #[tokio::test]
    async fn unknown_resources_are_not_found() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/shop/widgets", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["code"], "ResourceNotFound");

        let (status, _) = send(&app, Method::GET, "/shop/categories/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let app = test_app();
        send(&app, Method::POST, "/shop/customers", Some(json!({"id": "u1", "email": "a@b.c"}))).await;

        let (status, updated) = send(
            &app,
            Method::POST,
            "/shop/customers/u1",
            Some(json!({"version": 1, "fields": {"firstName": "Ada"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["version"], 2);
        assert_eq!(updated["firstName"], "Ada");

        let (status, body) = send(
            &app,
            Method::POST,
            "/shop/customers/u1",
            Some(json!({"version": 1, "fields": {"firstName": "Bob"}})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errors"][0]["code"], "ConcurrentModification");
        assert_eq!(body["errors"][0]["currentVersion"], 2);
    }

    #[tokio::test]
    async fn delete_checks_version() {
        let app = test_app();
        send(&app, Method::POST, "/shop/zones", Some(json!({"id": "z1"}))).await;

        let (status, _) = send(&app, Method::DELETE, "/shop/zones/z1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::DELETE, "/shop/zones/z1?version=7", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, removed) = send(&app, Method::DELETE, "/shop/zones/z1?version=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["id"], "z1");

        let (status, _) = send(&app, Method::GET, "/shop/zones/z1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn product_searches() {
        let app = test_app();
        send(&app, Method::POST, "/shop/products", Some(product("a", "A1", true))).await;
        send(&app, Method::POST, "/shop/products", Some(product("b", "B1", false))).await;

        let (status, page) = send(
            &app,
            Method::GET,
            "/shop/product-projections/search?filter=variants.sku%3A%22A1%22",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["results"][0]["id"], "a");

        let (_, staged) = send(&app, Method::GET, "/shop/product-projections/search?staged=true", None).await;
        assert_eq!(staged["total"], 2);

        let (status, page) = send(
            &app,
            Method::POST,
            "/shop/products/search",
            Some(json!({
                "query": {"exact": {"field": "variants.sku", "value": "B1"}},
                "staged": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["results"][0]["id"], "b");
    }
}
