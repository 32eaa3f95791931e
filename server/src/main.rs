//! Shelf Server - HTTP front for the in-memory commerce API test double.
//!
//! Routes requests for generic resources and product search to a shared
//! shelf-engine [`Store`], one namespace per project key.

mod config;
mod error;
mod handlers;
mod routes;

use crate::config::Config;
use axum::Router;
use shelf_engine::Store;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
}

impl AppState {
    /// Fresh state with an empty store configured from `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::with_config(config.store_config()))),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shelf_server=debug,shelf_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        strict_references = config.strict_references,
        default_limit = config.default_limit,
        max_limit = config.max_limit,
        "Starting Shelf Server on {}:{}",
        config.host,
        config.port
    );

    let app = app(AppState::new(&config));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
