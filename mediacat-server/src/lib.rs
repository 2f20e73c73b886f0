//! mediacat-server library
//!
//! HTTP surface over the media catalog: media CRUD plus a health check.

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use mediacat_common::db::CatalogStore;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog rows (MySQL in production)
    pub store: Arc<dyn CatalogStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }
}

/// CORS policy for browser clients on `allowed_origins`
pub fn cors_layer(allowed_origins: &[String]) -> mediacat_common::Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| {
                mediacat_common::Error::Config(format!("invalid CORS origin '{}'", origin))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// Build application router
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .merge(api::media_routes())
        .merge(api::health_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
