//! HTTP 介面：查詢路由需要 `AuthKey`，健康檢查不需要。

pub mod auth;
pub mod envelope;
pub mod routes;

use crate::core::orchestrator::LookupService;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LookupService>,
    pub auth_key: Arc<str>,
}

impl AppState {
    pub fn new(service: Arc<LookupService>, auth_key: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            auth_key: auth_key.into(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let icp = Router::new()
        .route("/company/search", get(routes::search_company))
        .route("/company/search/history", get(routes::search_company_history))
        .route("/search", get(routes::search_domain))
        .route("/stats", get(routes::stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth_key,
        ));

    Router::new()
        .nest("/icp", icp)
        .route("/health", get(routes::health))
        .route("/", get(routes::root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
