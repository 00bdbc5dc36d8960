//! services/api/src/web/mod.rs
//!
//! Assembles the HTTP router.

pub mod accounts;
pub mod auth;
pub mod middleware;
pub mod response;
pub mod rest;
pub mod state;
pub mod transfers;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use middleware::require_auth;
use rest::ApiDoc;
use state::AppState;

/// Builds the full application router: `/api/v1` routes, CORS, request
/// tracing and, when enabled, the Swagger UI.
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route(
            "/accounts",
            post(accounts::create_account_handler).get(accounts::list_accounts_handler),
        )
        .route("/accounts/{id}/balance", get(accounts::get_balance_handler))
        .route("/login", post(auth::login_handler));

    // Protected routes (bearer session required)
    let protected_routes = Router::new()
        .route(
            "/transfers",
            post(transfers::create_transfer_handler).get(transfers::list_transfers_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .nest(
            "/api/v1",
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .with_state(state);

    let mut app = api_router;
    if config.enable_docs {
        app = app.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    app.layer(cors_layer(config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS_ORIGIN: {}", e);
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}
