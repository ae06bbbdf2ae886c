//! services/api/src/web/router.rs
//!
//! Assembles the public, authenticated and admin routes into one router.

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::web::middleware::{require_admin, require_auth, ADMIN_TOKEN_HEADER};
use crate::web::rest::ApiDoc;
use crate::web::state::AppState;
use crate::web::{admin, auth, calendar};

/// Builds the complete application, including the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (login required)
    let protected_routes = Router::new()
        .route("/calendar/connect", get(calendar::connect_handler))
        .route("/calendar/callback", get(calendar::callback_handler))
        .route("/calendar/sync", post(calendar::sync_handler))
        .route("/calendar/events", get(calendar::list_events_handler))
        .route("/calendar/synced", get(calendar::synced_events_handler))
        .route("/recommendations", get(calendar::recommendations_handler))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), require_auth));

    // Admin routes (shared admin token required)
    let admin_routes = Router::new()
        .route("/admin/rules", get(admin::list_rules_handler))
        .route("/admin/rules/keywords", post(admin::add_keyword_handler))
        .route("/admin/rules/keywords/{id}", delete(admin::remove_keyword_handler))
        .route("/admin/catalog/refresh", post(admin::catalog_refresh_handler))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), require_admin));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
