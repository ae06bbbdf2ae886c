//! services/api/src/web/admin.rs
//!
//! Rule administration and catalog refresh endpoints, guarded by `require_admin`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ErrorBody, HttpError};
use crate::web::rest::{AddKeywordRequest, CatalogRefreshResponse, KeywordResponse, RuleResponse};
use crate::web::state::AppState;

/// List enabled rules with their enabled keywords, in evaluation order.
#[utoipa::path(
    get,
    path = "/admin/rules",
    responses(
        (status = 200, description = "Rules in evaluation order", body = [RuleResponse]),
        (status = 401, description = "Missing or wrong admin token", body = ErrorBody)
    ),
    params(("x-admin-token" = String, Header, description = "Shared admin secret.")),
    tag = "admin"
)]
pub async fn list_rules_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RuleResponse>>, HttpError> {
    let rules = state.rules.list_rules().await?;
    Ok(Json(rules.into_iter().map(Into::into).collect()))
}

/// Add a keyword under a category.
#[utoipa::path(
    post,
    path = "/admin/rules/keywords",
    request_body = AddKeywordRequest,
    responses(
        (status = 201, description = "Keyword added or re-enabled", body = KeywordResponse),
        (status = 400, description = "Unknown category or keyword too short", body = ErrorBody),
        (status = 409, description = "Keyword already exists; names the owning category", body = ErrorBody)
    ),
    params(("x-admin-token" = String, Header, description = "Shared admin secret.")),
    tag = "admin"
)]
pub async fn add_keyword_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddKeywordRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let keyword = state.rules.add_keyword(&req.category, &req.keyword).await?;
    Ok((StatusCode::CREATED, Json(KeywordResponse::from(keyword))))
}

/// Soft-delete a keyword. Its text stays reserved.
#[utoipa::path(
    delete,
    path = "/admin/rules/keywords/{id}",
    params(
        ("id" = Uuid, Path, description = "Keyword id."),
        ("x-admin-token" = String, Header, description = "Shared admin secret.")
    ),
    responses(
        (status = 200, description = "Keyword disabled", body = KeywordResponse),
        (status = 404, description = "Unknown keyword", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn remove_keyword_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<KeywordResponse>, HttpError> {
    let keyword = state.rules.remove_keyword(id).await?;
    Ok(Json(keyword.into()))
}

/// Run the catalog scrape and import steps once.
#[utoipa::path(
    post,
    path = "/admin/catalog/refresh",
    params(("x-admin-token" = String, Header, description = "Shared admin secret.")),
    responses(
        (status = 200, description = "All steps succeeded", body = CatalogRefreshResponse),
        (status = 409, description = "A refresh is already running", body = ErrorBody),
        (status = 500, description = "A step exited non-zero", body = CatalogRefreshResponse)
    ),
    tag = "admin"
)]
pub async fn catalog_refresh_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, HttpError> {
    let report = state.catalog_refresh.trigger(Utc::now()).await?;
    let response = CatalogRefreshResponse::from(report);
    let status = if response.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(response)))
}
