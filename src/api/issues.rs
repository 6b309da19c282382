//! Issue template catalog endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::db::{self, CreateIssueRequest, Issue, IssueListRow, UpdateIssueRequest};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct IssueFilter {
    pub category_id: Option<String>,
}

/// List issue templates, optionally scoped to one category
///
/// GET /api/issues?category_id=...
pub async fn list_issues(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<IssueFilter>,
) -> Result<Json<Vec<IssueListRow>>, ApiError> {
    let issues = db::list_issues(&state.db, filter.category_id.as_deref()).await?;
    Ok(Json(issues))
}

/// Create an issue template
///
/// POST /api/issues
pub async fn create_issue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<Issue>), ApiError> {
    let issue = db::create_issue(&state.db, req).await?;
    tracing::info!(issue = %issue.title, "Issue template created");
    Ok((StatusCode::CREATED, Json(issue)))
}

/// Partially update an issue template. Omitted fields keep their
/// current value; explicit empty strings clear the optional text
/// fields.
///
/// PUT /api/issues/:id
pub async fn update_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateIssueRequest>,
) -> Result<Json<Issue>, ApiError> {
    let issue = db::update_issue(&state.db, &id, req).await?;
    Ok(Json(issue))
}

/// Delete an issue template
///
/// DELETE /api/issues/:id
pub async fn delete_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    db::delete_issue(&state.db, &id).await?;
    Ok(Json(json!({ "ok": true })))
}
