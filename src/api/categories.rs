//! Category catalog endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{self, Category, CreateCategoryRequest, User};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_required_text;

/// List all categories, ordered by name
///
/// GET /api/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = db::list_categories(&state.db).await?;
    Ok(Json(categories))
}

/// Create a category owned by the caller
///
/// POST /api/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    if let Err(e) = validate_required_text(&req.name, "name", 200) {
        return Err(ApiError::validation_field("name", e));
    }

    let category = db::create_category(&state.db, &req.name, Some(&user.id)).await?;
    tracing::info!(category = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename a category
///
/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    if let Err(e) = validate_required_text(&req.name, "name", 200) {
        return Err(ApiError::validation_field("name", e));
    }

    let category = db::rename_category(&state.db, &id, &req.name).await?;
    Ok(Json(category))
}

/// Delete a category. Issues referencing it are left in place with a
/// dangling category_id.
///
/// DELETE /api/categories/:id
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    db::delete_category(&state.db, &id).await?;
    Ok(Json(json!({ "ok": true })))
}
