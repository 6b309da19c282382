//! User listing endpoints. Registration and login live in `auth`.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{User, UserResponse};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

/// Current authenticated user
///
/// GET /api/users/me
pub async fn me(user: User) -> Json<MeResponse> {
    Json(MeResponse { user: user.into() })
}

/// All users, newest first. The chat picker and the ticket assignment
/// dropdown both read this.
///
/// GET /api/users
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<UserListResponse>, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}
