//! User-to-user chat endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{self, ChatMessage, ChatThread, User};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    pub threads: Vec<ChatThread>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub text: String,
}

/// People the caller has chatted with, latest conversation first
///
/// GET /api/chat/threads
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ThreadsResponse>, ApiError> {
    let threads = db::list_threads(&state.db, &user.id).await?;
    Ok(Json(ThreadsResponse { threads }))
}

/// Conversation with one counterparty, both directions, oldest first
///
/// GET /api/chat/:other_user_id
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(other_user_id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = db::list_messages(&state.db, &user.id, &other_user_id).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// Send a message
///
/// POST /api/chat/:other_user_id
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(other_user_id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let message = db::send_message(&state.db, &user.id, &other_user_id, &req.text).await?;
    Ok((StatusCode::CREATED, Json(SendResponse { message })))
}
