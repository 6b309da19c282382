//! Ticket lifecycle endpoints: create/list, status, checklist
//! bootstrap and step results, notes, and the PDF visit report.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{
    self, CreateTicketRequest, Ticket, TicketListRow, TicketNote, TicketStep, User,
};
use crate::report;
use crate::AppState;

use super::error::ApiError;

/// List tickets visible to the caller
///
/// GET /api/tickets
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<TicketListRow>>, ApiError> {
    let tickets = db::list_tickets(&state.db, &user).await?;
    Ok(Json(tickets))
}

/// Create a ticket. The storage contract is deliberately permissive:
/// every field may be null, and the client decides what it requires.
///
/// POST /api/tickets
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let ticket = db::create_ticket(&state.db, req, Some(&user.id)).await?;
    tracing::info!(ticket = %ticket.id, "Ticket created");
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// Overwrite ticket status; closing stamps the completion time,
/// reopening clears it
///
/// PUT /api/tickets/:id/status
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = db::set_ticket_status(&state.db, &id, &req.status).await?;
    tracing::info!(ticket = %ticket.id, status = %ticket.status, "Ticket status changed");
    Ok(Json(ticket))
}

/// Checklist steps in order
///
/// GET /api/tickets/:id/steps
pub async fn list_steps(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TicketStep>>, ApiError> {
    let steps = db::list_steps(&state.db, &id).await?;
    Ok(Json(steps))
}

#[derive(Debug, Deserialize)]
pub struct BootstrapStepsRequest {
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Copy checklist steps onto the ticket, once. When the ticket already
/// has steps this returns them unchanged — success can mean "no-op".
///
/// POST /api/tickets/:id/bootstrap-steps
pub async fn bootstrap_steps(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<BootstrapStepsRequest>,
) -> Result<Json<Vec<TicketStep>>, ApiError> {
    let steps = db::bootstrap_steps(&state.db, &id, &req.steps).await?;
    Ok(Json(steps))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStepRequest {
    /// true = pass, false = fail, null/absent = clear
    #[serde(default)]
    pub result: Option<bool>,
}

/// Record a step outcome
///
/// PUT /api/tickets/:ticket_id/steps/:step_id
pub async fn update_step(
    State(state): State<Arc<AppState>>,
    Path((ticket_id, step_id)): Path<(String, String)>,
    Json(req): Json<UpdateStepRequest>,
) -> Result<Json<TicketStep>, ApiError> {
    let step = db::update_step_result(&state.db, &ticket_id, &step_id, req.result).await?;
    Ok(Json(step))
}

/// Notes in chronological order
///
/// GET /api/tickets/:id/notes
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TicketNote>>, ApiError> {
    let notes = db::list_notes(&state.db, &id).await?;
    Ok(Json(notes))
}

#[derive(Debug, Deserialize)]
pub struct AddNoteRequest {
    #[serde(default)]
    pub note_text: String,
}

/// Append a note. Notes cannot be edited or deleted.
///
/// POST /api/tickets/:id/notes
pub async fn add_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddNoteRequest>,
) -> Result<(StatusCode, Json<TicketNote>), ApiError> {
    let note = db::add_note(&state.db, &id, &req.note_text).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// Render the visit report. Pure read; safe to retry.
///
/// GET /api/tickets/:id/report.pdf
pub async fn report_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let data = report::load_report_data(&state.db, &id).await?;
    let bytes = report::render_pdf(&data)
        .map_err(|e| {
            tracing::error!(ticket = %id, error = %e, "Report rendering failed");
            ApiError::internal("Failed to render report")
        })?;

    let filename = format!("attachment; filename=\"visit-report-{id}.pdf\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        bytes,
    )
        .into_response())
}
