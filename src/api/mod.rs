pub mod auth;
mod categories;
mod chat;
mod error;
mod issues;
mod tickets;
mod users;
mod validation;

pub use error::{ApiError, ErrorCode};

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Protected API routes
    let api_routes = Router::new()
        // Users
        .route("/users/me", get(users::me))
        .route("/users", get(users::list_users))
        // Categories
        .route("/categories", get(categories::list_categories))
        .route("/categories", post(categories::create_category))
        .route("/categories/:id", put(categories::update_category))
        .route("/categories/:id", delete(categories::delete_category))
        // Issue templates
        .route("/issues", get(issues::list_issues))
        .route("/issues", post(issues::create_issue))
        .route("/issues/:id", put(issues::update_issue))
        .route("/issues/:id", delete(issues::delete_issue))
        // Tickets
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets", post(tickets::create_ticket))
        .route("/tickets/:id/status", put(tickets::set_status))
        .route("/tickets/:id/steps", get(tickets::list_steps))
        .route("/tickets/:id/bootstrap-steps", post(tickets::bootstrap_steps))
        .route("/tickets/:ticket_id/steps/:step_id", put(tickets::update_step))
        .route("/tickets/:id/notes", get(tickets::list_notes))
        .route("/tickets/:id/notes", post(tickets::add_note))
        .route("/tickets/:id/report.pdf", get(tickets::report_pdf))
        // Chat
        .route("/chat/threads", get(chat::list_threads))
        .route("/chat/:other_user_id", get(chat::list_messages))
        .route("/chat/:other_user_id", post(chat::send_message))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
