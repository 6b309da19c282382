//! Email/password authentication with opaque bearer session tokens.
//!
//! Tokens are random 256-bit values handed to the client once and
//! stored server-side only as SHA-256 hashes, with a per-session
//! expiry. An optional static API token from the config grants a
//! synthetic admin identity for scripts.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::db::{
    DbPool, LoginRequest, LoginResponse, RegisterRequest, Session, User, UserResponse,
    ROLE_ADMIN, ROLE_ENGINEER,
};
use crate::utils::{new_id, now_rfc3339};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_email;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session row and return the bearer token for it.
async fn create_session(pool: &DbPool, user_id: &str, ttl_days: i64) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);

    let expires_at = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(ttl_days))
        .ok_or_else(|| ApiError::internal("Session expiry out of range"))?
        .to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(new_id("s_"))
    .bind(user_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Register endpoint. New accounts always start as engineers; the only
/// promotion path is the admin seed at startup.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if request.password.len() < 4 {
        errors.add("password", "Password must be at least 4 characters");
    }
    if request.first_name.trim().is_empty() {
        errors.add("first_name", "First name is required");
    }
    if request.last_name.trim().is_empty() {
        errors.add("last_name", "Last name is required");
    }
    errors.finish()?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    let user = User {
        id: new_id("u_"),
        email: request.email,
        password_hash,
        first_name: Some(request.first_name.trim().to_string()),
        last_name: Some(request.last_name.trim().to_string()),
        role: ROLE_ENGINEER.to_string(),
        created_at: now_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, role, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.role)
    .bind(&user.created_at)
    .execute(&state.db)
    .await
    .map_err(|e| {
        // The unique index catches a concurrent duplicate registration
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("User already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    tracing::info!(email = %user.email, "Registered user");

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;
    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    // Unknown email and wrong password are indistinguishable to the caller
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;
    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    // Fall back to X-API-Key for script use
    headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// True when the token matches the configured static API token.
/// Constant-time comparison to prevent timing attacks.
fn matches_api_token(config_token: Option<&str>, token: &str) -> bool {
    let Some(config_token) = config_token else {
        return false;
    };
    let expected = config_token.as_bytes();
    let provided = token.as_bytes();
    expected.len() == provided.len() && bool::from(expected.ct_eq(provided))
}

/// Synthetic admin identity for static API token auth.
fn system_user() -> User {
    User {
        id: "system".to_string(),
        email: "system@fieldlog.local".to_string(),
        password_hash: String::new(),
        first_name: Some("System".to_string()),
        last_name: Some("Admin".to_string()),
        role: ROLE_ADMIN.to_string(),
        created_at: now_rfc3339(),
    }
}

/// Resolve the current user from a token
pub async fn get_current_user(
    pool: &DbPool,
    config: &crate::config::Config,
    token: &str,
) -> Result<User, StatusCode> {
    if matches_api_token(config.auth.api_token.as_deref(), token) {
        return Ok(system_user());
    }

    let token_hash = hash_token(token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?",
    )
    .bind(&token_hash)
    .bind(now_rfc3339())
    .fetch_optional(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let session = session.ok_or(StatusCode::UNAUTHORIZED)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    user.ok_or(StatusCode::UNAUTHORIZED)
}

/// Middleware that rejects unauthenticated requests before any handler
/// logic runs.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing token"))?;

    get_current_user(&state.db, &state.config, &token)
        .await
        .map_err(|status| match status {
            StatusCode::UNAUTHORIZED => ApiError::unauthorized("Invalid token"),
            _ => ApiError::internal("Authentication failed"),
        })?;

    Ok(next.run(request).await)
}

/// Extractor for the authenticated user inside protected handlers
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("Missing token"))?;
        get_current_user(&state.db, &state.config, &token)
            .await
            .map_err(|status| match status {
                StatusCode::UNAUTHORIZED => ApiError::unauthorized("Invalid token"),
                _ => ApiError::internal("Authentication failed"),
            })
    }
}

/// Seed the configured admin user at startup. Creates the account when
/// absent, promotes it when present with a lesser role.
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&auth.admin_email, &auth.admin_password) else {
        return Ok(());
    };

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    match existing {
        None => {
            let password_hash = hash_password(password)
                .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;
            sqlx::query(
                "INSERT INTO users (id, email, password_hash, first_name, last_name, role, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(new_id("u_"))
            .bind(email)
            .bind(&password_hash)
            .bind("Admin")
            .bind("User")
            .bind(ROLE_ADMIN)
            .bind(now_rfc3339())
            .execute(pool)
            .await?;
            tracing::info!(email = %email, "Seeded admin user");
        }
        Some(user) if user.role != ROLE_ADMIN => {
            sqlx::query("UPDATE users SET role = ? WHERE email = ?")
                .bind(ROLE_ADMIN)
                .bind(email)
                .execute(pool)
                .await?;
            tracing::info!(email = %email, "Promoted existing user to admin");
        }
        Some(_) => {
            tracing::debug!(email = %email, "Admin user exists");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;

    async fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), test_pool().await))
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret!", "not-a-hash"));
    }

    #[test]
    fn token_hash_is_deterministic_and_opaque() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn api_token_comparison() {
        assert!(matches_api_token(Some("abc123"), "abc123"));
        assert!(!matches_api_token(Some("abc123"), "abc124"));
        assert!(!matches_api_token(Some("abc123"), "abc1234"));
        assert!(!matches_api_token(None, "abc123"));
    }

    #[tokio::test]
    async fn register_login_and_session_lookup() {
        let state = test_state().await;

        let request = RegisterRequest {
            email: "eng@example.com".into(),
            password: "visit".into(),
            first_name: "Field".into(),
            last_name: "Engineer".into(),
        };
        let Json(response) = register(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(response.user.role, ROLE_ENGINEER);

        // Duplicate email conflicts
        let dup = RegisterRequest {
            email: "eng@example.com".into(),
            password: "visit".into(),
            first_name: "Other".into(),
            last_name: "Person".into(),
        };
        assert!(register(State(state.clone()), Json(dup)).await.is_err());

        // Bad password is rejected with the same message as unknown email
        let bad = LoginRequest {
            email: "eng@example.com".into(),
            password: "nope".into(),
        };
        assert!(login(State(state.clone()), Json(bad)).await.is_err());

        let good = LoginRequest {
            email: "eng@example.com".into(),
            password: "visit".into(),
        };
        let Json(response) = login(State(state.clone()), Json(good)).await.unwrap();

        let user = get_current_user(&state.db, &state.config, &response.token)
            .await
            .unwrap();
        assert_eq!(user.email, "eng@example.com");

        let err = get_current_user(&state.db, &state.config, "bogus").await;
        assert_eq!(err.unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_seed_creates_then_promotes() {
        let pool = test_pool().await;
        let auth = AuthConfig {
            admin_email: Some("ops@example.com".into()),
            admin_password: Some("changeme123".into()),
            api_token: None,
            session_ttl_days: 7,
        };

        ensure_admin_user(&pool, &auth).await.unwrap();
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = 'ops@example.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(user.role, ROLE_ADMIN);

        // Demote manually, re-seed promotes back without duplicating
        sqlx::query("UPDATE users SET role = 'engineer' WHERE email = 'ops@example.com'")
            .execute(&pool)
            .await
            .unwrap();
        ensure_admin_user(&pool, &auth).await.unwrap();
        let (count, role): (i64, String) = sqlx::query_as(
            "SELECT COUNT(*), MAX(role) FROM users WHERE email = 'ops@example.com'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(role, ROLE_ADMIN);
    }
}
