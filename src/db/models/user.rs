//! User and session models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ROLE_ENGINEER: &str = "engineer";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// "First Last" with missing parts dropped; None when both are absent.
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Public view of a user, without the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: "u_1".into(),
            email: "a@b.c".into(),
            password_hash: String::new(),
            first_name: first.map(Into::into),
            last_name: last.map(Into::into),
            role: ROLE_ENGINEER.into(),
            created_at: String::new(),
        }
    }

    #[test]
    fn display_name_joins_and_trims() {
        assert_eq!(
            user(Some("Ada"), Some("Lovelace")).display_name().unwrap(),
            "Ada Lovelace"
        );
        assert_eq!(user(Some("Ada"), None).display_name().unwrap(), "Ada");
        assert_eq!(user(None, Some("Lovelace")).display_name().unwrap(), "Lovelace");
        assert!(user(None, None).display_name().is_none());
    }
}
