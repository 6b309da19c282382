//! Peer-to-peer chat messages. Append-only; read either as one
//! conversation pair or aggregated into threads (latest message per
//! counterparty).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{DbPool, StoreError};
use crate::utils::{new_id, now_rfc3339};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub text: String,
    pub created_at: String,
}

/// One row per chat counterparty, newest conversation first.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatThread {
    pub other_user_id: String,
    pub other_email: Option<String>,
    pub name: Option<String>,
    pub last_at: String,
}

pub async fn list_threads(pool: &DbPool, user_id: &str) -> Result<Vec<ChatThread>, StoreError> {
    let rows = sqlx::query_as::<_, ChatThread>(
        "
        WITH pairs AS (
            SELECT
                CASE WHEN from_user_id = ?1 THEN to_user_id ELSE from_user_id END AS other_user_id,
                created_at
            FROM chat_messages
            WHERE from_user_id = ?1 OR to_user_id = ?1
        )
        SELECT p.other_user_id,
               u.email AS other_email,
               NULLIF(TRIM(COALESCE(u.first_name, '') || ' ' || COALESCE(u.last_name, '')), '') AS name,
               MAX(p.created_at) AS last_at
        FROM pairs p
        LEFT JOIN users u ON u.id = p.other_user_id
        GROUP BY p.other_user_id, u.email, u.first_name, u.last_name
        ORDER BY MAX(p.created_at) DESC
        LIMIT 200
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_messages(
    pool: &DbPool,
    user_id: &str,
    other_user_id: &str,
) -> Result<Vec<ChatMessage>, StoreError> {
    let rows = sqlx::query_as::<_, ChatMessage>(
        "
        SELECT id, from_user_id, to_user_id, text, created_at
        FROM chat_messages
        WHERE (from_user_id = ?1 AND to_user_id = ?2)
           OR (from_user_id = ?2 AND to_user_id = ?1)
        ORDER BY created_at ASC
        LIMIT 500
        ",
    )
    .bind(user_id)
    .bind(other_user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn send_message(
    pool: &DbPool,
    from_user_id: &str,
    to_user_id: &str,
    text: &str,
) -> Result<ChatMessage, StoreError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(StoreError::InvalidArgument("text is required".into()));
    }

    let message = ChatMessage {
        id: new_id("m_"),
        from_user_id: from_user_id.to_string(),
        to_user_id: to_user_id.to_string(),
        text: text.to_string(),
        created_at: now_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO chat_messages (id, from_user_id, to_user_id, text, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.from_user_id)
    .bind(&message.to_user_id)
    .bind(&message.text)
    .bind(&message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn send_trims_and_rejects_blank() {
        let pool = test_pool().await;

        let err = send_message(&pool, "u_a", "u_b", "  ").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let msg = send_message(&pool, "u_a", "u_b", " hello ").await.unwrap();
        assert_eq!(msg.text, "hello");
        assert!(msg.id.starts_with("m_"));
    }

    #[tokio::test]
    async fn pair_listing_covers_both_directions_in_order() {
        let pool = test_pool().await;
        send_message(&pool, "u_a", "u_b", "one").await.unwrap();
        send_message(&pool, "u_b", "u_a", "two").await.unwrap();
        send_message(&pool, "u_a", "u_c", "other pair").await.unwrap();

        let messages = list_messages(&pool, "u_a", "u_b").await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn threads_aggregate_latest_per_counterparty() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role, created_at)
             VALUES ('u_b', 'b@example.com', '', 'Bea', 'Ng', 'engineer', ?)",
        )
        .bind(now_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        send_message(&pool, "u_a", "u_b", "first").await.unwrap();
        send_message(&pool, "u_b", "u_a", "reply").await.unwrap();
        send_message(&pool, "u_c", "u_a", "newest thread").await.unwrap();

        let threads = list_threads(&pool, "u_a").await.unwrap();
        assert_eq!(threads.len(), 2);
        // Newest conversation first
        assert_eq!(threads[0].other_user_id, "u_c");
        assert!(threads[0].name.is_none());
        assert_eq!(threads[1].other_user_id, "u_b");
        assert_eq!(threads[1].name.as_deref(), Some("Bea Ng"));
        assert_eq!(threads[1].other_email.as_deref(), Some("b@example.com"));
    }
}
