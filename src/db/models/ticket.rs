//! Ticket lifecycle: visit tickets, their checklist snapshot and notes.
//!
//! A ticket's checklist is copied once from an issue template via
//! [`bootstrap_steps`] and from then on lives independently of the
//! template. Bootstrap is idempotent by presence: once any step exists
//! for a ticket, later calls return the existing rows untouched
//! regardless of their input. Callers should treat that silent no-op as
//! documented behavior.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{DbPool, StoreError, User};
use crate::utils::{new_id, now_rfc3339};

pub const STATUS_OPEN: &str = "open";
pub const STATUS_CLOSED: &str = "closed";

pub const RESULT_PASS: &str = "pass";
pub const RESULT_FAIL: &str = "fail";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: String,
    pub status: String,
    pub site: Option<String>,
    pub visit_date: Option<String>,
    pub category_id: Option<String>,
    pub issue_id: Option<String>,
    pub issue_text: Option<String>,
    pub engineer_user_id: Option<String>,
    pub created_by_user_id: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// Ticket row denormalized with live joins for list views and reports.
/// Names are resolved at read time, so renaming a category or issue
/// retroactively changes what historical tickets show.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketListRow {
    pub id: String,
    pub status: String,
    pub site: Option<String>,
    pub visit_date: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub issue_id: Option<String>,
    pub issue_title: Option<String>,
    pub issue_description: Option<String>,
    pub description: Option<String>,
    pub engineer_user_id: Option<String>,
    pub engineer_first_name: Option<String>,
    pub engineer_last_name: Option<String>,
    pub engineer_email: Option<String>,
    pub created_by_user_id: Option<String>,
    pub creator_first_name: Option<String>,
    pub creator_last_name: Option<String>,
    pub creator_email: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketStep {
    pub id: String,
    pub ticket_id: String,
    pub step_text: String,
    pub step_index: Option<i64>,
    pub result: Option<String>,
    pub checked_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketNote {
    pub id: String,
    pub ticket_id: String,
    pub note_text: String,
    pub created_at: String,
}

/// Every field is optional: the store persists whatever it is given.
/// The client is the layer that insists on a category and description.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTicketRequest {
    pub site: Option<String>,
    pub visit_date: Option<String>,
    pub engineer_user_id: Option<String>,
    pub category_id: Option<String>,
    pub issue_id: Option<String>,
    #[serde(alias = "issue_text")]
    pub description: Option<String>,
}

const TICKET_LIST_SQL: &str = "
    SELECT
        t.id, t.status, t.site, t.visit_date,
        t.category_id, c.name AS category_name,
        t.issue_id, i.title AS issue_title, i.description AS issue_description,
        t.issue_text AS description,
        t.engineer_user_id,
        u.first_name AS engineer_first_name, u.last_name AS engineer_last_name,
        u.email AS engineer_email,
        t.created_by_user_id,
        cu.first_name AS creator_first_name, cu.last_name AS creator_last_name,
        cu.email AS creator_email,
        t.created_at, t.completed_at
    FROM tickets t
    LEFT JOIN categories c ON c.id = t.category_id
    LEFT JOIN issues i ON i.id = t.issue_id
    LEFT JOIN users u ON u.id = t.engineer_user_id
    LEFT JOIN users cu ON cu.id = t.created_by_user_id
";

/// Steps in checklist order: explicit ordinal first, legacy rows
/// without one sort last by age.
const STEP_ORDER_SQL: &str = "
    SELECT * FROM ticket_steps
    WHERE ticket_id = ?
    ORDER BY (step_index IS NULL), step_index ASC, created_at ASC
";

/// List tickets visible to the actor: admins see everything, everyone
/// else sees tickets they created or are assigned to. The predicate is
/// applied here, at the query boundary, and nowhere else.
pub async fn list_tickets(pool: &DbPool, actor: &User) -> Result<Vec<TicketListRow>, StoreError> {
    let rows = if actor.is_admin() {
        let sql = format!("{TICKET_LIST_SQL} ORDER BY t.created_at DESC");
        sqlx::query_as::<_, TicketListRow>(&sql).fetch_all(pool).await?
    } else {
        let sql = format!(
            "{TICKET_LIST_SQL}
             WHERE t.engineer_user_id = ?1 OR t.created_by_user_id = ?1
             ORDER BY t.created_at DESC"
        );
        sqlx::query_as::<_, TicketListRow>(&sql)
            .bind(&actor.id)
            .fetch_all(pool)
            .await?
    };
    Ok(rows)
}

pub async fn get_ticket(pool: &DbPool, id: &str) -> Result<Ticket, StoreError> {
    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("ticket"))
}

/// Denormalized single-ticket read used by the report.
pub async fn get_ticket_row(pool: &DbPool, id: &str) -> Result<TicketListRow, StoreError> {
    let sql = format!("{TICKET_LIST_SQL} WHERE t.id = ?");
    sqlx::query_as::<_, TicketListRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("ticket"))
}

pub async fn create_ticket(
    pool: &DbPool,
    req: CreateTicketRequest,
    created_by: Option<&str>,
) -> Result<Ticket, StoreError> {
    let ticket = Ticket {
        id: new_id("t_"),
        status: STATUS_OPEN.to_string(),
        site: req.site,
        visit_date: req.visit_date,
        category_id: req.category_id,
        issue_id: req.issue_id,
        issue_text: req.description,
        engineer_user_id: req.engineer_user_id,
        created_by_user_id: created_by.map(Into::into),
        created_at: now_rfc3339(),
        completed_at: None,
    };

    sqlx::query(
        "INSERT INTO tickets (
            id, status, site, visit_date, category_id, issue_id, issue_text,
            engineer_user_id, created_by_user_id, created_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ticket.id)
    .bind(&ticket.status)
    .bind(&ticket.site)
    .bind(&ticket.visit_date)
    .bind(&ticket.category_id)
    .bind(&ticket.issue_id)
    .bind(&ticket.issue_text)
    .bind(&ticket.engineer_user_id)
    .bind(&ticket.created_by_user_id)
    .bind(&ticket.created_at)
    .bind(&ticket.completed_at)
    .execute(pool)
    .await?;

    Ok(ticket)
}

/// Overwrite the ticket status. Closing stamps completed_at with the
/// write time (re-closing refreshes it); reopening clears it. There is
/// no transition history.
pub async fn set_ticket_status(
    pool: &DbPool,
    id: &str,
    status: &str,
) -> Result<Ticket, StoreError> {
    let status = status.trim();
    if status != STATUS_OPEN && status != STATUS_CLOSED {
        return Err(StoreError::InvalidArgument(
            "status must be open|closed".into(),
        ));
    }

    let completed_at = if status == STATUS_CLOSED {
        Some(now_rfc3339())
    } else {
        None
    };

    let updated = sqlx::query("UPDATE tickets SET status = ?, completed_at = ? WHERE id = ?")
        .bind(status)
        .bind(&completed_at)
        .bind(id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("ticket"));
    }

    get_ticket(pool, id).await
}

pub async fn list_steps(pool: &DbPool, ticket_id: &str) -> Result<Vec<TicketStep>, StoreError> {
    let rows = sqlx::query_as::<_, TicketStep>(STEP_ORDER_SQL)
        .bind(ticket_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Copy checklist steps onto a ticket, once.
///
/// The read-check-insert runs inside a single transaction, and the
/// unique index on (ticket_id, step_index) backs it up: of two
/// concurrent bootstraps one inserts, the other either sees the rows
/// or fails the index and surfaces as a conflict.
pub async fn bootstrap_steps(
    pool: &DbPool,
    ticket_id: &str,
    steps: &[String],
) -> Result<Vec<TicketStep>, StoreError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, TicketStep>(STEP_ORDER_SQL)
        .bind(ticket_id)
        .fetch_all(&mut *tx)
        .await?;
    if !existing.is_empty() {
        tx.commit().await?;
        return Ok(existing);
    }

    let created_at = now_rfc3339();
    for (index, text) in steps
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
    {
        sqlx::query(
            "INSERT INTO ticket_steps (id, ticket_id, step_text, step_index, result, checked_at, created_at)
             VALUES (?, ?, ?, ?, NULL, NULL, ?)",
        )
        .bind(new_id("ts_"))
        .bind(ticket_id)
        .bind(text)
        .bind(index as i64)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }

    let rows = sqlx::query_as::<_, TicketStep>(STEP_ORDER_SQL)
        .bind(ticket_id)
        .fetch_all(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(rows)
}

/// Record a step outcome: Some(true) passes, Some(false) fails, None
/// clears it. The row is matched by both step and ticket id so a step
/// id from another ticket cannot be hit.
pub async fn update_step_result(
    pool: &DbPool,
    ticket_id: &str,
    step_id: &str,
    result: Option<bool>,
) -> Result<TicketStep, StoreError> {
    let (result, checked_at) = match result {
        Some(true) => (Some(RESULT_PASS), Some(now_rfc3339())),
        Some(false) => (Some(RESULT_FAIL), Some(now_rfc3339())),
        None => (None, None),
    };

    let updated = sqlx::query(
        "UPDATE ticket_steps SET result = ?, checked_at = ? WHERE id = ? AND ticket_id = ?",
    )
    .bind(result)
    .bind(&checked_at)
    .bind(step_id)
    .bind(ticket_id)
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("step"));
    }

    let step = sqlx::query_as::<_, TicketStep>(
        "SELECT * FROM ticket_steps WHERE id = ? AND ticket_id = ?",
    )
    .bind(step_id)
    .bind(ticket_id)
    .fetch_one(pool)
    .await?;
    Ok(step)
}

pub async fn add_note(
    pool: &DbPool,
    ticket_id: &str,
    text: &str,
) -> Result<TicketNote, StoreError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(StoreError::InvalidArgument("note_text is required".into()));
    }

    let note = TicketNote {
        id: new_id("tn_"),
        ticket_id: ticket_id.to_string(),
        note_text: text.to_string(),
        created_at: now_rfc3339(),
    };

    sqlx::query("INSERT INTO ticket_notes (id, ticket_id, note_text, created_at) VALUES (?, ?, ?, ?)")
        .bind(&note.id)
        .bind(&note.ticket_id)
        .bind(&note.note_text)
        .bind(&note.created_at)
        .execute(pool)
        .await?;

    Ok(note)
}

pub async fn list_notes(pool: &DbPool, ticket_id: &str) -> Result<Vec<TicketNote>, StoreError> {
    let rows = sqlx::query_as::<_, TicketNote>(
        "SELECT * FROM ticket_notes WHERE ticket_id = ? ORDER BY created_at ASC",
    )
    .bind(ticket_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::user::{ROLE_ADMIN, ROLE_ENGINEER};
    use crate::db::test_pool;

    async fn seed_user(pool: &DbPool, id: &str, role: &str) -> User {
        let user = User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            password_hash: String::new(),
            first_name: Some("Test".into()),
            last_name: Some(id.to_string()),
            role: role.to_string(),
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
        .execute(pool)
        .await
        .unwrap();
        user
    }

    fn steps(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn create_is_permissive_and_defaults_open() {
        let pool = test_pool().await;

        let ticket = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(ticket.status, STATUS_OPEN);
        assert!(ticket.completed_at.is_none());
        assert!(ticket.site.is_none());
        assert!(ticket.id.starts_with("t_"));
    }

    #[tokio::test]
    async fn status_overwrite_couples_completed_at() {
        let pool = test_pool().await;
        let ticket = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();

        let closed = set_ticket_status(&pool, &ticket.id, "closed").await.unwrap();
        assert_eq!(closed.status, STATUS_CLOSED);
        let first_completed = closed.completed_at.clone().unwrap();

        // Re-closing refreshes the timestamp rather than failing
        let reclosed = set_ticket_status(&pool, &ticket.id, "closed").await.unwrap();
        assert!(reclosed.completed_at.is_some());
        assert!(reclosed.completed_at.unwrap() >= first_completed);

        let reopened = set_ticket_status(&pool, &ticket.id, "open").await.unwrap();
        assert_eq!(reopened.status, STATUS_OPEN);
        assert!(reopened.completed_at.is_none());

        let err = set_ticket_status(&pool, &ticket.id, "done").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = set_ticket_status(&pool, "t_missing", "open").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("ticket")));
    }

    #[tokio::test]
    async fn bootstrap_orders_filters_and_is_idempotent_by_presence() {
        let pool = test_pool().await;
        let ticket = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();

        let first = bootstrap_steps(&pool, &ticket.id, &steps(&[" A ", "", "B", "   ", "C"]))
            .await
            .unwrap();
        let texts: Vec<&str> = first.iter().map(|s| s.step_text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        let indexes: Vec<Option<i64>> = first.iter().map(|s| s.step_index).collect();
        assert_eq!(indexes, vec![Some(0), Some(1), Some(2)]);
        assert!(first.iter().all(|s| s.result.is_none() && s.checked_at.is_none()));

        // Second call with different input is a no-op
        let second = bootstrap_steps(&pool, &ticket.id, &steps(&["X", "Y"])).await.unwrap();
        let texts: Vec<&str> = second.iter().map(|s| s.step_text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);

        let listed = list_steps(&pool, &ticket.id).await.unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn legacy_steps_without_ordinal_sort_last() {
        let pool = test_pool().await;
        let ticket = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();

        // A pre-ordinal row, older than everything else
        sqlx::query(
            "INSERT INTO ticket_steps (id, ticket_id, step_text, step_index, created_at)
             VALUES ('ts_legacy', ?, 'Legacy check', NULL, '2020-01-01T00:00:00+00:00')",
        )
        .bind(&ticket.id)
        .execute(&pool)
        .await
        .unwrap();

        // Presence of the legacy row means bootstrap must not add more
        let rows = bootstrap_steps(&pool, &ticket.id, &steps(&["New"])).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].step_text, "Legacy check");

        // Indexed rows sort before the legacy row despite being newer
        sqlx::query(
            "INSERT INTO ticket_steps (id, ticket_id, step_text, step_index, created_at)
             VALUES ('ts_new', ?, 'Indexed check', 0, ?)",
        )
        .bind(&ticket.id)
        .bind(now_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        let ordered = list_steps(&pool, &ticket.id).await.unwrap();
        let texts: Vec<&str> = ordered.iter().map(|s| s.step_text.as_str()).collect();
        assert_eq!(texts, vec!["Indexed check", "Legacy check"]);
    }

    #[tokio::test]
    async fn step_result_sets_and_clears_checked_at() {
        let pool = test_pool().await;
        let ticket = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();
        let rows = bootstrap_steps(&pool, &ticket.id, &steps(&["A"])).await.unwrap();
        let step_id = rows[0].id.clone();

        let passed = update_step_result(&pool, &ticket.id, &step_id, Some(true))
            .await
            .unwrap();
        assert_eq!(passed.result.as_deref(), Some(RESULT_PASS));
        assert!(passed.checked_at.is_some());

        let failed = update_step_result(&pool, &ticket.id, &step_id, Some(false))
            .await
            .unwrap();
        assert_eq!(failed.result.as_deref(), Some(RESULT_FAIL));

        let cleared = update_step_result(&pool, &ticket.id, &step_id, None).await.unwrap();
        assert!(cleared.result.is_none());
        assert!(cleared.checked_at.is_none());

        // A step id from another ticket must not match
        let other = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();
        let err = update_step_result(&pool, &other.id, &step_id, Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("step")));
    }

    #[tokio::test]
    async fn notes_trim_reject_blank_and_list_in_order() {
        let pool = test_pool().await;
        let ticket = create_ticket(&pool, CreateTicketRequest::default(), None)
            .await
            .unwrap();

        let err = add_note(&pool, &ticket.id, "   ").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let first = add_note(&pool, &ticket.id, " hi ").await.unwrap();
        assert_eq!(first.note_text, "hi");
        let second = add_note(&pool, &ticket.id, "second").await.unwrap();

        let notes = list_notes(&pool, &ticket.id).await.unwrap();
        let texts: Vec<&str> = notes.iter().map(|n| n.note_text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "second"]);
        assert_eq!(notes[0].id, first.id);
        assert_eq!(notes[1].id, second.id);
    }

    #[tokio::test]
    async fn visibility_scopes_to_engineer_or_creator_unless_admin() {
        let pool = test_pool().await;
        let admin = seed_user(&pool, "u_admin", ROLE_ADMIN).await;
        let creator = seed_user(&pool, "u_creator", ROLE_ENGINEER).await;
        let assignee = seed_user(&pool, "u_assignee", ROLE_ENGINEER).await;
        let stranger = seed_user(&pool, "u_stranger", ROLE_ENGINEER).await;

        create_ticket(
            &pool,
            CreateTicketRequest {
                engineer_user_id: Some(assignee.id.clone()),
                ..Default::default()
            },
            Some(&creator.id),
        )
        .await
        .unwrap();

        assert_eq!(list_tickets(&pool, &admin).await.unwrap().len(), 1);
        assert_eq!(list_tickets(&pool, &creator).await.unwrap().len(), 1);
        assert_eq!(list_tickets(&pool, &assignee).await.unwrap().len(), 1);
        assert!(list_tickets(&pool, &stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_rows_join_names_live() {
        let pool = test_pool().await;
        let admin = seed_user(&pool, "u_admin", ROLE_ADMIN).await;
        let cat = crate::db::create_category(&pool, "Lighting", None).await.unwrap();

        create_ticket(
            &pool,
            CreateTicketRequest {
                category_id: Some(cat.id.clone()),
                description: Some("Lobby lights flicker".into()),
                ..Default::default()
            },
            Some(&admin.id),
        )
        .await
        .unwrap();

        let rows = list_tickets(&pool, &admin).await.unwrap();
        assert_eq!(rows[0].category_name.as_deref(), Some("Lighting"));
        assert_eq!(rows[0].description.as_deref(), Some("Lobby lights flicker"));
        assert_eq!(rows[0].creator_email.as_deref(), Some("u_admin@example.com"));

        // Renames propagate to already-created tickets
        crate::db::rename_category(&pool, &cat.id, "Electrical").await.unwrap();
        let rows = list_tickets(&pool, &admin).await.unwrap();
        assert_eq!(rows[0].category_name.as_deref(), Some("Electrical"));
    }
}
