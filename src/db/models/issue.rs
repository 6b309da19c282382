//! Issue templates: a reusable description, a newline-joined checklist
//! and a solution write-up, grouped under a category.
//!
//! steps_text stays opaque here. Splitting it into discrete checklist
//! steps happens when a ticket bootstraps, not at the catalog level.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{DbPool, StoreError};
use crate::utils::{new_id, now_rfc3339};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: Option<String>,
    pub steps_text: Option<String>,
    pub solution: Option<String>,
    pub created_at: String,
}

impl Issue {
    /// Checklist steps for ticket bootstrap: split on newlines, trimmed,
    /// blanks dropped.
    pub fn steps(&self) -> Vec<String> {
        self.steps_text
            .as_deref()
            .unwrap_or("")
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Into::into)
            .collect()
    }
}

/// Issue joined with its category name for list views.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IssueListRow {
    pub id: String,
    pub category_id: String,
    pub category_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub steps_text: Option<String>,
    pub solution: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub category_id: String,
    pub title: String,
    pub description: Option<String>,
    pub steps_text: Option<String>,
    pub solution: Option<String>,
}

/// Partial update: None keeps the current value; explicit strings
/// (including empty ones for the optional text fields) overwrite.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateIssueRequest {
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub steps_text: Option<String>,
    pub solution: Option<String>,
}

const ISSUE_LIST_SQL: &str = "
    SELECT i.id, i.category_id, c.name AS category_name, i.title,
           i.description, i.steps_text, i.solution, i.created_at
    FROM issues i
    LEFT JOIN categories c ON c.id = i.category_id
";

pub async fn list_issues(
    pool: &DbPool,
    category_id: Option<&str>,
) -> Result<Vec<IssueListRow>, StoreError> {
    let rows = match category_id {
        Some(category_id) => {
            let sql = format!("{ISSUE_LIST_SQL} WHERE i.category_id = ? ORDER BY i.created_at DESC");
            sqlx::query_as::<_, IssueListRow>(&sql)
                .bind(category_id)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("{ISSUE_LIST_SQL} ORDER BY i.created_at DESC");
            sqlx::query_as::<_, IssueListRow>(&sql).fetch_all(pool).await?
        }
    };
    Ok(rows)
}

pub async fn get_issue(pool: &DbPool, id: &str) -> Result<Issue, StoreError> {
    sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound("issue"))
}

pub async fn create_issue(pool: &DbPool, req: CreateIssueRequest) -> Result<Issue, StoreError> {
    let category_id = req.category_id.trim();
    let title = req.title.trim();
    if category_id.is_empty() {
        return Err(StoreError::InvalidArgument("category_id is required".into()));
    }
    if title.is_empty() {
        return Err(StoreError::InvalidArgument("title is required".into()));
    }

    let issue = Issue {
        id: new_id("i_"),
        category_id: category_id.to_string(),
        title: title.to_string(),
        description: req.description,
        steps_text: req.steps_text,
        solution: req.solution,
        created_at: now_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO issues (id, category_id, title, description, steps_text, solution, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&issue.id)
    .bind(&issue.category_id)
    .bind(&issue.title)
    .bind(&issue.description)
    .bind(&issue.steps_text)
    .bind(&issue.solution)
    .bind(&issue.created_at)
    .execute(pool)
    .await?;

    Ok(issue)
}

pub async fn update_issue(
    pool: &DbPool,
    id: &str,
    req: UpdateIssueRequest,
) -> Result<Issue, StoreError> {
    let current = get_issue(pool, id).await?;

    let category_id = req
        .category_id
        .map(|s| s.trim().to_string())
        .unwrap_or(current.category_id);
    let title = req.title.map(|s| s.trim().to_string()).unwrap_or(current.title);
    let description = req.description.or(current.description);
    let steps_text = req.steps_text.or(current.steps_text);
    let solution = req.solution.or(current.solution);

    // The merged record must still carry a category and a title.
    if category_id.is_empty() {
        return Err(StoreError::InvalidArgument("category_id is required".into()));
    }
    if title.is_empty() {
        return Err(StoreError::InvalidArgument("title is required".into()));
    }

    sqlx::query(
        "UPDATE issues SET category_id = ?, title = ?, description = ?, steps_text = ?, solution = ?
         WHERE id = ?",
    )
    .bind(&category_id)
    .bind(&title)
    .bind(&description)
    .bind(&steps_text)
    .bind(&solution)
    .bind(id)
    .execute(pool)
    .await?;

    get_issue(pool, id).await
}

pub async fn delete_issue(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    let deleted = sqlx::query("DELETE FROM issues WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(StoreError::NotFound("issue"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::category::create_category;
    use crate::db::test_pool;

    fn new_request(category_id: &str, title: &str) -> CreateIssueRequest {
        CreateIssueRequest {
            category_id: category_id.into(),
            title: title.into(),
            description: None,
            steps_text: None,
            solution: None,
        }
    }

    #[tokio::test]
    async fn create_requires_category_and_title() {
        let pool = test_pool().await;

        let err = create_issue(&pool, new_request("", "Flicker")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = create_issue(&pool, new_request("c_1", "  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let issue = create_issue(&pool, new_request("c_1", " Flicker ")).await.unwrap();
        assert_eq!(issue.title, "Flicker");
        assert!(issue.id.starts_with("i_"));
    }

    #[tokio::test]
    async fn steps_split_trims_and_drops_blanks() {
        let issue = Issue {
            id: "i_1".into(),
            category_id: "c_1".into(),
            title: "t".into(),
            description: None,
            steps_text: Some("  Check breaker \n\n Check bulb\n   \n".into()),
            solution: None,
            created_at: String::new(),
        };
        assert_eq!(issue.steps(), vec!["Check breaker", "Check bulb"]);

        let bare = Issue { steps_text: None, ..issue };
        assert!(bare.steps().is_empty());
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let pool = test_pool().await;
        let issue = create_issue(
            &pool,
            CreateIssueRequest {
                category_id: "c_1".into(),
                title: "Flicker".into(),
                description: Some("old".into()),
                steps_text: Some("a\nb".into()),
                solution: Some("replace".into()),
            },
        )
        .await
        .unwrap();

        let updated = update_issue(
            &pool,
            &issue.id,
            UpdateIssueRequest {
                title: Some("Flickering lights".into()),
                description: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Flickering lights");
        assert_eq!(updated.category_id, "c_1");
        // Explicit empty string clears, None keeps
        assert_eq!(updated.description.as_deref(), Some(""));
        assert_eq!(updated.steps_text.as_deref(), Some("a\nb"));

        let err = update_issue(
            &pool,
            &issue.id,
            UpdateIssueRequest {
                title: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn list_filters_by_category_and_joins_name() {
        let pool = test_pool().await;
        let lighting = create_category(&pool, "Lighting", None).await.unwrap();
        create_issue(&pool, new_request(&lighting.id, "Flicker")).await.unwrap();
        create_issue(&pool, new_request("c_other", "Leak")).await.unwrap();

        let all = list_issues(&pool, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = list_issues(&pool, Some(lighting.id.as_str())).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].category_name.as_deref(), Some("Lighting"));

        // Dangling category reference leaves the name empty, not an error
        let dangling = list_issues(&pool, Some("c_other")).await.unwrap();
        assert_eq!(dangling[0].category_name, None);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let pool = test_pool().await;
        let err = delete_issue(&pool, "i_missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("issue")));
    }
}
