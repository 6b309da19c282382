//! Issue categories. Deleting a category does not cascade to its
//! issues; a dangling category_id on an issue is tolerated on read.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{DbPool, StoreError};
use crate::utils::{new_id, now_rfc3339};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub owner_user_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

pub async fn list_categories(pool: &DbPool) -> Result<Vec<Category>, StoreError> {
    let rows = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn create_category(
    pool: &DbPool,
    name: &str,
    owner_user_id: Option<&str>,
) -> Result<Category, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("name is required".into()));
    }

    let category = Category {
        id: new_id("c_"),
        name: name.to_string(),
        owner_user_id: owner_user_id.map(Into::into),
        created_at: now_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO categories (id, name, owner_user_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&category.id)
    .bind(&category.name)
    .bind(&category.owner_user_id)
    .bind(&category.created_at)
    .execute(pool)
    .await?;

    Ok(category)
}

pub async fn rename_category(pool: &DbPool, id: &str, name: &str) -> Result<Category, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("name is required".into()));
    }

    let updated = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("category"));
    }

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(category)
}

pub async fn delete_category(pool: &DbPool, id: &str) -> Result<(), StoreError> {
    let deleted = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(StoreError::NotFound("category"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn create_trims_and_rejects_blank() {
        let pool = test_pool().await;

        let cat = create_category(&pool, "  Lighting  ", Some("u_1")).await.unwrap();
        assert_eq!(cat.name, "Lighting");
        assert!(cat.id.starts_with("c_"));
        assert_eq!(cat.owner_user_id.as_deref(), Some("u_1"));

        let err = create_category(&pool, "   ", None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn list_orders_by_name() {
        let pool = test_pool().await;
        create_category(&pool, "Plumbing", None).await.unwrap();
        create_category(&pool, "Electrical", None).await.unwrap();

        let names: Vec<String> = list_categories(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Electrical", "Plumbing"]);
    }

    #[tokio::test]
    async fn rename_and_delete_missing_are_not_found() {
        let pool = test_pool().await;

        let err = rename_category(&pool, "c_missing", "X").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("category")));

        let err = delete_category(&pool, "c_missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("category")));

        let cat = create_category(&pool, "HVAC", None).await.unwrap();
        let renamed = rename_category(&pool, &cat.id, " Cooling ").await.unwrap();
        assert_eq!(renamed.name, "Cooling");
        delete_category(&pool, &cat.id).await.unwrap();
        assert!(list_categories(&pool).await.unwrap().is_empty());
    }
}
