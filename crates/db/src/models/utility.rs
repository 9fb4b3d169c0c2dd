use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UtilityError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Utility not found")]
    NotFound,
}

/// Non-session schedule filler: breaks, sponsor activities, stream-only
/// placeholders.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Utility {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub is_streamed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct CreateUtility {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub is_streamed: Option<bool>,
}

impl Utility {
    pub async fn create(pool: &SqlitePool, data: CreateUtility) -> Result<Self, UtilityError> {
        let id = Uuid::new_v4();

        let utility = sqlx::query_as::<_, Utility>(
            r#"
            INSERT INTO utilities (id, title, slug, description, url, is_streamed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(&data.url)
        .bind(data.is_streamed.unwrap_or(false))
        .fetch_one(pool)
        .await?;

        Ok(utility)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, UtilityError> {
        let utilities =
            sqlx::query_as::<_, Utility>(r#"SELECT * FROM utilities ORDER BY title, id"#)
                .fetch_all(pool)
                .await?;

        Ok(utilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::setup_test_pool;

    #[tokio::test]
    async fn create_and_list_utilities() {
        let pool = setup_test_pool().await;

        Utility::create(
            &pool,
            CreateUtility {
                title: "Lunch".into(),
                slug: "lunch".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Utility::create(
            &pool,
            CreateUtility {
                title: "Lightning talks".into(),
                slug: "lightning-talks".into(),
                is_streamed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let utilities = Utility::find_all(&pool).await.unwrap();
        assert_eq!(utilities.len(), 2);
        assert_eq!(utilities[0].title, "Lightning talks");
        assert!(utilities[0].is_streamed);
    }
}
