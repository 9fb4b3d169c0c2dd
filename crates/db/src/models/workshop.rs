use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WorkshopError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Workshop not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Workshop {
    pub id: Uuid,
    pub title: String,
    #[sqlx(rename = "abstract")]
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub language: String,
    pub difficulty: String,
    pub session_type: String,
    #[sqlx(rename = "display_order")]
    pub order: i64,
    pub is_public: bool,
    pub is_backup: bool,
    pub in_data_track: bool,
    pub private_note: String,
    pub requirements: String,
    pub length: String,
    pub registration: String,
    pub is_sold_out: bool,
    pub attendee_limit: Option<i64>,
    pub pretalx_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct CreateWorkshop {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub language: Option<String>,
    pub difficulty: Option<String>,
    pub session_type: Option<String>,
    pub order: Option<i64>,
    pub is_public: Option<bool>,
    pub is_backup: Option<bool>,
    pub in_data_track: Option<bool>,
    pub requirements: Option<String>,
    pub length: Option<String>,
    pub registration: Option<String>,
    pub attendee_limit: Option<i64>,
    pub pretalx_code: Option<String>,
}

impl Workshop {
    pub async fn create(executor: impl SqliteExecutor<'_>, data: CreateWorkshop) -> Result<Self, WorkshopError> {
        let id = Uuid::new_v4();

        let workshop = sqlx::query_as::<_, Workshop>(
            r#"
            INSERT INTO workshops (
                id, title, abstract, language, difficulty, session_type,
                display_order, is_public, is_backup, in_data_track,
                requirements, length, registration, attendee_limit, pretalx_code
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(data.abstract_text.unwrap_or_default())
        .bind(data.language.unwrap_or_else(|| "en".to_string()))
        .bind(data.difficulty.unwrap_or_else(|| "beginner".to_string()))
        .bind(data.session_type.unwrap_or_else(|| "workshop".to_string()))
        .bind(data.order.unwrap_or(0))
        .bind(data.is_public.unwrap_or(false))
        .bind(data.is_backup.unwrap_or(false))
        .bind(data.in_data_track.unwrap_or(false))
        .bind(data.requirements.unwrap_or_default())
        .bind(data.length.unwrap_or_default())
        .bind(data.registration.unwrap_or_else(|| "free".to_string()))
        .bind(data.attendee_limit)
        .bind(&data.pretalx_code)
        .fetch_one(executor)
        .await?;

        Ok(workshop)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Self, WorkshopError> {
        sqlx::query_as::<_, Workshop>(r#"SELECT * FROM workshops WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(WorkshopError::NotFound)
    }

    /// Public, non-backup workshops in display order.
    pub async fn find_public(pool: &SqlitePool) -> Result<Vec<Self>, WorkshopError> {
        let workshops = sqlx::query_as::<_, Workshop>(
            r#"
            SELECT * FROM workshops
            WHERE is_public = 1 AND is_backup = 0
            ORDER BY display_order
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(workshops)
    }

    /// Whether unpublished non-backup workshops still exist.
    pub async fn has_unpublished(pool: &SqlitePool) -> Result<bool, WorkshopError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM workshops WHERE is_public = 0 AND is_backup = 0"#,
        )
        .fetch_one(pool)
        .await?;

        Ok(count > 0)
    }

    /// All workshops carrying a pretalx code, keyed for reconciliation.
    pub async fn find_synced(pool: &SqlitePool) -> Result<Vec<Self>, WorkshopError> {
        let workshops = sqlx::query_as::<_, Workshop>(
            r#"SELECT * FROM workshops WHERE pretalx_code IS NOT NULL"#,
        )
        .fetch_all(pool)
        .await?;

        Ok(workshops)
    }

    pub async fn max_order(pool: &SqlitePool) -> Result<i64, WorkshopError> {
        let max: i64 =
            sqlx::query_scalar(r#"SELECT COALESCE(MAX(display_order), 0) FROM workshops"#)
                .fetch_one(pool)
                .await?;

        Ok(max)
    }

    /// Write back the subset of fields owned by the pretalx sync.
    pub async fn update_synced_fields(&self, executor: impl SqliteExecutor<'_>) -> Result<(), WorkshopError> {
        sqlx::query(
            r#"
            UPDATE workshops
            SET title = ?2, abstract = ?3, language = ?4, difficulty = ?5,
                session_type = ?6, requirements = ?7,
                updated_at = datetime('now','subsec')
            WHERE id = ?1
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.abstract_text)
        .bind(&self.language)
        .bind(&self.difficulty)
        .bind(&self.session_type)
        .bind(&self.requirements)
        .execute(executor)
        .await?;

        Ok(())
    }
}
