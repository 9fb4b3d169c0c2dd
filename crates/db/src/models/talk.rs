use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TalkError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Talk not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Talk {
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
    pub video_id: String,
    pub is_keynote: bool,
    pub pretalx_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct CreateTalk {
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
    pub video_id: Option<String>,
    pub is_keynote: Option<bool>,
    pub pretalx_code: Option<String>,
}

impl Talk {
    pub async fn create(executor: impl SqliteExecutor<'_>, data: CreateTalk) -> Result<Self, TalkError> {
        let id = Uuid::new_v4();

        let talk = sqlx::query_as::<_, Talk>(
            r#"
            INSERT INTO talks (
                id, title, abstract, language, difficulty, session_type,
                display_order, is_public, is_backup, in_data_track,
                video_id, is_keynote, pretalx_code
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(data.abstract_text.unwrap_or_default())
        .bind(data.language.unwrap_or_else(|| "en".to_string()))
        .bind(data.difficulty.unwrap_or_else(|| "beginner".to_string()))
        .bind(data.session_type.unwrap_or_else(|| "talk".to_string()))
        .bind(data.order.unwrap_or(0))
        .bind(data.is_public.unwrap_or(false))
        .bind(data.is_backup.unwrap_or(false))
        .bind(data.in_data_track.unwrap_or(false))
        .bind(data.video_id.unwrap_or_default())
        .bind(data.is_keynote.unwrap_or(false))
        .bind(&data.pretalx_code)
        .fetch_one(executor)
        .await?;

        Ok(talk)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Self, TalkError> {
        sqlx::query_as::<_, Talk>(r#"SELECT * FROM talks WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(TalkError::NotFound)
    }

    /// Public, non-backup talks in display order.
    pub async fn find_public(pool: &SqlitePool) -> Result<Vec<Self>, TalkError> {
        let talks = sqlx::query_as::<_, Talk>(
            r#"
            SELECT * FROM talks
            WHERE is_public = 1 AND is_backup = 0
            ORDER BY display_order
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(talks)
    }

    /// Whether unpublished non-backup talks still exist.
    pub async fn has_unpublished(pool: &SqlitePool) -> Result<bool, TalkError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM talks WHERE is_public = 0 AND is_backup = 0"#,
        )
        .fetch_one(pool)
        .await?;

        Ok(count > 0)
    }

    /// All talks carrying a pretalx code, keyed for reconciliation.
    pub async fn find_synced(pool: &SqlitePool) -> Result<Vec<Self>, TalkError> {
        let talks =
            sqlx::query_as::<_, Talk>(r#"SELECT * FROM talks WHERE pretalx_code IS NOT NULL"#)
                .fetch_all(pool)
                .await?;

        Ok(talks)
    }

    pub async fn max_order(pool: &SqlitePool) -> Result<i64, TalkError> {
        let max: i64 = sqlx::query_scalar(r#"SELECT COALESCE(MAX(display_order), 0) FROM talks"#)
            .fetch_one(pool)
            .await?;

        Ok(max)
    }

    /// Write back the subset of fields owned by the pretalx sync.
    pub async fn update_synced_fields(&self, executor: impl SqliteExecutor<'_>) -> Result<(), TalkError> {
        sqlx::query(
            r#"
            UPDATE talks
            SET title = ?2, abstract = ?3, language = ?4, difficulty = ?5,
                session_type = ?6, updated_at = datetime('now','subsec')
            WHERE id = ?1
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.abstract_text)
        .bind(&self.language)
        .bind(&self.difficulty)
        .bind(&self.session_type)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::setup_test_pool;

    #[tokio::test]
    async fn public_listing_and_unpublished_flag() {
        let pool = setup_test_pool().await;

        Talk::create(
            &pool,
            CreateTalk {
                title: "Second".into(),
                order: Some(20),
                is_public: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Talk::create(
            &pool,
            CreateTalk {
                title: "First".into(),
                order: Some(10),
                is_public: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Talk::create(
            &pool,
            CreateTalk {
                title: "Draft".into(),
                order: Some(30),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let public = Talk::find_public(&pool).await.unwrap();
        assert_eq!(public.len(), 2);
        assert_eq!(public[0].title, "First");
        assert_eq!(public[1].title, "Second");
        assert!(Talk::has_unpublished(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn synced_fields_update() {
        let pool = setup_test_pool().await;

        let mut talk = Talk::create(
            &pool,
            CreateTalk {
                title: "Old title".into(),
                pretalx_code: Some("XY34ZW".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        talk.title = "New title".into();
        talk.difficulty = "advanced".into();
        talk.update_synced_fields(&pool).await.unwrap();

        let fetched = Talk::find_by_id(&pool, talk.id).await.unwrap();
        assert_eq!(fetched.title, "New title");
        assert_eq!(fetched.difficulty, "advanced");

        assert_eq!(Talk::max_order(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn writes_follow_the_caller_transaction() {
        let pool = setup_test_pool().await;

        let mut tx = pool.begin().await.unwrap();
        Talk::create(
            &mut *tx,
            CreateTalk {
                title: "Never lands".into(),
                pretalx_code: Some("AB12CD".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();
        assert!(Talk::find_synced(&pool).await.unwrap().is_empty());

        let mut tx = pool.begin().await.unwrap();
        let mut talk = Talk::create(
            &mut *tx,
            CreateTalk {
                title: "Lands".into(),
                pretalx_code: Some("AB12CD".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        talk.title = "Lands, renamed".into();
        talk.update_synced_fields(&mut *tx).await.unwrap();
        tx.commit().await.unwrap();

        let synced = Talk::find_synced(&pool).await.unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].title, "Lands, renamed");
    }
}
