use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SpeakerError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Speaker not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Speaker {
    pub id: Uuid,
    pub full_name: String,
    pub bio: String,
    pub short_bio: String,
    pub twitter: String,
    pub github: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub display_position: i64,
    pub is_public: bool,
    pub pretalx_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct CreateSpeaker {
    pub full_name: String,
    pub bio: String,
    pub short_bio: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub display_position: Option<i64>,
    pub is_public: Option<bool>,
    pub pretalx_code: Option<String>,
}

impl Speaker {
    pub async fn create(executor: impl SqliteExecutor<'_>, data: CreateSpeaker) -> Result<Self, SpeakerError> {
        let id = Uuid::new_v4();

        let speaker = sqlx::query_as::<_, Speaker>(
            r#"
            INSERT INTO speakers (
                id, full_name, bio, short_bio, twitter, github, email,
                photo_url, display_position, is_public, pretalx_code
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.full_name)
        .bind(&data.bio)
        .bind(data.short_bio.unwrap_or_default())
        .bind(data.twitter.unwrap_or_default())
        .bind(data.github.unwrap_or_default())
        .bind(data.email.unwrap_or_default())
        .bind(&data.photo_url)
        .bind(data.display_position.unwrap_or(0))
        .bind(data.is_public.unwrap_or(false))
        .bind(&data.pretalx_code)
        .fetch_one(executor)
        .await?;

        Ok(speaker)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Self, SpeakerError> {
        sqlx::query_as::<_, Speaker>(r#"SELECT * FROM speakers WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(SpeakerError::NotFound)
    }

    pub async fn find_public(pool: &SqlitePool) -> Result<Vec<Self>, SpeakerError> {
        let speakers = sqlx::query_as::<_, Speaker>(
            r#"SELECT * FROM speakers WHERE is_public = 1 ORDER BY full_name"#,
        )
        .fetch_all(pool)
        .await?;

        Ok(speakers)
    }

    /// All speakers carrying a pretalx code, keyed for reconciliation.
    pub async fn find_synced(pool: &SqlitePool) -> Result<Vec<Self>, SpeakerError> {
        let speakers = sqlx::query_as::<_, Speaker>(
            r#"SELECT * FROM speakers WHERE pretalx_code IS NOT NULL"#,
        )
        .fetch_all(pool)
        .await?;

        Ok(speakers)
    }

    /// Write back the subset of fields owned by the pretalx sync.
    pub async fn update_synced_fields(&self, executor: impl SqliteExecutor<'_>) -> Result<(), SpeakerError> {
        sqlx::query(
            r#"
            UPDATE speakers
            SET full_name = ?2, bio = ?3, email = ?4, photo_url = ?5,
                updated_at = datetime('now','subsec')
            WHERE id = ?1
            "#,
        )
        .bind(self.id)
        .bind(&self.full_name)
        .bind(&self.bio)
        .bind(&self.email)
        .bind(&self.photo_url)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_for_talk(pool: &SqlitePool, talk_id: Uuid) -> Result<Vec<Self>, SpeakerError> {
        let speakers = sqlx::query_as::<_, Speaker>(
            r#"
            SELECT s.* FROM speakers s
            JOIN talk_speakers ts ON ts.speaker_id = s.id
            WHERE ts.talk_id = ?1
            ORDER BY s.full_name
            "#,
        )
        .bind(talk_id)
        .fetch_all(pool)
        .await?;

        Ok(speakers)
    }

    pub async fn find_for_workshop(
        pool: &SqlitePool,
        workshop_id: Uuid,
    ) -> Result<Vec<Self>, SpeakerError> {
        let speakers = sqlx::query_as::<_, Speaker>(
            r#"
            SELECT s.* FROM speakers s
            JOIN workshop_speakers ws ON ws.speaker_id = s.id
            WHERE ws.workshop_id = ?1
            ORDER BY s.full_name
            "#,
        )
        .bind(workshop_id)
        .fetch_all(pool)
        .await?;

        Ok(speakers)
    }
}

/// Replace the speaker set of a talk with the given speakers.
pub async fn set_talk_speakers(
    pool: &SqlitePool,
    talk_id: Uuid,
    speaker_ids: &[Uuid],
) -> Result<(), SpeakerError> {
    let mut tx = pool.begin().await?;
    sqlx::query(r#"DELETE FROM talk_speakers WHERE talk_id = ?1"#)
        .bind(talk_id)
        .execute(&mut *tx)
        .await?;
    for speaker_id in speaker_ids {
        sqlx::query(
            r#"INSERT OR IGNORE INTO talk_speakers (speaker_id, talk_id) VALUES (?1, ?2)"#,
        )
        .bind(speaker_id)
        .bind(talk_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Replace the speaker set of a workshop with the given speakers.
pub async fn set_workshop_speakers(
    pool: &SqlitePool,
    workshop_id: Uuid,
    speaker_ids: &[Uuid],
) -> Result<(), SpeakerError> {
    let mut tx = pool.begin().await?;
    sqlx::query(r#"DELETE FROM workshop_speakers WHERE workshop_id = ?1"#)
        .bind(workshop_id)
        .execute(&mut *tx)
        .await?;
    for speaker_id in speaker_ids {
        sqlx::query(
            r#"INSERT OR IGNORE INTO workshop_speakers (speaker_id, workshop_id) VALUES (?1, ?2)"#,
        )
        .bind(speaker_id)
        .bind(workshop_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::talk::{CreateTalk, Talk};
    use crate::models::test_utils::setup_test_pool;

    #[tokio::test]
    async fn create_and_associate_speaker() {
        let pool = setup_test_pool().await;

        let speaker = Speaker::create(
            &pool,
            CreateSpeaker {
                full_name: "Ada Lovelace".into(),
                bio: "Wrote the first program.".into(),
                is_public: Some(true),
                pretalx_code: Some("SPK001".into()),
                ..Default::default()
            },
        )
        .await
        .expect("failed to create speaker");

        let talk = Talk::create(
            &pool,
            CreateTalk {
                title: "Analytical Engines".into(),
                pretalx_code: Some("AB12CD".into()),
                ..Default::default()
            },
        )
        .await
        .expect("failed to create talk");

        set_talk_speakers(&pool, talk.id, &[speaker.id])
            .await
            .expect("failed to set speakers");

        let speakers = Speaker::find_for_talk(&pool, talk.id)
            .await
            .expect("lookup failed");
        assert_eq!(speakers.len(), 1);
        assert_eq!(speakers[0].full_name, "Ada Lovelace");

        // Replacing the set removes the old association.
        set_talk_speakers(&pool, talk.id, &[]).await.unwrap();
        let speakers = Speaker::find_for_talk(&pool, talk.id).await.unwrap();
        assert!(speakers.is_empty());
    }

    #[tokio::test]
    async fn public_listing_excludes_private_speakers() {
        let pool = setup_test_pool().await;

        Speaker::create(
            &pool,
            CreateSpeaker {
                full_name: "Visible".into(),
                bio: String::new(),
                is_public: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Speaker::create(
            &pool,
            CreateSpeaker {
                full_name: "Hidden".into(),
                bio: String::new(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let public = Speaker::find_public(&pool).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].full_name, "Visible");
    }
}
