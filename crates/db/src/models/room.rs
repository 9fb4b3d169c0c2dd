use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Room not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Room {
    pub id: Uuid,
    pub label: String,
    pub slug: String,
    #[sqlx(rename = "display_order")]
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateRoom {
    pub label: String,
    pub slug: String,
    pub order: i64,
}

impl Room {
    pub async fn create(pool: &SqlitePool, data: CreateRoom) -> Result<Self, RoomError> {
        let id = Uuid::new_v4();

        let room = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (id, label, slug, display_order)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.label)
        .bind(&data.slug)
        .bind(data.order)
        .fetch_one(pool)
        .await?;

        Ok(room)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, RoomError> {
        let rooms = sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms ORDER BY display_order"#)
            .fetch_all(pool)
            .await?;

        Ok(rooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::setup_test_pool;

    #[tokio::test]
    async fn rooms_ordered_by_display_order() {
        let pool = setup_test_pool().await;

        Room::create(
            &pool,
            CreateRoom {
                label: "Club".into(),
                slug: "club".into(),
                order: 20,
            },
        )
        .await
        .unwrap();
        Room::create(
            &pool,
            CreateRoom {
                label: "Main Hall".into(),
                slug: "main-hall".into(),
                order: 10,
            },
        )
        .await
        .unwrap();

        let rooms = Room::find_all(&pool).await.unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].label, "Main Hall");
    }
}
