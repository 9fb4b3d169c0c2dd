use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SlotError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Slot {0} references more than one of talk/workshop/utility")]
    AmbiguousEvent(Uuid),
    #[error("Slot {0} references no event")]
    MissingEvent(Uuid),
}

/// The event a slot is bound to. A slot carries exactly one variant;
/// rows violating that are rejected when they are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SlotEvent {
    Talk(Uuid),
    Workshop(Uuid),
    Utility(Uuid),
}

impl SlotEvent {
    pub fn from_columns(
        slot_id: Uuid,
        talk_id: Option<Uuid>,
        workshop_id: Option<Uuid>,
        utility_id: Option<Uuid>,
    ) -> Result<Self, SlotError> {
        match (talk_id, workshop_id, utility_id) {
            (Some(id), None, None) => Ok(SlotEvent::Talk(id)),
            (None, Some(id), None) => Ok(SlotEvent::Workshop(id)),
            (None, None, Some(id)) => Ok(SlotEvent::Utility(id)),
            (None, None, None) => Err(SlotError::MissingEvent(slot_id)),
            _ => Err(SlotError::AmbiguousEvent(slot_id)),
        }
    }

    pub fn talk_id(&self) -> Option<Uuid> {
        match self {
            SlotEvent::Talk(id) => Some(*id),
            _ => None,
        }
    }

    pub fn workshop_id(&self) -> Option<Uuid> {
        match self {
            SlotEvent::Workshop(id) => Some(*id),
            _ => None,
        }
    }

    pub fn utility_id(&self) -> Option<Uuid> {
        match self {
            SlotEvent::Utility(id) => Some(*id),
            _ => None,
        }
    }
}

/// A (room, start, end) binding to exactly one event.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Slot {
    pub id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub room_id: Uuid,
    pub event: SlotEvent,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct SlotRow {
    id: Uuid,
    #[sqlx(rename = "starts_at")]
    start: DateTime<Utc>,
    #[sqlx(rename = "ends_at")]
    end: DateTime<Utc>,
    room_id: Uuid,
    talk_id: Option<Uuid>,
    workshop_id: Option<Uuid>,
    utility_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = SlotError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let event =
            SlotEvent::from_columns(row.id, row.talk_id, row.workshop_id, row.utility_id)?;
        Ok(Slot {
            id: row.id,
            start: row.start,
            end: row.end,
            room_id: row.room_id,
            event,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct CreateSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub room_id: Uuid,
    pub event: SlotEvent,
}

impl Slot {
    pub async fn create(pool: &SqlitePool, data: CreateSlot) -> Result<Self, SlotError> {
        let id = Uuid::new_v4();

        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            INSERT INTO slots (id, starts_at, ends_at, room_id, talk_id, workshop_id, utility_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.start)
        .bind(data.end)
        .bind(data.room_id)
        .bind(data.event.talk_id())
        .bind(data.event.workshop_id())
        .bind(data.event.utility_id())
        .fetch_one(pool)
        .await?;

        row.try_into()
    }

    /// Insert all slots in one transaction, as the last step of an import.
    pub async fn create_many(pool: &SqlitePool, slots: &[CreateSlot]) -> Result<usize, SlotError> {
        let mut tx = pool.begin().await?;
        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO slots (id, starts_at, ends_at, room_id, talk_id, workshop_id, utility_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(slot.start)
            .bind(slot.end)
            .bind(slot.room_id)
            .bind(slot.event.talk_id())
            .bind(slot.event.workshop_id())
            .bind(slot.event.utility_id())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(slots.len())
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, SlotError> {
        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT s.* FROM slots s
            JOIN rooms r ON r.id = s.room_id
            ORDER BY s.starts_at, r.display_order
            "#,
        )
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Slot::try_from).collect()
    }

    /// Schedule re-import wipes the previous slot set.
    pub async fn delete_all(pool: &SqlitePool) -> Result<u64, SlotError> {
        let result = sqlx::query(r#"DELETE FROM slots"#).execute(pool).await?;
        Ok(result.rows_affected())
    }
}

/// A room reference carried by the schedule read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomRef {
    pub id: Uuid,
    pub label: String,
    pub order: i64,
}

/// Event payload resolved for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledEvent {
    Talk {
        id: Uuid,
        title: String,
        is_keynote: bool,
        session_type: String,
    },
    Workshop {
        id: Uuid,
        title: String,
        session_type: String,
    },
    Utility {
        id: Uuid,
        title: String,
        is_streamed: bool,
        url: Option<String>,
    },
}

impl ScheduledEvent {
    /// Identity used when merging multi-room slots of the same event.
    pub fn identity(&self) -> (u8, Uuid) {
        match self {
            ScheduledEvent::Talk { id, .. } => (0, *id),
            ScheduledEvent::Workshop { id, .. } => (1, *id),
            ScheduledEvent::Utility { id, .. } => (2, *id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ScheduledEvent::Talk { title, .. } => title,
            ScheduledEvent::Workshop { title, .. } => title,
            ScheduledEvent::Utility { title, .. } => title,
        }
    }
}

/// A slot joined with its room and event payload, ordered by
/// `(starts_at, room order)` — the grid builder's input row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScheduledSlot {
    pub id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub room: RoomRef,
    pub event: ScheduledEvent,
}

#[derive(Debug, FromRow)]
struct ScheduledSlotRow {
    id: Uuid,
    #[sqlx(rename = "starts_at")]
    start: DateTime<Utc>,
    #[sqlx(rename = "ends_at")]
    end: DateTime<Utc>,
    room_id: Uuid,
    room_label: String,
    room_order: i64,
    talk_id: Option<Uuid>,
    talk_title: Option<String>,
    talk_is_keynote: Option<bool>,
    talk_type: Option<String>,
    workshop_id: Option<Uuid>,
    workshop_title: Option<String>,
    workshop_type: Option<String>,
    utility_id: Option<Uuid>,
    utility_title: Option<String>,
    utility_streamed: Option<bool>,
    utility_url: Option<String>,
}

impl TryFrom<ScheduledSlotRow> for ScheduledSlot {
    type Error = SlotError;

    fn try_from(row: ScheduledSlotRow) -> Result<Self, Self::Error> {
        let event = match SlotEvent::from_columns(
            row.id,
            row.talk_id,
            row.workshop_id,
            row.utility_id,
        )? {
            SlotEvent::Talk(id) => ScheduledEvent::Talk {
                id,
                title: row.talk_title.unwrap_or_default(),
                is_keynote: row.talk_is_keynote.unwrap_or(false),
                session_type: row.talk_type.unwrap_or_else(|| "talk".to_string()),
            },
            SlotEvent::Workshop(id) => ScheduledEvent::Workshop {
                id,
                title: row.workshop_title.unwrap_or_default(),
                session_type: row.workshop_type.unwrap_or_else(|| "workshop".to_string()),
            },
            SlotEvent::Utility(id) => ScheduledEvent::Utility {
                id,
                title: row.utility_title.unwrap_or_default(),
                is_streamed: row.utility_streamed.unwrap_or(false),
                url: row.utility_url,
            },
        };

        Ok(ScheduledSlot {
            id: row.id,
            start: row.start,
            end: row.end,
            room: RoomRef {
                id: row.room_id,
                label: row.room_label,
                order: row.room_order,
            },
            event,
        })
    }
}

impl ScheduledSlot {
    /// All slots with rooms and event payloads resolved, in grid input order.
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, SlotError> {
        let rows = sqlx::query_as::<_, ScheduledSlotRow>(
            r#"
            SELECT
                s.id,
                s.starts_at,
                s.ends_at,
                s.room_id,
                r.label AS room_label,
                r.display_order AS room_order,
                s.talk_id,
                t.title AS talk_title,
                t.is_keynote AS talk_is_keynote,
                t.session_type AS talk_type,
                s.workshop_id,
                w.title AS workshop_title,
                w.session_type AS workshop_type,
                s.utility_id,
                u.title AS utility_title,
                u.is_streamed AS utility_streamed,
                u.url AS utility_url
            FROM slots s
            JOIN rooms r ON r.id = s.room_id
            LEFT JOIN talks t ON t.id = s.talk_id
            LEFT JOIN workshops w ON w.id = s.workshop_id
            LEFT JOIN utilities u ON u.id = s.utility_id
            ORDER BY s.starts_at, r.display_order
            "#,
        )
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(ScheduledSlot::try_from).collect()
    }
}
