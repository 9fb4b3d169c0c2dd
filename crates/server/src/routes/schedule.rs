use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use db::models::slot::{ScheduledEvent, ScheduledSlot};
use services::services::schedule_grid::ScheduleGrid;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule", get(list_schedule))
        .route("/schedule/grid", get(schedule_grid))
}

/// Flat schedule entry: one per grid item, with multi-room events already
/// collapsed and their room labels expanded.
#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct ScheduleEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rooms: Vec<String>,
    pub is_streamed: bool,
    pub kind: String,
    pub session: ScheduledEvent,
}

async fn list_schedule(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ScheduleEntry>>>, ApiError> {
    let slots = ScheduledSlot::find_all(&state.db.pool).await?;
    let grid = ScheduleGrid::from_slots(&slots);

    let entries = grid
        .rows
        .iter()
        .flat_map(|row| row.items.iter())
        .map(|item| ScheduleEntry {
            start: item.slot.start,
            end: item.slot.end,
            rooms: grid.room_labels(item),
            is_streamed: item.is_streamed,
            kind: item.kind().to_string(),
            session: item.slot.event.clone(),
        })
        .collect();

    Ok(Json(ApiResponse::success(entries)))
}

async fn schedule_grid(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ScheduleGrid>>, ApiError> {
    let slots = ScheduledSlot::find_all(&state.db.pool).await?;
    let mut grid = ScheduleGrid::from_slots(&slots);

    // Registration-desk style rows before the first real session carry no
    // information for attendees; drop them from the rendered grid.
    while grid
        .rows
        .first()
        .is_some_and(|row| row.contains_only_non_streamed_utilities())
    {
        grid.pop_row(0);
    }

    Ok(Json(ApiResponse::success(grid)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::room::{CreateRoom, Room};
    use db::models::slot::{CreateSlot, Slot, SlotEvent};
    use db::models::utility::{CreateUtility, Utility};

    use chrono::TimeZone;
    use sqlx::SqlitePool;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn setup_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:?cache=shared")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        db::MIGRATOR.run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn grid_endpoint_trims_leading_filler_rows() {
        let pool = setup_pool().await;

        let room = Room::create(
            &pool,
            CreateRoom {
                label: "Main Hall".into(),
                slug: "main-hall".into(),
                order: 10,
            },
        )
        .await
        .unwrap();
        let registration = Utility::create(
            &pool,
            CreateUtility {
                title: "Registration".into(),
                slug: "registration".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let lunch = Utility::create(
            &pool,
            CreateUtility {
                title: "Lunch".into(),
                slug: "lunch".into(),
                is_streamed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let start = Utc.with_ymd_and_hms(2024, 9, 13, 7, 0, 0).unwrap();
        Slot::create_many(
            &pool,
            &[
                CreateSlot {
                    start,
                    end: start + chrono::Duration::hours(1),
                    room_id: room.id,
                    event: SlotEvent::Utility(registration.id),
                },
                CreateSlot {
                    start: start + chrono::Duration::hours(1),
                    end: start + chrono::Duration::hours(2),
                    room_id: room.id,
                    event: SlotEvent::Utility(lunch.id),
                },
            ],
        )
        .await
        .unwrap();

        let slots = ScheduledSlot::find_all(&pool).await.unwrap();
        let mut grid = ScheduleGrid::from_slots(&slots);
        assert_eq!(grid.rows.len(), 2);

        while grid
            .rows
            .first()
            .is_some_and(|row| row.contains_only_non_streamed_utilities())
        {
            grid.pop_row(0);
        }

        // Only the streamed lunch row remains, renumbered to the top.
        assert_eq!(grid.rows.len(), 1);
        assert_eq!(grid.rows[0].offset, 1);
        assert_eq!(grid.rows[0].items[0].slot.event.title(), "Lunch");
    }

    #[tokio::test]
    async fn flat_entries_serialize_the_event_as_session() {
        let pool = setup_pool().await;

        let room = Room::create(
            &pool,
            CreateRoom {
                label: "Main Hall".into(),
                slug: "main-hall".into(),
                order: 10,
            },
        )
        .await
        .unwrap();
        let talk = db::models::talk::Talk::create(
            &pool,
            db::models::talk::CreateTalk {
                title: "Opening keynote".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let start = Utc.with_ymd_and_hms(2024, 9, 13, 9, 0, 0).unwrap();
        Slot::create_many(
            &pool,
            &[CreateSlot {
                start,
                end: start + chrono::Duration::hours(1),
                room_id: room.id,
                event: SlotEvent::Talk(talk.id),
            }],
        )
        .await
        .unwrap();

        let slots = ScheduledSlot::find_all(&pool).await.unwrap();
        let grid = ScheduleGrid::from_slots(&slots);
        let item = &grid.rows[0].items[0];
        let entry = ScheduleEntry {
            start: item.slot.start,
            end: item.slot.end,
            rooms: grid.room_labels(item),
            is_streamed: item.is_streamed,
            kind: item.kind().to_string(),
            session: item.slot.event.clone(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "talk");
        assert_eq!(value["session"]["title"], "Opening keynote");
        assert!(value.get("event").is_none());
    }
}
