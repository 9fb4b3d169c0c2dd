use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use db::models::speaker::Speaker;
use db::models::workshop::Workshop;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workshops", get(list_workshops))
        .route("/workshops/{id}", get(get_workshop))
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct WorkshopWithSpeakers {
    pub workshop: Workshop,
    pub speakers: Vec<Speaker>,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct WorkshopsResponse {
    pub workshops: Vec<WorkshopWithSpeakers>,
    pub more_to_come: bool,
}

async fn list_workshops(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<WorkshopsResponse>>, ApiError> {
    let pool = &state.db.pool;

    let mut workshops = Vec::new();
    for workshop in Workshop::find_public(pool).await? {
        let speakers = Speaker::find_for_workshop(pool, workshop.id).await?;
        workshops.push(WorkshopWithSpeakers { workshop, speakers });
    }
    let more_to_come = Workshop::has_unpublished(pool).await?;

    Ok(Json(ApiResponse::success(WorkshopsResponse {
        workshops,
        more_to_come,
    })))
}

async fn get_workshop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WorkshopWithSpeakers>>, ApiError> {
    let pool = &state.db.pool;
    let workshop = Workshop::find_by_id(pool, id).await?;
    let speakers = Speaker::find_for_workshop(pool, workshop.id).await?;

    Ok(Json(ApiResponse::success(WorkshopWithSpeakers {
        workshop,
        speakers,
    })))
}
