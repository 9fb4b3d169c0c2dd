use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use db::models::speaker::Speaker;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/speakers", get(list_speakers))
        .route("/speakers/{id}", get(get_speaker))
}

async fn list_speakers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Speaker>>>, ApiError> {
    let speakers = Speaker::find_public(&state.db.pool).await?;
    Ok(Json(ApiResponse::success(speakers)))
}

async fn get_speaker(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Speaker>>, ApiError> {
    let speaker = Speaker::find_by_id(&state.db.pool, id).await?;
    Ok(Json(ApiResponse::success(speaker)))
}
