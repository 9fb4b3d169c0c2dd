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
use db::models::talk::Talk;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/talks", get(list_talks))
        .route("/talks/{id}", get(get_talk))
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct TalkWithSpeakers {
    pub talk: Talk,
    pub speakers: Vec<Speaker>,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct TalksResponse {
    pub talks: Vec<TalkWithSpeakers>,
    /// True while unpublished talks remain, so listings can say the
    /// programme is not final yet.
    pub more_to_come: bool,
}

async fn list_talks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TalksResponse>>, ApiError> {
    let pool = &state.db.pool;

    let mut talks = Vec::new();
    for talk in Talk::find_public(pool).await? {
        let speakers = Speaker::find_for_talk(pool, talk.id).await?;
        talks.push(TalkWithSpeakers { talk, speakers });
    }
    let more_to_come = Talk::has_unpublished(pool).await?;

    Ok(Json(ApiResponse::success(TalksResponse {
        talks,
        more_to_come,
    })))
}

async fn get_talk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TalkWithSpeakers>>, ApiError> {
    let pool = &state.db.pool;
    let talk = Talk::find_by_id(pool, id).await?;
    let speakers = Speaker::find_for_talk(pool, talk.id).await?;

    Ok(Json(ApiResponse::success(TalkWithSpeakers {
        talk,
        speakers,
    })))
}
