use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{
    room::RoomError, slot::SlotError, speaker::SpeakerError, talk::TalkError,
    utility::UtilityError, workshop::WorkshopError,
};
use services::services::config::ConfigError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Speaker(#[from] SpeakerError),
    #[error(transparent)]
    Talk(#[from] TalkError),
    #[error(transparent)]
    Workshop(#[from] WorkshopError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Utility(#[from] UtilityError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::Speaker(SpeakerError::NotFound)
            | ApiError::Talk(TalkError::NotFound)
            | ApiError::Workshop(WorkshopError::NotFound)
            | ApiError::Room(RoomError::NotFound)
            | ApiError::Utility(UtilityError::NotFound)
            | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
        }

        (
            status_code,
            Json(ApiResponse::<()>::error(self.to_string())),
        )
            .into_response()
    }
}
