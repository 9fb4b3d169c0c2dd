use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::AppState;

pub mod health;
pub mod schedule;
pub mod speakers;
pub mod talks;
pub mod workshops;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(talks::router())
        .merge(workshops::router())
        .merge(speakers::router())
        .merge(schedule::router())
        .with_state(state);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
