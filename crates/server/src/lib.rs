use std::sync::Arc;

use db::DBService;
use services::services::config::AppConfig;

pub mod error;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: DBService, config: AppConfig) -> AppState {
        AppState {
            db,
            config: Arc::new(config),
        }
    }
}
