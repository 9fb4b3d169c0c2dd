use std::path::Path;
use std::str::FromStr;

use sqlx::{
    Error, Pool, Sqlite, SqlitePool,
    migrate::Migrator,
    sqlite::SqliteConnectOptions,
};

pub mod models;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    pub async fn new(database_path: &Path) -> Result<DBService, Error> {
        let database_url = format!("sqlite://{}", database_path.to_string_lossy());
        let options = SqliteConnectOptions::from_str(&database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;
        MIGRATOR.run(&pool).await?;
        Ok(DBService { pool })
    }
}
