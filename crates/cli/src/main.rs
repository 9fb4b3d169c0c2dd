//! Operator commands for the conference programme: spreadsheet schedule
//! import and pretalx synchronization.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use db::DBService;
use services::services::config::AppConfig;
use services::services::pretalx::PretalxClient;
use services::services::pretalx_sync::PretalxSync;
use services::services::schedule_import;

#[derive(Parser)]
#[command(name = "summit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage the conference programme database")]
struct Cli {
    /// Configuration file (defaults to SUMMIT_CONFIG or ./summit.toml)
    #[arg(short, long, env = "SUMMIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the stored schedule with the contents of an XLSX export
    ImportSchedule {
        /// Path to the spreadsheet file
        xlsx: PathBuf,
    },
    /// Pull confirmed submissions and speakers from pretalx
    PretalxSync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let db = DBService::new(&config.database_path).await?;

    match cli.command {
        Commands::ImportSchedule { xlsx } => {
            let offset = config.offset()?;
            let summary =
                schedule_import::import_xlsx(&db.pool, &config.conference_days, offset, &xlsx)
                    .await?;
            println!(
                "imported {} slots ({} new rooms, {} new utilities)",
                summary.slots_created, summary.rooms_created, summary.utilities_created
            );
        }
        Commands::PretalxSync => {
            let client = PretalxClient::new(&config.pretalx)?;
            let mut sync = PretalxSync::new(&client, &db.pool).await?;
            let summary = sync.full_sync().await?;
            println!(
                "talks: {} created, {} updated; workshops: {} created, {} updated; speakers: {} created, {} updated",
                summary.talks_created,
                summary.talks_updated,
                summary.workshops_created,
                summary.workshops_updated,
                summary.speakers_created,
                summary.speakers_updated
            );
        }
    }

    Ok(())
}
