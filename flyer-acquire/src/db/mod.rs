//! Database access for flyer-acquire

pub mod cached_flyers;
pub mod settings;

use flyer_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the database in the root folder and make sure the schema exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = flyer_common::db::init_database(db_path).await?;
    tracing::info!("Database tables initialized (settings, cached_flyer_images)");
    Ok(pool)
}
