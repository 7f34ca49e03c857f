//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use flyer_common::db::DEFAULT_MAX_LOCK_WAIT_MS;
use flyer_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Get the listing session id from the database
///
/// **Returns:** Some(id) if set, None otherwise
pub async fn get_listing_session_id(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "listing_session_id").await
}

/// Store the listing session id
pub async fn set_listing_session_id(db: &Pool<Sqlite>, session_id: String) -> Result<()> {
    set_setting(db, "listing_session_id", session_id).await
}

/// Total retry budget for locked writes
///
/// **Default:** 5000 ms
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, "db_max_lock_wait_ms")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS))
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match value.flatten() {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        flyer_common::db::create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_session_id_not_set() {
        let pool = setup_test_db().await;
        assert_eq!(get_listing_session_id(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_id_upsert() {
        let pool = setup_test_db().await;

        set_listing_session_id(&pool, "old".to_string()).await.unwrap();
        set_listing_session_id(&pool, "new".to_string()).await.unwrap();

        assert_eq!(get_listing_session_id(&pool).await.unwrap(), Some("new".to_string()));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'listing_session_id'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_max_lock_wait_default_and_override() {
        let pool = setup_test_db().await;
        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 5000);

        set_setting(&pool, "db_max_lock_wait_ms", 1200).await.unwrap();
        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 1200);
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = setup_test_db().await;
        set_setting(&pool, "db_max_lock_wait_ms", "soon").await.unwrap();

        assert!(matches!(get_max_lock_wait_ms(&pool).await, Err(Error::Config(_))));
    }
}
