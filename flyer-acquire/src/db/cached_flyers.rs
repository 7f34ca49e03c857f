//! Cached flyer image records
//!
//! Storage for [`CachedFlyerRecord`]: at most one row per external flyer id, looked up
//! either by id or by (merchant, postal code) with a freshness bound.

use crate::models::CachedFlyerRecord;
use chrono::{DateTime, Utc};
use flyer_common::time::{parse_db_timestamp, to_db_timestamp};
use flyer_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::PathBuf;

const SELECT_COLUMNS: &str =
    "SELECT flyer_id, merchant_name, postal_code, image_path, fetched_at FROM cached_flyer_images";

fn row_to_record(row: &SqliteRow) -> Result<CachedFlyerRecord> {
    let image_path: String = row.try_get("image_path")?;
    let fetched_at: String = row.try_get("fetched_at")?;

    Ok(CachedFlyerRecord {
        flyer_id: row.try_get("flyer_id")?,
        merchant_name: row.try_get("merchant_name")?,
        postal_code: row.try_get("postal_code")?,
        image_path: PathBuf::from(image_path),
        fetched_at: parse_db_timestamp(&fetched_at)?,
    })
}

/// Look up the record for one external flyer id
pub async fn get_by_external_id(
    pool: &SqlitePool,
    flyer_id: &str,
) -> Result<Option<CachedFlyerRecord>> {
    let row = sqlx::query(&format!("{} WHERE flyer_id = ?", SELECT_COLUMNS))
        .bind(flyer_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Most recently fetched record for (merchant, postal code) fetched at or after `not_before`.
///
/// Merchant comparison ignores case; postal code must match exactly.
pub async fn get_by_merchant_and_location(
    pool: &SqlitePool,
    merchant: &str,
    postal_code: &str,
    not_before: DateTime<Utc>,
) -> Result<Option<CachedFlyerRecord>> {
    let row = sqlx::query(&format!(
        "{} WHERE merchant_name = ? COLLATE NOCASE AND postal_code = ? AND fetched_at >= ?
         ORDER BY fetched_at DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(merchant.trim())
    .bind(postal_code.trim())
    .bind(to_db_timestamp(not_before))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Insert a new record; fails if the flyer id or image path is already present
pub async fn insert(pool: &SqlitePool, record: &CachedFlyerRecord) -> Result<()> {
    let mut conn = pool.acquire().await?;
    insert_on(&mut *conn, record).await
}

async fn insert_on(conn: &mut SqliteConnection, record: &CachedFlyerRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cached_flyer_images
            (flyer_id, merchant_name, postal_code, image_path, fetched_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.flyer_id)
    .bind(&record.merchant_name)
    .bind(&record.postal_code)
    .bind(record.image_path.to_string_lossy().into_owned())
    .bind(to_db_timestamp(record.fetched_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete the record for a flyer id; true if one existed
pub async fn delete(pool: &SqlitePool, flyer_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cached_flyer_images WHERE flyer_id = ?")
        .bind(flyer_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace whatever record exists for `record.flyer_id` in one transaction.
///
/// Returns the superseded record so the caller can remove its file.
pub async fn replace(
    pool: &SqlitePool,
    record: &CachedFlyerRecord,
) -> Result<Option<CachedFlyerRecord>> {
    let mut tx = pool.begin().await?;

    let previous = sqlx::query(&format!("{} WHERE flyer_id = ?", SELECT_COLUMNS))
        .bind(&record.flyer_id)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(row_to_record)
        .transpose()?;

    sqlx::query("DELETE FROM cached_flyer_images WHERE flyer_id = ?")
        .bind(&record.flyer_id)
        .execute(&mut *tx)
        .await?;

    insert_on(&mut *tx, record).await?;

    tx.commit().await?;

    Ok(previous)
}

/// Records fetched before `older_than`
pub async fn list_stale(
    pool: &SqlitePool,
    older_than: DateTime<Utc>,
) -> Result<Vec<CachedFlyerRecord>> {
    let rows = sqlx::query(&format!(
        "{} WHERE fetched_at < ? ORDER BY fetched_at",
        SELECT_COLUMNS
    ))
    .bind(to_db_timestamp(older_than))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_record).collect()
}

/// Every stored image path, for orphan reconciliation
pub async fn list_image_paths(pool: &SqlitePool) -> Result<Vec<PathBuf>> {
    let paths: Vec<String> = sqlx::query_scalar("SELECT image_path FROM cached_flyer_images")
        .fetch_all(pool)
        .await?;

    Ok(paths.into_iter().map(PathBuf::from).collect())
}
