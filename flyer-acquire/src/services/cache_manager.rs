//! Flyer image cache
//!
//! Owns the lifecycle of stored flyer images and their records.
//!
//! Per external flyer id:
//! - Absent -> Present: first successful acquisition
//! - Present -> Present: a later acquisition of the same id supersedes record and file
//! - Present -> Absent: explicit delete, stale purge
//!
//! A cache hit is the most recent record for the exact (merchant, postal code) pair
//! fetched within the freshness window. Mutations keep the invariant that a record
//! never points at a deleted file: new files are in place before their record is
//! committed, and old files are removed only after their record is gone.

use crate::db::{cached_flyers, settings};
use crate::error::{CacheError, CacheResult};
use crate::models::{CacheStatus, CachedFlyer, CachedFlyerRecord};
use crate::services::acquisition_orchestrator::{FlyerAcquirer, FlyerAcquisition};
use crate::utils::{file_store, retry_on_lock, KeyedLocks};
use chrono::{DateTime, Utc};
use flyer_common::db::DEFAULT_MAX_LOCK_WAIT_MS;
use flyer_common::AcquisitionConfig;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Unreferenced files younger than this may belong to a write still in flight in
/// another process and survive reconciliation
pub const ORPHAN_GRACE_PERIOD: Duration = Duration::from_secs(10 * 60);

pub struct CacheManager<A> {
    pool: SqlitePool,
    images_dir: PathBuf,
    acquirer: A,
    freshness_window: chrono::Duration,
    default_category: String,
    locks: KeyedLocks,
}

impl<A: FlyerAcquirer> CacheManager<A> {
    pub fn new(pool: SqlitePool, images_dir: PathBuf, acquirer: A, config: &AcquisitionConfig) -> Self {
        Self {
            pool,
            images_dir,
            acquirer,
            freshness_window: config.freshness_window(),
            default_category: config.default_category.clone(),
            locks: KeyedLocks::new(),
        }
    }

    /// Fresh record for (merchant, postal code), if any
    pub async fn find_fresh(
        &self,
        merchant: &str,
        postal_code: &str,
    ) -> CacheResult<Option<CachedFlyerRecord>> {
        self.find_fresh_at(merchant, postal_code, Utc::now()).await
    }

    /// Fresh record relative to an explicit `now`
    pub async fn find_fresh_at(
        &self,
        merchant: &str,
        postal_code: &str,
        now: DateTime<Utc>,
    ) -> CacheResult<Option<CachedFlyerRecord>> {
        let record = cached_flyers::get_by_merchant_and_location(
            &self.pool,
            merchant,
            postal_code,
            now - self.freshness_window,
        )
        .await?;
        Ok(record.filter(|r| r.is_fresh(now, self.freshness_window)))
    }

    /// Serve a fresh cached flyer or acquire, store and return a new one.
    ///
    /// Concurrent calls for the same (merchant, postal code) are serialized, so a second
    /// caller waiting on an in-flight acquisition is served from its result.
    pub async fn get_or_acquire(
        &self,
        postal_code: &str,
        merchant: &str,
        category: Option<&str>,
    ) -> CacheResult<CachedFlyer> {
        let category = category.unwrap_or(&self.default_category);
        let _guard = self.locks.lock(&lock_key(merchant, postal_code)).await;

        if let Some(record) = self.find_fresh(merchant, postal_code).await? {
            if file_store::exists(&record.image_path).await {
                info!(
                    flyer_id = %record.flyer_id,
                    merchant = %merchant,
                    postal_code = %postal_code,
                    "Cache hit"
                );
                return Ok(CachedFlyer {
                    record,
                    status: CacheStatus::Hit,
                });
            }

            warn!(
                flyer_id = %record.flyer_id,
                path = %record.image_path.display(),
                "Cached image file missing, dropping record"
            );
            self.delete(&record.flyer_id).await?;
        }

        info!(merchant = %merchant, postal_code = %postal_code, "Cache miss, acquiring flyer");
        let record = self.acquire_and_store(postal_code, merchant, category).await?;

        Ok(CachedFlyer {
            record,
            status: CacheStatus::Acquired,
        })
    }

    /// Acquire and store regardless of any cached record
    pub async fn refresh(
        &self,
        postal_code: &str,
        merchant: &str,
        category: Option<&str>,
    ) -> CacheResult<CachedFlyerRecord> {
        let category = category.unwrap_or(&self.default_category);
        let _guard = self.locks.lock(&lock_key(merchant, postal_code)).await;
        self.acquire_and_store(postal_code, merchant, category).await
    }

    async fn acquire_and_store(
        &self,
        postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> CacheResult<CachedFlyerRecord> {
        let acquisition = self
            .acquirer
            .acquire(postal_code, merchant, category)
            .await
            .map_err(|e| {
                info!(reason = %e, "Acquisition produced no flyer");
                CacheError::NotFound {
                    merchant: merchant.to_string(),
                    postal_code: postal_code.to_string(),
                }
            })?;

        self.store_acquisition(merchant, postal_code, acquisition, Utc::now())
            .await
    }

    /// Persist an acquired image, superseding any record with the same flyer id.
    ///
    /// The superseded record may belong to a different (merchant, postal code). On
    /// failure every file written for this attempt is removed.
    pub async fn store_acquisition(
        &self,
        merchant: &str,
        postal_code: &str,
        acquisition: FlyerAcquisition,
        fetched_at: DateTime<Utc>,
    ) -> CacheResult<CachedFlyerRecord> {
        let FlyerAcquisition {
            flyer_id,
            image_png,
        } = acquisition;
        let persistence = |source: flyer_common::Error| CacheError::Persistence {
            flyer_id: flyer_id.clone(),
            source,
        };

        let target = file_store::image_path_for(&self.images_dir, &flyer_id).map_err(persistence)?;
        let staging = file_store::write_staged(&target, &image_png)
            .await
            .map_err(persistence)?;

        if let Err(e) = file_store::commit_staged(&staging, &target).await {
            file_store::delete_if_exists(&staging).await;
            error!(flyer_id = %flyer_id, error = %e, "Failed to move image into place");
            return Err(persistence(e));
        }

        let record = CachedFlyerRecord {
            flyer_id: flyer_id.clone(),
            merchant_name: merchant.trim().to_string(),
            postal_code: postal_code.trim().to_string(),
            image_path: target.clone(),
            fetched_at,
        };

        let max_wait_ms = self.max_lock_wait_ms().await;
        let replaced = retry_on_lock("replace_cached_flyer", max_wait_ms, || {
            cached_flyers::replace(&self.pool, &record)
        })
        .await;

        match replaced {
            Ok(previous) => {
                if let Some(previous) = previous {
                    info!(
                        flyer_id = %flyer_id,
                        previous_merchant = %previous.merchant_name,
                        previous_postal_code = %previous.postal_code,
                        "Superseded cached flyer"
                    );
                    if !file_store::same_file(&previous.image_path, &record.image_path).await {
                        file_store::delete_if_exists(&previous.image_path).await;
                    }
                }
                info!(flyer_id = %flyer_id, path = %target.display(), "Stored flyer image");
                Ok(record)
            }
            Err(e) => {
                // An older record for this id may still point at the same path
                let existing = cached_flyers::get_by_external_id(&self.pool, &flyer_id).await;
                let still_referenced = match existing {
                    Ok(Some(existing)) => file_store::same_file(&existing.image_path, &target).await,
                    _ => false,
                };
                if !still_referenced {
                    file_store::delete_if_exists(&target).await;
                }
                error!(flyer_id = %flyer_id, error = %e, "Failed to record stored flyer");
                Err(persistence(e))
            }
        }
    }

    /// Remove a flyer's record, then its file. Returns whether a record existed.
    pub async fn delete(&self, flyer_id: &str) -> CacheResult<bool> {
        let Some(record) = cached_flyers::get_by_external_id(&self.pool, flyer_id).await? else {
            debug!(flyer_id = %flyer_id, "Nothing to delete");
            return Ok(false);
        };

        let max_wait_ms = self.max_lock_wait_ms().await;
        let removed = retry_on_lock("delete_cached_flyer", max_wait_ms, || {
            cached_flyers::delete(&self.pool, flyer_id)
        })
        .await?;

        file_store::delete_if_exists(&record.image_path).await;
        info!(flyer_id = %flyer_id, "Deleted cached flyer");
        Ok(removed)
    }

    /// Delete every record older than the freshness window
    pub async fn purge_stale(&self) -> CacheResult<usize> {
        self.purge_stale_at(Utc::now()).await
    }

    pub async fn purge_stale_at(&self, now: DateTime<Utc>) -> CacheResult<usize> {
        let stale = cached_flyers::list_stale(&self.pool, now - self.freshness_window).await?;
        let mut purged = 0;

        for record in stale {
            if self.delete(&record.flyer_id).await? {
                purged += 1;
            }
        }

        info!(purged, "Purged stale flyers");
        Ok(purged)
    }

    /// Remove image files with no record and leftovers of interrupted writes
    pub async fn reconcile_orphans(&self) -> CacheResult<usize> {
        self.reconcile_orphans_older_than(ORPHAN_GRACE_PERIOD).await
    }

    /// Reconcile, sparing files modified less than `min_age` ago.
    ///
    /// Records are matched by file name so the result does not depend on how the
    /// image directory was spelled when they were stored.
    pub async fn reconcile_orphans_older_than(&self, min_age: Duration) -> CacheResult<usize> {
        let referenced: HashSet<OsString> = cached_flyers::list_image_paths(&self.pool)
            .await?
            .into_iter()
            .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
            .collect();

        let mut entries = match tokio::fs::read_dir(&self.images_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::Store(e.into())),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::Store(e.into()))?
        {
            let path = entry.path();
            let is_png = path.extension().map(|ext| ext == "png").unwrap_or(false);
            let unreferenced = file_store::is_staging_file(&path)
                || (is_png && !referenced.contains(&entry.file_name()));
            if !unreferenced {
                continue;
            }
            if !file_store::is_older_than(&path, min_age).await {
                debug!(path = %path.display(), "Unreferenced file too recent to remove");
                continue;
            }

            if file_store::delete_if_exists(&path).await {
                warn!(path = %path.display(), "Removed orphaned image file");
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn max_lock_wait_ms(&self) -> u64 {
        match settings::get_max_lock_wait_ms(&self.pool).await {
            Ok(ms) => ms,
            Err(e) => {
                warn!(error = %e, "Cannot read lock wait setting, using default");
                DEFAULT_MAX_LOCK_WAIT_MS
            }
        }
    }
}

fn lock_key(merchant: &str, postal_code: &str) -> String {
    format!("{}|{}", merchant.trim().to_lowercase(), postal_code.trim())
}
