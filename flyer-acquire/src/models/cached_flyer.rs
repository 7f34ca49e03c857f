//! Stored flyer image records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One previously acquired and stored flyer image.
///
/// Unique by `flyer_id`; looked up by (merchant, postal code) for cache hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFlyerRecord {
    /// External flyer identifier assigned by the listing source
    pub flyer_id: String,
    pub merchant_name: String,
    pub postal_code: String,
    /// Stored PNG, `{flyer_id}.png` under the image directory
    pub image_path: PathBuf,
    pub fetched_at: DateTime<Utc>,
}

impl CachedFlyerRecord {
    /// True when fetched no earlier than `window` before `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.fetched_at >= now - window
    }
}

/// How a cached flyer was produced for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Served from a fresh stored record
    Hit,
    /// Acquired from the remote source and stored
    Acquired,
}

/// Result of a cache-aware lookup
#[derive(Debug, Clone)]
pub struct CachedFlyer {
    pub record: CachedFlyerRecord,
    pub status: CacheStatus,
}
