//! Error types for flyer-acquire

use thiserror::Error;

/// Errors reported by the cache manager
#[derive(Debug, Error)]
pub enum CacheError {
    /// No fresh record and no flyer could be acquired for this merchant/location/category
    #[error("No flyer available for '{merchant}' in '{postal_code}'")]
    NotFound {
        merchant: String,
        postal_code: String,
    },

    /// Acquisition succeeded but storing it failed; files written for the attempt were removed
    #[error("Failed to store flyer {flyer_id}: {source}")]
    Persistence {
        flyer_id: String,
        #[source]
        source: flyer_common::Error,
    },

    /// Reading or deleting cache state failed
    #[error(transparent)]
    Store(#[from] flyer_common::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
