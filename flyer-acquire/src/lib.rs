//! flyer-acquire library interface
//!
//! Exposes the acquisition pipeline and the flyer image cache for the CLI and for
//! integration testing.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{CacheError, CacheResult};

use crate::services::{AcquisitionOrchestrator, CacheManager, HttpFlyerLocator, HttpTileFetcher};
use flyer_common::config::RootLayout;
use flyer_common::AcquisitionConfig;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Cache backed by the live listing and tile hosts
pub type FlyerCacheService = CacheManager<AcquisitionOrchestrator<HttpFlyerLocator, HttpTileFetcher>>;

/// Wire the HTTP collaborators, orchestrator and cache together
pub fn build_service(
    pool: SqlitePool,
    layout: &RootLayout,
    config: AcquisitionConfig,
) -> flyer_common::Result<FlyerCacheService> {
    let config = Arc::new(config);
    let locator = HttpFlyerLocator::new(&config)?;
    let tiles = HttpTileFetcher::new(&config)?;
    let orchestrator = AcquisitionOrchestrator::new(locator, tiles, Arc::clone(&config));

    Ok(CacheManager::new(
        pool,
        layout.images_dir.clone(),
        orchestrator,
        &config,
    ))
}
