//! Acquisition orchestrator
//!
//! Locate -> discover -> stitch, producing the external flyer id and PNG bytes. Any stage
//! failure collapses into one [`AcquisitionFailed`] outcome; the stage detail is only
//! logged. Tiles live in a per-call [`TileStore`] that is removed on every exit path,
//! including timeouts.

use crate::services::flyer_locator::FlyerLookup;
use crate::services::image_stitcher::stitch_to_png;
use crate::services::tile_discoverer::{DiscoveryOptions, TileGridDiscoverer, TileStore};
use crate::services::tile_fetcher::TileSource;
use flyer_common::AcquisitionConfig;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Freshly acquired flyer image, not yet persisted
#[derive(Debug, Clone)]
pub struct FlyerAcquisition {
    pub flyer_id: String,
    pub image_png: Vec<u8>,
}

/// The flyer could not be produced. Callers treat this as "not found".
#[derive(Debug, Clone, Error)]
#[error("no flyer image available for '{merchant}' in '{postal_code}' ({category})")]
pub struct AcquisitionFailed {
    pub merchant: String,
    pub postal_code: String,
    pub category: String,
}

/// Something that can produce a stitched flyer image.
pub trait FlyerAcquirer: Send + Sync {
    fn acquire(
        &self,
        postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> impl Future<Output = Result<FlyerAcquisition, AcquisitionFailed>> + Send;
}

pub struct AcquisitionOrchestrator<L, T> {
    locator: L,
    tiles: T,
    config: Arc<AcquisitionConfig>,
    discovery: DiscoveryOptions,
    limiter: Arc<Semaphore>,
    scratch_root: Option<PathBuf>,
}

impl<L: FlyerLookup, T: TileSource> AcquisitionOrchestrator<L, T> {
    pub fn new(locator: L, tiles: T, config: Arc<AcquisitionConfig>) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_acquisitions.max(1)));
        Self {
            discovery: DiscoveryOptions::from_config(&config),
            locator,
            tiles,
            config,
            limiter,
            scratch_root: None,
        }
    }

    /// Put per-call tile directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = Some(root);
        self
    }

    pub fn with_discovery_options(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = options;
        self
    }

    async fn run(&self, postal_code: &str, merchant: &str, category: &str) -> Option<FlyerAcquisition> {
        let located = match self.locator.locate(postal_code, merchant, category).await {
            Ok(found) => found,
            Err(e) => {
                info!(merchant = %merchant, postal_code = %postal_code, reason = %e, "Flyer not located");
                return None;
            }
        };

        let store = match &self.scratch_root {
            Some(root) => TileStore::new_in(root),
            None => TileStore::new(),
        };
        let store = match store {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "Cannot create tile scratch directory");
                return None;
            }
        };

        let discoverer =
            TileGridDiscoverer::new(&self.tiles, &self.config.tile_base_url, self.discovery.clone());
        let grid = match discoverer.discover(&located.path, &store).await {
            Ok(grid) => grid,
            Err(e) => {
                error!(flyer_id = %located.flyer_id, path = %located.path, error = %e, "Tile discovery failed");
                return None;
            }
        };

        // `store` stays alive until the stitch has read every tile
        let result = stitch_to_png(grid).await;
        drop(store);

        match result {
            Ok(image_png) => {
                info!(
                    flyer_id = %located.flyer_id,
                    bytes = image_png.len(),
                    "Flyer image acquired"
                );
                Some(FlyerAcquisition {
                    flyer_id: located.flyer_id,
                    image_png,
                })
            }
            Err(e) => {
                error!(flyer_id = %located.flyer_id, error = %e, "Stitching failed");
                None
            }
        }
    }
}

impl<L: FlyerLookup, T: TileSource> FlyerAcquirer for AcquisitionOrchestrator<L, T> {
    async fn acquire(
        &self,
        postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> Result<FlyerAcquisition, AcquisitionFailed> {
        let failed = || AcquisitionFailed {
            merchant: merchant.to_string(),
            postal_code: postal_code.to_string(),
            category: category.to_string(),
        };

        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Acquisition limiter closed");
                return Err(failed());
            }
        };

        match tokio::time::timeout(
            self.config.acquisition_timeout(),
            self.run(postal_code, merchant, category),
        )
        .await
        {
            Ok(Some(acquisition)) => Ok(acquisition),
            Ok(None) => Err(failed()),
            Err(_) => {
                warn!(
                    merchant = %merchant,
                    postal_code = %postal_code,
                    timeout_secs = self.config.acquisition_timeout_secs,
                    "Acquisition timed out"
                );
                Err(failed())
            }
        }
    }
}
