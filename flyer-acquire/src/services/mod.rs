//! Service modules for flyer acquisition and caching
//!
//! Pipeline: locate flyer in listing -> discover tile grid -> stitch PNG -> cache.

pub mod acquisition_orchestrator;
pub mod cache_manager;
pub mod flyer_locator;
pub mod image_stitcher;
pub mod tile_discoverer;
pub mod tile_fetcher;

pub use acquisition_orchestrator::{
    AcquisitionFailed, AcquisitionOrchestrator, FlyerAcquirer, FlyerAcquisition,
};
pub use cache_manager::{CacheManager, ORPHAN_GRACE_PERIOD};
pub use flyer_locator::{FlyerLookup, HttpFlyerLocator, ListingError};
pub use image_stitcher::{stitch_to_png, StitchError};
pub use tile_discoverer::{DiscoveryError, DiscoveryOptions, TileGridDiscoverer, TileStore};
pub use tile_fetcher::{HttpTileFetcher, TileFetchOutcome, TileSource};
