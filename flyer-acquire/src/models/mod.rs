//! Data models for flyer acquisition and caching

pub mod cached_flyer;
pub mod listing;
pub mod tile;

pub use cached_flyer::{CacheStatus, CachedFlyer, CachedFlyerRecord};
pub use listing::{FlyerListing, FlyerMatch, ListedFlyer};
pub use tile::{TileCoordinate, TileData, TileGrid};
