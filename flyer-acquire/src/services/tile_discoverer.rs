//! Tile grid discovery
//!
//! The tile host publishes no manifest, so the extent of a flyer page is found by
//! probing. Rows are scanned upward from 0 and, within a row, columns rightward from 0
//! until the first missing tile. Discovery ends at the first empty row after at least
//! one row produced tiles. Probing order is strictly sequential: the termination rule
//! depends on seeing each outcome before the next request.

use crate::models::{TileCoordinate, TileData, TileGrid};
use crate::services::tile_fetcher::{tile_url, TileFetchOutcome, TileSource};
use flyer_common::AcquisitionConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Discovery failures; all of them end the current acquisition
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("first tile {0} not available")]
    FirstTileMissing(TileCoordinate),

    #[error("no tiles found in the first {0} rows")]
    NoTilesFound(u32),

    #[error("tile {coordinate} failed after {attempts} attempts: {reason}")]
    Transient {
        coordinate: TileCoordinate,
        attempts: u32,
        reason: String,
    },

    #[error("cannot read dimensions of first tile {coordinate}: {reason}")]
    UndecodableFirstTile {
        coordinate: TileCoordinate,
        reason: String,
    },

    #[error("tile storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("discovered grid has no usable tiles")]
    EmptyGrid,
}

/// Call-scoped scratch directory for downloaded tiles.
///
/// The directory and everything in it is removed when the store is dropped, on every
/// exit path of the acquisition that owns it.
pub struct TileStore {
    dir: TempDir,
}

impl TileStore {
    /// Create under the system temp directory
    pub fn new() -> std::io::Result<Self> {
        Self::builder().tempdir().map(|dir| Self { dir })
    }

    /// Create beneath `root`
    pub fn new_in(root: &Path) -> std::io::Result<Self> {
        Self::builder().tempdir_in(root).map(|dir| Self { dir })
    }

    fn builder() -> tempfile::Builder<'static, 'static> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("flyer-tiles-");
        builder
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persist one tile, returning where it was written
    pub async fn write(&self, coordinate: TileCoordinate, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self
            .dir
            .path()
            .join(format!("tile_{}_{}.jpg", coordinate.column, coordinate.row));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Discovery tuning
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub zoom_level: u32,
    /// Abort as soon as `(zoom, 0, 0)` is unavailable
    pub require_origin_tile: bool,
    /// Leading empty rows tolerated when the origin tile is not required
    pub max_leading_empty_rows: u32,
    /// Extra attempts after a transient tile failure
    pub tile_retry_attempts: u32,
    pub retry_delay: Duration,
}

impl DiscoveryOptions {
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self {
            zoom_level: config.zoom_level,
            require_origin_tile: true,
            max_leading_empty_rows: config.max_leading_empty_rows,
            tile_retry_attempts: config.tile_retry_attempts,
            retry_delay: config.request_delay(),
        }
    }
}

/// Probes a flyer's tile grid through a [`TileSource`]
pub struct TileGridDiscoverer<'a, S: TileSource> {
    source: &'a S,
    tile_base_url: &'a str,
    options: DiscoveryOptions,
}

impl<'a, S: TileSource> TileGridDiscoverer<'a, S> {
    pub fn new(source: &'a S, tile_base_url: &'a str, options: DiscoveryOptions) -> Self {
        Self {
            source,
            tile_base_url,
            options,
        }
    }

    /// Discover every tile of `flyer_path`, storing tile bytes in `store`
    pub async fn discover(
        &self,
        flyer_path: &str,
        store: &TileStore,
    ) -> Result<TileGrid, DiscoveryError> {
        let zoom = self.options.zoom_level;
        let mut grid = TileGrid::new();
        let mut leading_empty_rows = 0u32;
        let mut row = 0u32;

        info!(flyer_path = %flyer_path, zoom, "Starting tile discovery");

        loop {
            let row_tiles = self.scan_row(flyer_path, row, store, &mut grid).await?;

            if row_tiles > 0 {
                debug!(row, tiles = row_tiles, "Row discovered");
                row += 1;
                continue;
            }

            if !grid.is_empty() {
                info!(row, "No tiles in row, assuming end of flyer");
                break;
            }

            if row == 0 && self.options.require_origin_tile {
                error!(
                    tile = %TileCoordinate::new(zoom, 0, 0),
                    "First tile unavailable, cannot proceed"
                );
                return Err(DiscoveryError::FirstTileMissing(TileCoordinate::new(zoom, 0, 0)));
            }

            leading_empty_rows += 1;
            if leading_empty_rows > self.options.max_leading_empty_rows {
                error!(
                    rows_searched = row + 1,
                    "Searched too many leading rows without finding tiles"
                );
                return Err(DiscoveryError::NoTilesFound(row + 1));
            }

            warn!(row, "No tiles in row and none found yet, continuing search");
            row += 1;
        }

        if !grid.is_stitchable() {
            error!("Discovery finished without a stitchable grid");
            return Err(DiscoveryError::EmptyGrid);
        }

        info!(
            tiles = grid.len(),
            max_column = grid.max_column().unwrap_or(0),
            max_row = grid.max_row().unwrap_or(0),
            "Tile discovery complete"
        );

        Ok(grid)
    }

    /// Fetch columns of one row until the first missing tile; returns tiles found
    async fn scan_row(
        &self,
        flyer_path: &str,
        row: u32,
        store: &TileStore,
        grid: &mut TileGrid,
    ) -> Result<u32, DiscoveryError> {
        let mut column = 0u32;

        loop {
            let coordinate = TileCoordinate::new(self.options.zoom_level, column, row);
            let url = tile_url(self.tile_base_url, flyer_path, &coordinate);

            match self.fetch_with_retry(&url, coordinate).await? {
                Some(bytes) => {
                    if grid.tile_size().is_none() {
                        let (width, height) = tile_dimensions(coordinate, &bytes)?;
                        info!(width, height, "Detected tile dimensions");
                        grid.record_tile_size(width, height);
                    }

                    let path = store.write(coordinate, &bytes).await?;
                    grid.insert(coordinate, TileData::Stored(path));
                    column += 1;
                }
                None => return Ok(column),
            }
        }
    }

    /// `Some(bytes)` on success, `None` on NotFound; transient failures are retried
    async fn fetch_with_retry(
        &self,
        url: &str,
        coordinate: TileCoordinate,
    ) -> Result<Option<Vec<u8>>, DiscoveryError> {
        let max_attempts = self.options.tile_retry_attempts + 1;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.source.fetch_tile(url).await {
                TileFetchOutcome::Success(bytes) => return Ok(Some(bytes)),
                TileFetchOutcome::NotFound => return Ok(None),
                TileFetchOutcome::TransientError(reason) => {
                    if attempt >= max_attempts {
                        error!(tile = %coordinate, attempt, error = %reason, "Tile fetch failed, aborting discovery");
                        return Err(DiscoveryError::Transient {
                            coordinate,
                            attempts: attempt,
                            reason,
                        });
                    }
                    warn!(tile = %coordinate, attempt, error = %reason, "Tile fetch failed, retrying");
                    if !self.options.retry_delay.is_zero() {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }
    }
}

fn tile_dimensions(coordinate: TileCoordinate, bytes: &[u8]) -> Result<(u32, u32), DiscoveryError> {
    let image = image::load_from_memory(bytes).map_err(|e| DiscoveryError::UndecodableFirstTile {
        coordinate,
        reason: e.to_string(),
    })?;
    Ok((image.width(), image.height()))
}
