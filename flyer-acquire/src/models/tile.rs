//! Tile coordinates and the discovered tile grid

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Position of one tile within a flyer page's tile grid.
///
/// The remote host names tiles `{zoom}_{column}_{row}`; row 0 is the bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    pub zoom: u32,
    pub column: u32,
    pub row: u32,
}

impl TileCoordinate {
    pub fn new(zoom: u32, column: u32, row: u32) -> Self {
        Self { zoom, column, row }
    }

    /// Remote file name, e.g. `4_1_0.jpg`
    pub fn file_name(&self) -> String {
        format!("{}.jpg", self)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.zoom, self.column, self.row)
    }
}

/// Raw bytes of one tile, held in memory or spilled to call-scoped storage
#[derive(Debug, Clone)]
pub enum TileData {
    InMemory(Vec<u8>),
    Stored(PathBuf),
}

impl TileData {
    /// Read the encoded tile bytes
    pub fn load(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match self {
            TileData::InMemory(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            TileData::Stored(path) => std::fs::read(path).map(Cow::Owned),
        }
    }
}

/// Every tile discovered for one flyer page plus the derived extents.
///
/// Tile dimensions are recorded once, from the first tile, and assumed for all others.
#[derive(Debug, Clone, Default)]
pub struct TileGrid {
    tiles: BTreeMap<TileCoordinate, TileData>,
    max_column: Option<u32>,
    max_row: Option<u32>,
    tile_size: Option<(u32, u32)>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coordinate: TileCoordinate, data: TileData) {
        self.max_column = Some(self.max_column.map_or(coordinate.column, |m| m.max(coordinate.column)));
        self.max_row = Some(self.max_row.map_or(coordinate.row, |m| m.max(coordinate.row)));
        self.tiles.insert(coordinate, data);
    }

    /// Record tile pixel dimensions; later calls are ignored
    pub fn record_tile_size(&mut self, width: u32, height: u32) {
        if self.tile_size.is_none() {
            self.tile_size = Some((width, height));
        }
    }

    pub fn tile_size(&self) -> Option<(u32, u32)> {
        self.tile_size
    }

    pub fn max_column(&self) -> Option<u32> {
        self.max_column
    }

    pub fn max_row(&self) -> Option<u32> {
        self.max_row
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, column: u32, row: u32) -> bool {
        self.tiles.keys().any(|c| c.column == column && c.row == row)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TileCoordinate, &TileData)> {
        self.tiles.iter()
    }

    /// At least one tile with known, non-zero dimensions
    pub fn is_stitchable(&self) -> bool {
        !self.tiles.is_empty() && matches!(self.tile_size, Some((w, h)) if w > 0 && h > 0)
    }

    /// Pixel size of the composed page, `None` when not stitchable or on overflow
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        if !self.is_stitchable() {
            return None;
        }
        let (w, h) = self.tile_size?;
        let columns = self.max_column?.checked_add(1)?;
        let rows = self.max_row?.checked_add(1)?;
        Some((columns.checked_mul(w)?, rows.checked_mul(h)?))
    }
}
