//! Test Helper Utilities
//!
//! Shared utilities for testing flyer-acquire
#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;
pub mod tile_images;

// Re-export commonly used items
pub use db_utils::{create_test_db, get_table_columns, has_column, init_test_logging};
pub use fakes::{FakeAcquirer, FakeLocator, FakeTileSource};
pub use tile_images::{png_tile, solid_png};
