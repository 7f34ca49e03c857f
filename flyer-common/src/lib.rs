//! # Flyer Cache Common Library
//!
//! Shared code for the flyer cache workspace:
//! - Bootstrap configuration (TOML) and root folder resolution
//! - Acquisition tuning parameters
//! - Database initialization
//! - Timestamp encoding for stored records

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::AcquisitionConfig;
pub use error::{Error, Result};
