//! Tile fetcher
//!
//! Downloads one named tile from the tile host. A 404 is the host's "no such tile"
//! signal and is reported as [`TileFetchOutcome::NotFound`]; every other failure is
//! [`TileFetchOutcome::TransientError`]. Callers must keep the two apart: the first ends
//! a row during discovery, the second must not.

use crate::models::TileCoordinate;
use crate::utils::http::{build_client, join_url};
use flyer_common::{AcquisitionConfig, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Outcome of one tile request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileFetchOutcome {
    /// Tile bytes (still encoded)
    Success(Vec<u8>),
    /// The host has no tile at this coordinate
    NotFound,
    /// Network failure, timeout or unexpected status
    TransientError(String),
}

/// Source of tile bytes.
///
/// Implemented over HTTP by [`HttpTileFetcher`]; tests substitute in-memory sources.
pub trait TileSource: Send + Sync {
    fn fetch_tile(&self, url: &str) -> impl Future<Output = TileFetchOutcome> + Send;
}

/// Full tile URL: `{tile_base}/{flyer_path}{zoom}_{column}_{row}.jpg`
pub fn tile_url(tile_base_url: &str, flyer_path: &str, coordinate: &TileCoordinate) -> String {
    let mut prefix = join_url(tile_base_url, flyer_path);
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    format!("{}{}", prefix, coordinate.file_name())
}

/// HTTP tile fetcher with a fixed pause after each successful download
#[derive(Clone)]
pub struct HttpTileFetcher {
    http_client: reqwest::Client,
    request_delay: Duration,
}

impl HttpTileFetcher {
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_client(&config.user_agent, config.tile_timeout())?,
            request_delay: config.request_delay(),
        })
    }

    async fn download(&self, url: &str) -> TileFetchOutcome {
        trace!(url = %url, "Requesting tile");

        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("timed out: {}", e)
                } else {
                    e.to_string()
                };
                warn!(url = %url, error = %reason, "Tile request failed");
                return TileFetchOutcome::TransientError(reason);
            }
        };

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(url = %url, "Tile not present");
            return TileFetchOutcome::NotFound;
        }

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Unexpected tile response status");
            return TileFetchOutcome::TransientError(format!("HTTP {}", status.as_u16()));
        }

        match response.bytes().await {
            Ok(bytes) => TileFetchOutcome::Success(bytes.to_vec()),
            Err(e) => {
                warn!(url = %url, error = %e, "Failed reading tile body");
                TileFetchOutcome::TransientError(format!("body read failed: {}", e))
            }
        }
    }
}

impl TileSource for HttpTileFetcher {
    async fn fetch_tile(&self, url: &str) -> TileFetchOutcome {
        let outcome = self.download(url).await;

        if matches!(outcome, TileFetchOutcome::Success(_)) && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        outcome
    }
}
