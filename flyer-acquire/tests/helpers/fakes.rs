//! In-memory stand-ins for the listing, tile host and acquisition pipeline
//!
//! Each fake is `Clone` over shared state so a test can hand one copy to the code under
//! test and keep another to inspect what happened.

use flyer_acquire::models::{FlyerMatch, TileCoordinate};
use flyer_acquire::services::tile_fetcher::tile_url;
use flyer_acquire::services::{
    AcquisitionFailed, FlyerAcquirer, FlyerAcquisition, FlyerLookup, ListingError,
    TileFetchOutcome, TileSource,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TILE_BASE: &str = "https://tiles.test/";
pub const ZOOM: u32 = 4;

// ============================================================================
// Tile host
// ============================================================================

/// Tile host answering from scripted outcomes per URL; unknown URLs are 404
#[derive(Clone)]
pub struct FakeTileSource {
    flyer_path: String,
    scripts: Arc<Mutex<HashMap<String, VecDeque<TileFetchOutcome>>>>,
    requests: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl FakeTileSource {
    pub fn new(flyer_path: &str) -> Self {
        Self {
            flyer_path: flyer_path.to_string(),
            scripts: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    /// Pause before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn url_for(&self, column: u32, row: u32) -> String {
        tile_url(TILE_BASE, &self.flyer_path, &TileCoordinate::new(ZOOM, column, row))
    }

    /// Serve `bytes` for every request of (column, row)
    pub fn with_tile(self, column: u32, row: u32, bytes: Vec<u8>) -> Self {
        self.with_script(column, row, vec![TileFetchOutcome::Success(bytes)])
    }

    /// Serve outcomes in order; the last one repeats
    pub fn with_script(self, column: u32, row: u32, outcomes: Vec<TileFetchOutcome>) -> Self {
        let url = self.url_for(column, row);
        self.scripts
            .lock()
            .unwrap()
            .insert(url, outcomes.into_iter().collect());
        self
    }

    /// Every URL requested, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, column: u32, row: u32) -> usize {
        let url = self.url_for(column, row);
        self.requests().iter().filter(|r| **r == url).count()
    }

    pub fn was_requested(&self, column: u32, row: u32) -> bool {
        self.request_count(column, row) > 0
    }
}

impl TileSource for FakeTileSource {
    async fn fetch_tile(&self, url: &str) -> TileFetchOutcome {
        self.requests.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(TileFetchOutcome::NotFound),
            Some(queue) => queue.front().cloned().unwrap_or(TileFetchOutcome::NotFound),
            None => TileFetchOutcome::NotFound,
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Listing that knows at most one flyer
#[derive(Clone)]
pub struct FakeLocator {
    found: Option<FlyerMatch>,
    calls: Arc<AtomicUsize>,
}

impl FakeLocator {
    pub fn found(flyer_id: &str, path: &str) -> Self {
        Self {
            found: Some(FlyerMatch {
                flyer_id: flyer_id.to_string(),
                path: path.to_string(),
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn not_found() -> Self {
        Self {
            found: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FlyerLookup for FakeLocator {
    async fn locate(
        &self,
        _postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> Result<FlyerMatch, ListingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.found.clone().ok_or_else(|| ListingError::NoMatch {
            merchant: merchant.to_string(),
            category: category.to_string(),
        })
    }
}

// ============================================================================
// Acquisition pipeline
// ============================================================================

/// Acquirer replaying queued results; fails once the queue is empty
#[derive(Clone)]
pub struct FakeAcquirer {
    results: Arc<Mutex<VecDeque<Option<FlyerAcquisition>>>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl FakeAcquirer {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Queue a successful acquisition
    pub fn then_acquire(self, flyer_id: &str, image_png: Vec<u8>) -> Self {
        self.results.lock().unwrap().push_back(Some(FlyerAcquisition {
            flyer_id: flyer_id.to_string(),
            image_png,
        }));
        self
    }

    /// Queue a failed acquisition
    pub fn then_fail(self) -> Self {
        self.results.lock().unwrap().push_back(None);
        self
    }

    /// Pause inside every acquisition
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FlyerAcquirer for FakeAcquirer {
    async fn acquire(
        &self,
        postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> Result<FlyerAcquisition, AcquisitionFailed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.results.lock().unwrap().pop_front().flatten();
        next.ok_or_else(|| AcquisitionFailed {
            merchant: merchant.to_string(),
            postal_code: postal_code.to_string(),
            category: category.to_string(),
        })
    }
}
