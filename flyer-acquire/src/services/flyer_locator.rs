//! Flyer locator
//!
//! Queries the flyer listing endpoint for a postal code and picks the first flyer whose
//! merchant matches (case-insensitive) and whose categories contain the requested
//! category (case-sensitive). Listing order is whatever the remote returns.

use crate::models::{FlyerListing, FlyerMatch};
use crate::utils::http::build_client;
use flyer_common::{AcquisitionConfig, Result};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a flyer could not be located. All of them mean "not found" to callers.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Listing API error {0}")]
    Http(u16),

    #[error("Unparseable listing response: {0}")]
    Parse(String),

    #[error("Listing contains no flyers")]
    EmptyListing,

    #[error("No flyer for merchant '{merchant}' with category '{category}'")]
    NoMatch { merchant: String, category: String },
}

impl ListingError {
    /// Absence of a match, as opposed to a failed or malformed listing call
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListingError::EmptyListing | ListingError::NoMatch { .. })
    }
}

/// Lookup of a flyer's tile path and external id.
pub trait FlyerLookup: Send + Sync {
    fn locate(
        &self,
        postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> impl Future<Output = std::result::Result<FlyerMatch, ListingError>> + Send;
}

/// Parse a listing body
pub fn parse_listing(body: &[u8]) -> std::result::Result<FlyerListing, ListingError> {
    serde_json::from_slice(body).map_err(|e| ListingError::Parse(e.to_string()))
}

/// First flyer in listing order matching merchant and category.
///
/// A matching entry without a usable id or path is skipped and the scan continues.
pub fn find_matching_flyer(
    listing: &FlyerListing,
    merchant: &str,
    category: &str,
) -> std::result::Result<FlyerMatch, ListingError> {
    if listing.flyers.is_empty() {
        return Err(ListingError::EmptyListing);
    }

    for flyer in &listing.flyers {
        if !flyer.merchant_matches(merchant) || !flyer.has_category(category) {
            continue;
        }

        match (flyer.external_id(), flyer.tile_path()) {
            (Some(flyer_id), Some(path)) => {
                info!(flyer_id = %flyer_id, path = %path, "Found matching flyer");
                return Ok(FlyerMatch {
                    flyer_id,
                    path: path.to_string(),
                });
            }
            (id, path) => {
                warn!(
                    merchant = %merchant,
                    id = ?id,
                    path = ?path,
                    "Matching flyer is missing its id or path, skipping"
                );
            }
        }
    }

    Err(ListingError::NoMatch {
        merchant: merchant.to_string(),
        category: category.to_string(),
    })
}

/// Listing client over HTTP
#[derive(Clone)]
pub struct HttpFlyerLocator {
    http_client: reqwest::Client,
    listing_base_url: String,
    locale: String,
    session_id: String,
}

impl HttpFlyerLocator {
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_client(&config.user_agent, config.listing_timeout())?,
            listing_base_url: config.listing_base_url.clone(),
            locale: config.locale.clone(),
            session_id: config.session_id_or_default().to_string(),
        })
    }

    /// Fetch and parse the listing for one postal code
    pub async fn fetch_listing(
        &self,
        postal_code: &str,
    ) -> std::result::Result<FlyerListing, ListingError> {
        debug!(url = %self.listing_base_url, postal_code = %postal_code, "Querying flyer listing");

        let response = self
            .http_client
            .get(&self.listing_base_url)
            .query(&[
                ("locale", self.locale.as_str()),
                ("postal_code", postal_code),
                ("sid", self.session_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ListingError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::Http(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ListingError::Network(e.to_string()))?;

        parse_listing(&body)
    }
}

impl FlyerLookup for HttpFlyerLocator {
    async fn locate(
        &self,
        postal_code: &str,
        merchant: &str,
        category: &str,
    ) -> std::result::Result<FlyerMatch, ListingError> {
        info!(
            merchant = %merchant,
            postal_code = %postal_code,
            category = %category,
            "Locating flyer"
        );

        let result = match self.fetch_listing(postal_code).await {
            Ok(listing) => find_matching_flyer(&listing, merchant, category),
            Err(e) => Err(e),
        };

        match &result {
            Err(e) if e.is_not_found() => {
                info!(merchant = %merchant, postal_code = %postal_code, reason = %e, "No flyer located")
            }
            Err(e) => warn!(merchant = %merchant, postal_code = %postal_code, error = %e, "Flyer listing failed"),
            Ok(_) => {}
        }

        result
    }
}
