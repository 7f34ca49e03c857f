//! Runtime configuration resolution for flyer-acquire
//!
//! Provides multi-tier resolution of the listing session id with
//! Database → ENV → TOML → built-in default priority.

use flyer_common::config::{TomlConfig, DEFAULT_SESSION_ID};
use flyer_common::{AcquisitionConfig, Result};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment variable carrying the listing session id
pub const SESSION_ID_ENV: &str = "FLYER_CACHE_SESSION_ID";

/// Resolve the listing session id
///
/// **Priority:** Database → ENV → TOML → built-in default
pub async fn resolve_session_id(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let db_id = crate::db::settings::get_listing_session_id(db)
        .await?
        .filter(|id| is_valid_session_id(id));
    let env_id = std::env::var(SESSION_ID_ENV)
        .ok()
        .filter(|id| is_valid_session_id(id));
    let toml_id = toml_config
        .acquisition
        .session_id
        .clone()
        .filter(|id| is_valid_session_id(id));

    let sources: Vec<&str> = [
        (db_id.is_some(), "database"),
        (env_id.is_some(), "environment"),
        (toml_id.is_some(), "TOML"),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, name)| *name)
    .collect();

    // Several sources usually means a stale override somewhere
    if sources.len() > 1 {
        warn!(
            "Listing session id found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(id) = db_id {
        info!("Listing session id loaded from database");
        return Ok(id.trim().to_string());
    }
    if let Some(id) = env_id {
        info!("Listing session id loaded from environment variable");
        return Ok(id.trim().to_string());
    }
    if let Some(id) = toml_id {
        info!("Listing session id loaded from TOML config");
        return Ok(id.trim().to_string());
    }

    info!("Listing session id not configured, using built-in default");
    Ok(DEFAULT_SESSION_ID.to_string())
}

/// Session ids must be non-empty after trimming
pub fn is_valid_session_id(id: &str) -> bool {
    !id.trim().is_empty()
}

/// Final acquisition config: TOML values plus the resolved session id
pub async fn build_acquisition_config(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<AcquisitionConfig> {
    let mut config = toml_config.acquisition.clone();
    config.session_id = Some(resolve_session_id(db, toml_config).await?);
    config.validate()?;
    Ok(config)
}
