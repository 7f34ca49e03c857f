//! Filesystem helpers for stored flyer images
//!
//! Files are named after the external flyer id (`{id}.png`). New content is written to a
//! staging file beside the target and renamed into place so a reader never sees a
//! half-written image.

use flyer_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const STAGING_MARKER: &str = ".partial-";

/// Target path for a flyer's stored image
pub fn image_path_for(images_dir: &Path, flyer_id: &str) -> Result<PathBuf> {
    validate_flyer_id(flyer_id)?;
    Ok(images_dir.join(format!("{}.png", flyer_id)))
}

/// Flyer ids become file names; only a conservative character set is allowed
pub fn validate_flyer_id(flyer_id: &str) -> Result<()> {
    let valid = !flyer_id.is_empty()
        && flyer_id.len() <= 128
        && flyer_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Unusable flyer id: {:?}", flyer_id)))
    }
}

/// Write bytes to a staging file next to `target`, returning the staging path
pub async fn write_staged(target: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("Bad image path: {}", target.display())))?;
    let staging = target.with_file_name(format!(
        "{}{}{}",
        file_name,
        STAGING_MARKER,
        uuid::Uuid::new_v4().simple()
    ));

    if let Some(parent) = staging.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&staging, bytes).await?;
    Ok(staging)
}

/// Move a staged file over its target
pub async fn commit_staged(staging: &Path, target: &Path) -> Result<()> {
    tokio::fs::rename(staging, target).await?;
    Ok(())
}

/// Remove a file if present. Never fails; problems are logged.
///
/// Returns true when a file was removed.
pub async fn delete_if_exists(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Deleted file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "File already absent");
            false
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to delete file");
            false
        }
    }
}

pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// True when both paths name the same existing file, however they are spelled
pub async fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// True when the file was last modified at least `min_age` ago.
///
/// Unreadable metadata and modification times in the future count as young.
pub async fn is_older_than(path: &Path, min_age: Duration) -> bool {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified
            .elapsed()
            .map(|age| age >= min_age)
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// True for leftovers of an interrupted `write_staged`
pub fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(STAGING_MARKER))
        .unwrap_or(false)
}
