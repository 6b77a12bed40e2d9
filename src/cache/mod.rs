//! Freshness-bounded local cache of crawl results, one file per (location, radius).

use crate::error::CacheError;
use crate::models::{CacheEntry, ListingRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default freshness window
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Stored crawl results for a location and radius
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The entry for the key, if one exists and is younger than `max_age`
    async fn get(
        &self,
        location: &str,
        radius: &str,
        max_age: Duration,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Replace the entry for the key
    async fn put(
        &self,
        location: &str,
        radius: &str,
        records: &[ListingRecord],
        captured_at: DateTime<Utc>,
    ) -> Result<(), CacheError>;
}

/// Hex SHA-256 over both key parts
pub fn cache_key(location: &str, radius: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(location.as_bytes());
    hasher.update([0u8]);
    hasher.update(radius.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    captured_at: DateTime<Utc>,
    records: &'a [ListingRecord],
}

/// JSON files in a directory, replaced atomically on write
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, location: &str, radius: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(location, radius)))
    }

    /// Like [`CacheStore::get`], judged against `now`
    pub async fn get_at(
        &self,
        location: &str,
        radius: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(location, radius);

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(location, radius, "No cache entry");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let mut entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                return Ok(None);
            }
        };

        let age = now.signed_duration_since(entry.captured_at);
        let fresh = match chrono::Duration::from_std(max_age) {
            Ok(max_age) => age < max_age,
            Err(_) => true,
        };
        if !fresh {
            debug!(location, radius, age_hours = age.num_hours(), "Cache entry is stale");
            return Ok(None);
        }

        for record in &mut entry.records {
            record.refresh_derived();
        }

        info!(
            location,
            radius,
            records = entry.records.len(),
            captured_at = %entry.captured_at,
            "Serving cached listings"
        );
        Ok(Some(entry))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(
        &self,
        location: &str,
        radius: &str,
        max_age: Duration,
    ) -> Result<Option<CacheEntry>, CacheError> {
        self.get_at(location, radius, max_age, Utc::now()).await
    }

    async fn put(
        &self,
        location: &str,
        radius: &str,
        records: &[ListingRecord],
        captured_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        if records.is_empty() {
            debug!(location, radius, "Not caching an empty result");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let json = serde_json::to_vec_pretty(&CacheFileRef {
            captured_at,
            records,
        })?;

        let path = self.path_for(location, radius);
        let tmp = path.with_extension(format!("{:08x}.tmp", rand::random::<u32>()));

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Io { path, source });
        }

        info!(location, radius, records = records.len(), path = %path.display(), "Cached listings");
        Ok(())
    }
}
