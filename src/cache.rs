//! Per-user catalogue cache.
//!
//! Each user identity gets one JSON file under the cache directory holding
//! their annotated catalogue view. Entries expire after the configured
//! TTL. A live entry containing any paid-but-unpurchased module is not
//! trusted either: it is dropped and refetched once, so a purchase that
//! completed elsewhere can never be hidden behind a stale "buy" state.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::CatalogApi;
use crate::config;
use crate::error::Result;
use crate::identity::UserIdentity;
use crate::models::ModuleRecord;

// ---------------------------------------------------------------------------
// CachedCatalog — one identity's stored catalogue view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCatalog {
    /// Raw identity string the view was fetched for.
    pub identity: String,
    /// Unix timestamp of the fetch, in seconds.
    pub cached_at: u64,
    pub modules: Vec<ModuleRecord>,
}

impl CachedCatalog {
    /// True while the entry is inside its TTL window.
    pub fn is_fresh(&self, ttl_secs: u64, now: u64) -> bool {
        now.saturating_sub(self.cached_at) < ttl_secs
    }

    /// True when any item is paid and not yet purchased for this user.
    /// Such an entry may hide a purchase completed since it was written.
    pub fn has_unresolved_paid(&self) -> bool {
        self.modules.iter().any(|m| m.is_paid && !m.is_purchased)
    }
}

// ---------------------------------------------------------------------------
// CatalogCache
// ---------------------------------------------------------------------------

/// File-backed store of per-identity catalogue views.
pub struct CatalogCache {
    /// Directory where cache entries are stored.
    pub cache_dir: PathBuf,
    ttl_secs: u64,
}

impl CatalogCache {
    /// Create a cache rooted at `cache_dir`, or at the platform default
    /// when `None`. Creates the directory if it does not exist.
    pub fn new(cache_dir: Option<PathBuf>, ttl_secs: u64) -> Result<Self> {
        let dir = cache_dir.unwrap_or_else(config::default_cache_dir);
        fs::create_dir_all(&dir)?;
        Ok(CatalogCache {
            cache_dir: dir,
            ttl_secs,
        })
    }

    fn entry_path(&self, identity: &UserIdentity) -> PathBuf {
        self.cache_dir
            .join(format!("catalog-{}.json", identity.cache_key()))
    }

    /// Read this identity's entry if present, fresh, and parseable.
    ///
    /// Expired entries are deleted on sight. So are corrupt ones, so the
    /// next read refetches instead of failing forever.
    pub fn read(&self, identity: &UserIdentity) -> Option<CachedCatalog> {
        let path = self.entry_path(identity);
        let contents = fs::read_to_string(&path).ok()?;

        let entry: CachedCatalog = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "removing corrupt cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        if !entry.is_fresh(self.ttl_secs, unix_now()) {
            debug!(path = %path.display(), "cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(entry)
    }

    /// Store a freshly fetched catalogue for this identity.
    ///
    /// Writes to a temp file and renames on success, so a reader never
    /// observes a partially written entry.
    pub fn store(&self, identity: &UserIdentity, modules: &[ModuleRecord]) -> Result<()> {
        let entry = CachedCatalog {
            identity: identity.as_str().to_string(),
            cached_at: unix_now(),
            modules: modules.to_vec(),
        };

        let path = self.entry_path(identity);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Serve this identity's catalogue, going through `api` whenever the
    /// cached entry cannot be trusted.
    ///
    /// A fresh entry with no paid-unpurchased items is served with zero
    /// network traffic. An entry holding any such item is dropped and
    /// refetched exactly once before returning.
    pub fn modules_for(
        &self,
        identity: &UserIdentity,
        api: &dyn CatalogApi,
    ) -> Result<Vec<ModuleRecord>> {
        if let Some(entry) = self.read(identity) {
            if !entry.has_unresolved_paid() {
                return Ok(entry.modules);
            }
            debug!(
                identity = identity.as_str(),
                "cache entry holds unresolved paid modules, refetching"
            );
            self.invalidate(identity);
        }

        let modules = api.fetch_catalog(identity)?;
        if let Err(e) = self.store(identity, &modules) {
            warn!(error = %e, "failed to write catalogue cache entry");
        }
        Ok(modules)
    }

    /// Drop this identity's entry, if present.
    pub fn invalidate(&self, identity: &UserIdentity) {
        let _ = fs::remove_file(self.entry_path(identity));
    }

    /// Remove all cached entries and recreate the cache directory.
    pub fn flush(&self) -> Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
