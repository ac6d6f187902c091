//! Green Meteor module bazaar SDK.
//!
//! Provides a high-level client for the module catalogue: browse and
//! search modules, purchase paid ones through the hosted checkout flow,
//! and install downloaded archives into a local modules directory.
//! Catalogue views are cached on disk per user, with purchase-aware
//! invalidation so a completed checkout is never hidden by a stale entry.
//!
//! # Quick start
//!
//! ```no_run
//! use bazaar_sdk::{BazaarSdk, ListFilter, Settings, UserIdentity};
//!
//! let sdk = BazaarSdk::builder()
//!     .settings(Settings {
//!         site_url: "https://social.example.com".into(),
//!         ..Settings::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! let user = UserIdentity::email("admin@example.com");
//!
//! // Browse the catalogue
//! let modules = sdk.catalog().list(&user, &ListFilter::default());
//!
//! // Install a free module
//! let outcome = sdk.install(&user, "polls").unwrap();
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod install;
pub mod models;
pub mod purchase;

#[cfg(feature = "async")]
pub use async_client::AsyncBazaarSdk;
pub use cache::{CachedCatalog, CatalogCache};
pub use catalog::{CatalogQuery, ListFilter, SortOrder};
pub use client::{ApiClient, CatalogApi};
pub use config::{JsonFileStore, MemoryStore, Settings, SettingsStore};
pub use error::{BazaarError, Result};
pub use identity::UserIdentity;
pub use install::{InstallOutcome, Installer};
pub use models::{
    Category, CheckoutOutcome, CheckoutUrls, ConnectionReport, ModuleRecord, PurchaseState,
    Verification,
};
pub use purchase::PurchaseFlow;

use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// BazaarSdkBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`BazaarSdk`] instance.
///
/// Use [`BazaarSdk::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](BazaarSdkBuilder::build) to create the SDK.
#[derive(Default)]
pub struct BazaarSdkBuilder {
    settings: Settings,
    api: Option<Box<dyn CatalogApi>>,
}

impl BazaarSdkBuilder {
    /// Replace the whole configuration at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Read the admin-editable settings subset from a store, keeping
    /// defaults for everything else.
    pub fn from_store(mut self, store: &dyn SettingsStore) -> Self {
        self.settings = Settings::load(store);
        self
    }

    /// Set a custom cache directory.
    ///
    /// If not set, the platform-appropriate default cache directory is
    /// used (e.g. `~/.cache/bazaar-sdk` on Linux, `~/Library/Caches/bazaar-sdk`
    /// on macOS, `%LOCALAPPDATA%\bazaar-sdk` on Windows).
    pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the directory modules are unpacked into. Defaults to a
    /// relative `modules` directory.
    pub fn modules_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings.modules_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Substitute a custom [`CatalogApi`] transport. The default is an
    /// [`ApiClient`] built from the settings; tests and alternative
    /// backends plug in here.
    pub fn api(mut self, api: Box<dyn CatalogApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Build the SDK, validating the settings and initializing the cache
    /// directory. No network traffic happens here; the catalogue is
    /// fetched lazily on first use.
    pub fn build(self) -> Result<BazaarSdk> {
        self.settings.validate()?;
        let cache = CatalogCache::new(self.settings.cache_dir.clone(), self.settings.cache_timeout)?;
        let api = match self.api {
            Some(api) => api,
            None => Box::new(ApiClient::new(self.settings.clone())?),
        };
        let modules_dir = self
            .settings
            .modules_dir
            .clone()
            .unwrap_or_else(config::default_modules_dir);
        Ok(BazaarSdk {
            settings: self.settings,
            api,
            cache,
            modules_dir,
        })
    }
}

// ---------------------------------------------------------------------------
// BazaarSdk
// ---------------------------------------------------------------------------

/// The main entry point for the bazaar SDK.
///
/// Owns the configuration, the upstream transport, and the per-user
/// catalogue cache, and exposes domain interfaces as lightweight
/// borrowing wrappers.
///
/// Created via [`BazaarSdk::builder()`].
pub struct BazaarSdk {
    settings: Settings,
    api: Box<dyn CatalogApi>,
    cache: CatalogCache,
    modules_dir: PathBuf,
}

impl BazaarSdk {
    /// Create a new builder for configuring the SDK.
    pub fn builder() -> BazaarSdkBuilder {
        BazaarSdkBuilder::default()
    }

    // -- Interface accessors -----------------------------------------------

    /// Access the catalogue query interface.
    pub fn catalog(&self) -> CatalogQuery<'_> {
        CatalogQuery::new(self.api.as_ref(), &self.cache)
    }

    /// Access the purchase flow.
    pub fn purchases(&self) -> PurchaseFlow<'_> {
        PurchaseFlow::new(&self.settings, self.api.as_ref(), &self.cache)
    }

    /// Access the installer.
    pub fn installer(&self) -> Installer<'_> {
        Installer::new(self.api.as_ref(), &self.cache, &self.modules_dir)
    }

    // -- Operations --------------------------------------------------------

    /// Install module `id` for `user`, checking the download gate first.
    ///
    /// Pre-release modules and unpurchased paid modules are refused
    /// before anything is downloaded.
    pub fn install(&self, user: &UserIdentity, id: &str) -> Result<InstallOutcome> {
        let module = self
            .catalog()
            .get(user, id)
            .ok_or_else(|| BazaarError::NotFound(format!("module {id}")))?;

        if module.is_soon {
            return Err(BazaarError::NotDownloadable(format!(
                "module {id} is not released yet"
            )));
        }
        if module.is_paid && !module.is_purchased {
            return Err(BazaarError::NotDownloadable(format!(
                "module {id} must be purchased first"
            )));
        }
        self.installer().install(&module)
    }

    /// Check upstream connectivity with a strict catalogue fetch,
    /// reporting the reachable module count.
    pub fn test_connection(&self, user: &UserIdentity) -> ConnectionReport {
        match self.api.fetch_catalog(user) {
            Ok(modules) => ConnectionReport {
                ok: true,
                module_count: modules.len(),
                message: format!("Connection successful. Found {} modules.", modules.len()),
            },
            Err(e) => ConnectionReport {
                ok: false,
                module_count: 0,
                message: format!("Connection failed: {e}"),
            },
        }
    }

    /// Remove every cached catalogue entry, for all users.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.flush()
    }

    // -- Accessors ---------------------------------------------------------

    /// Return a reference to the active [`Settings`].
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Return a reference to the underlying [`CatalogCache`] for advanced usage.
    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Return the directory modules are unpacked into.
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for BazaarSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BazaarSdk(api_base={}, cache_dir={}, purchasing={})",
            self.settings.api_base_url,
            self.cache.cache_dir.display(),
            if self.settings.enable_purchasing {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}
