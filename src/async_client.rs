//! Async wrapper around [`BazaarSdk`] for use in async runtimes (Tokio, etc.).
//!
//! Runs all SDK operations on a blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free
//! while the SDK does blocking HTTP and filesystem work.
//!
//! # Example
//!
//! ```no_run
//! use bazaar_sdk::{AsyncBazaarSdk, ListFilter, UserIdentity};
//!
//! #[tokio::main]
//! async fn main() {
//!     let sdk = AsyncBazaarSdk::builder().build().await.unwrap();
//!     let user = UserIdentity::email("admin@example.com");
//!
//!     // Run any sync SDK method via closure
//!     let modules = sdk
//!         .run(move |s| Ok(s.catalog().list(&user, &ListFilter::default())))
//!         .await
//!         .unwrap();
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::catalog::ListFilter;
use crate::error::{BazaarError, Result};
use crate::identity::UserIdentity;
use crate::install::InstallOutcome;
use crate::models::{CheckoutUrls, ConnectionReport, ModuleRecord, PurchaseState};
use crate::{BazaarSdk, Settings};

// ---------------------------------------------------------------------------
// AsyncBazaarSdkBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing an [`AsyncBazaarSdk`] instance.
#[derive(Default)]
pub struct AsyncBazaarSdkBuilder {
    settings: Settings,
    cache_dir: Option<PathBuf>,
    modules_dir: Option<PathBuf>,
}

impl AsyncBazaarSdkBuilder {
    /// Replace the whole configuration at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set a custom cache directory.
    pub fn cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the directory modules are unpacked into.
    pub fn modules_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.modules_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Build the async SDK. Initialization runs on the blocking thread
    /// pool so it won't block the async event loop.
    pub async fn build(self) -> Result<AsyncBazaarSdk> {
        tokio::task::spawn_blocking(move || {
            let mut builder = BazaarSdk::builder().settings(self.settings);
            if let Some(dir) = self.cache_dir {
                builder = builder.cache_dir(dir);
            }
            if let Some(dir) = self.modules_dir {
                builder = builder.modules_dir(dir);
            }
            let sdk = builder.build()?;
            Ok(AsyncBazaarSdk {
                inner: Arc::new(Mutex::new(sdk)),
            })
        })
        .await
        .map_err(|e| BazaarError::InvalidArgument(format!("Task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// AsyncBazaarSdk
// ---------------------------------------------------------------------------

/// Async wrapper around [`BazaarSdk`].
///
/// All operations are dispatched to a blocking thread pool via
/// [`tokio::task::spawn_blocking`]. The underlying [`BazaarSdk`] is
/// protected by a [`Mutex`] so operations serialize cleanly.
///
/// Use [`run()`](Self::run) for anything not covered by the convenience
/// methods:
///
/// ```no_run
/// # use bazaar_sdk::{AsyncBazaarSdk, UserIdentity};
/// # async fn example() -> bazaar_sdk::Result<()> {
/// let sdk = AsyncBazaarSdk::builder().build().await?;
/// let user = UserIdentity::session("abc123");
/// let report = sdk.run(move |s| Ok(s.test_connection(&user))).await?;
/// # Ok(())
/// # }
/// ```
pub struct AsyncBazaarSdk {
    inner: Arc<Mutex<BazaarSdk>>,
}

impl AsyncBazaarSdk {
    /// Create a new builder for configuring the async SDK.
    pub fn builder() -> AsyncBazaarSdkBuilder {
        AsyncBazaarSdkBuilder::default()
    }

    /// Run a sync SDK operation on the blocking thread pool.
    ///
    /// The closure receives a `&BazaarSdk` reference and should return a
    /// `Result<T>`.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BazaarSdk) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sdk = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = sdk
                .lock()
                .map_err(|_| BazaarError::InvalidArgument("SDK lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| BazaarError::InvalidArgument(format!("Task join error: {e}")))?
    }

    // -- Catalogue ---------------------------------------------------------

    /// List the catalogue for `user` asynchronously.
    pub async fn list(&self, user: UserIdentity, filter: ListFilter) -> Result<Vec<ModuleRecord>> {
        self.run(move |s| Ok(s.catalog().list(&user, &filter))).await
    }

    /// Look up one module by id asynchronously.
    pub async fn get(&self, user: UserIdentity, id: String) -> Result<Option<ModuleRecord>> {
        self.run(move |s| Ok(s.catalog().get(&user, &id))).await
    }

    // -- Purchases ---------------------------------------------------------

    /// Initiate a purchase asynchronously.
    pub async fn begin_purchase(
        &self,
        user: UserIdentity,
        id: String,
        urls: CheckoutUrls,
    ) -> Result<PurchaseState> {
        self.run(move |s| s.purchases().begin(&user, &id, &urls)).await
    }

    /// Verify a checkout session asynchronously.
    pub async fn complete_purchase(
        &self,
        user: UserIdentity,
        id: String,
        session_id: String,
    ) -> Result<PurchaseState> {
        self.run(move |s| Ok(s.purchases().complete(&user, &id, &session_id)))
            .await
    }

    /// Confirm a purchase via a fresh status check asynchronously.
    pub async fn confirm_purchase(&self, user: UserIdentity, id: String) -> Result<PurchaseState> {
        self.run(move |s| Ok(s.purchases().confirm(&user, &id))).await
    }

    // -- Install and maintenance -------------------------------------------

    /// Install a module asynchronously.
    pub async fn install(&self, user: UserIdentity, id: String) -> Result<InstallOutcome> {
        self.run(move |s| s.install(&user, &id)).await
    }

    /// Check upstream connectivity asynchronously.
    pub async fn test_connection(&self, user: UserIdentity) -> Result<ConnectionReport> {
        self.run(move |s| Ok(s.test_connection(&user))).await
    }

    /// Remove every cached catalogue entry asynchronously.
    pub async fn clear_cache(&self) -> Result<()> {
        self.run(|s| s.clear_cache()).await
    }
}
