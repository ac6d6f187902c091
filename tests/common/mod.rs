//! Shared test fixtures: raw catalogue items, a scripted catalogue API
//! with call counters, archive builders, and an SDK harness wired to a
//! temp directory.
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};

use bazaar_sdk::{
    BazaarError, BazaarSdk, CachedCatalog, CatalogApi, CheckoutOutcome, CheckoutUrls,
    ModuleRecord, Result, Settings, UserIdentity, Verification,
};

/// Origin the test settings point at; fallback download URLs derive
/// from it.
pub const DOWNLOAD_BASE: &str = "https://api.example.test";

// ---------------------------------------------------------------------------
// Raw catalogue items
// ---------------------------------------------------------------------------

pub fn raw_free_module() -> Value {
    json!({
        "id": "polls",
        "name": "Polls",
        "description": "Create polls and surveys in your spaces",
        "version": "2.1.0",
        "price": 0,
        "is_paid": false,
        "category": "social",
        "download_url": "https://cdn.example.test/modules/polls.tar.gz",
    })
}

pub fn raw_paid_module() -> Value {
    json!({
        "id": 42,
        "name": "Task Manager Pro",
        "description": "Advanced task management for teams",
        "version": "3.0.1",
        "price": "$9.99",
        "is_paid": true,
        "is_purchased": false,
        "product_id": "prod_tm42",
        "price_id": "price_tm42",
    })
}

pub fn raw_purchased_module() -> Value {
    json!({
        "id": "wiki-plus",
        "name": "Wiki Plus",
        "description": "Extended wiki pages with version history",
        "price": 19.99,
        "isPaid": true,
        "isPurchased": true,
        "downloadUrl": "https://cdn.example.test/modules/wiki-plus.tar.gz",
    })
}

pub fn raw_soon_module() -> Value {
    json!({
        "id": "crm",
        "name": "CRM Suite",
        "description": "Customer relationship management",
        "price": 49.0,
        "is_paid": true,
        "is_soon": true,
    })
}

pub fn record(raw: &Value) -> ModuleRecord {
    ModuleRecord::from_raw(raw, DOWNLOAD_BASE)
}

/// Free, paid-unpurchased, purchased, and coming-soon, in that order.
pub fn sample_catalog() -> Vec<ModuleRecord> {
    vec![
        record(&raw_free_module()),
        record(&raw_paid_module()),
        record(&raw_purchased_module()),
        record(&raw_soon_module()),
    ]
}

/// Catalogue with no paid-unpurchased modules, so a cached entry is
/// fully resolved and can be served without refetching.
pub fn resolved_catalog() -> Vec<ModuleRecord> {
    vec![record(&raw_free_module()), record(&raw_purchased_module())]
}

// ---------------------------------------------------------------------------
// ScriptedApi — canned CatalogApi responses with call counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum PurchaseScript {
    Free,
    Redirect {
        checkout_url: String,
        session_id: Option<String>,
    },
    Fail(String),
}

pub struct ScriptedApi {
    catalog: Mutex<Vec<ModuleRecord>>,
    pub fail_catalog: AtomicBool,
    pub fail_fetch_module: AtomicBool,
    pub fail_download: AtomicBool,
    pub purchased_status: AtomicBool,
    purchase_script: Mutex<PurchaseScript>,
    verification: Mutex<Verification>,
    archive: Mutex<Vec<u8>>,

    catalog_calls: AtomicUsize,
    module_calls: AtomicUsize,
    purchase_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    status_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new(catalog: Vec<ModuleRecord>) -> Arc<Self> {
        Arc::new(ScriptedApi {
            catalog: Mutex::new(catalog),
            fail_catalog: AtomicBool::new(false),
            fail_fetch_module: AtomicBool::new(false),
            fail_download: AtomicBool::new(false),
            purchased_status: AtomicBool::new(false),
            purchase_script: Mutex::new(PurchaseScript::Fail("no purchase scripted".into())),
            verification: Mutex::new(Verification::failed("no verification scripted")),
            archive: Mutex::new(Vec::new()),
            catalog_calls: AtomicUsize::new(0),
            module_calls: AtomicUsize::new(0),
            purchase_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        })
    }

    // -- Scripting ----

    pub fn set_catalog(&self, modules: Vec<ModuleRecord>) {
        *self.catalog.lock().unwrap() = modules;
    }

    pub fn script_purchase(&self, script: PurchaseScript) {
        *self.purchase_script.lock().unwrap() = script;
    }

    pub fn script_verification(&self, verification: Verification) {
        *self.verification.lock().unwrap() = verification;
    }

    pub fn script_archive(&self, bytes: Vec<u8>) {
        *self.archive.lock().unwrap() = bytes;
    }

    // -- Counters ----

    pub fn catalog_fetches(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn module_fetches(&self) -> usize {
        self.module_calls.load(Ordering::SeqCst)
    }

    pub fn purchase_attempts(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }

    pub fn verifications(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Every remote call of any kind.
    pub fn network_calls(&self) -> usize {
        self.catalog_fetches()
            + self.module_fetches()
            + self.purchase_attempts()
            + self.verifications()
            + self.status_checks()
            + self.downloads()
    }
}

impl CatalogApi for ScriptedApi {
    fn fetch_catalog(&self, _identity: &UserIdentity) -> Result<Vec<ModuleRecord>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(BazaarError::Api("catalogue unreachable".to_string()));
        }
        Ok(self.catalog.lock().unwrap().clone())
    }

    fn fetch_module(&self, id: &str, _identity: &UserIdentity) -> Result<Option<ModuleRecord>> {
        self.module_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch_module.load(Ordering::SeqCst) {
            return Err(BazaarError::Api("module endpoint unreachable".to_string()));
        }
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    fn purchase(
        &self,
        id: &str,
        _urls: &CheckoutUrls,
        _identity: &UserIdentity,
    ) -> Result<CheckoutOutcome> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        match self.purchase_script.lock().unwrap().clone() {
            PurchaseScript::Free => Ok(CheckoutOutcome::Free),
            PurchaseScript::Redirect {
                checkout_url,
                session_id,
            } => Ok(CheckoutOutcome::Redirect {
                checkout_url,
                session_id,
            }),
            PurchaseScript::Fail(reason) => {
                Err(BazaarError::Purchase(format!("module {id}: {reason}")))
            }
        }
    }

    fn verify_purchase(&self, _session_id: &str, _user_session: &str) -> Verification {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verification.lock().unwrap().clone()
    }

    fn check_purchase_status(&self, _id: &str, _identity: &UserIdentity) -> bool {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.purchased_status.load(Ordering::SeqCst)
    }

    fn download(&self, _url: &str, dest: &mut dyn Write) -> Result<u64> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(BazaarError::Api("download host unreachable".to_string()));
        }
        let bytes = self.archive.lock().unwrap().clone();
        dest.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Boxable handle sharing one [`ScriptedApi`] between the SDK and the
/// test's assertions.
pub struct SharedApi(pub Arc<ScriptedApi>);

impl CatalogApi for SharedApi {
    fn fetch_catalog(&self, identity: &UserIdentity) -> Result<Vec<ModuleRecord>> {
        self.0.fetch_catalog(identity)
    }

    fn fetch_module(&self, id: &str, identity: &UserIdentity) -> Result<Option<ModuleRecord>> {
        self.0.fetch_module(id, identity)
    }

    fn purchase(
        &self,
        id: &str,
        urls: &CheckoutUrls,
        identity: &UserIdentity,
    ) -> Result<CheckoutOutcome> {
        self.0.purchase(id, urls, identity)
    }

    fn verify_purchase(&self, session_id: &str, user_session: &str) -> Verification {
        self.0.verify_purchase(session_id, user_session)
    }

    fn check_purchase_status(&self, id: &str, identity: &UserIdentity) -> bool {
        self.0.check_purchase_status(id, identity)
    }

    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        self.0.download(url, dest)
    }
}

// ---------------------------------------------------------------------------
// SDK harness
// ---------------------------------------------------------------------------

pub fn test_settings(tmp: &Path) -> Settings {
    Settings {
        api_base_url: format!("{DOWNLOAD_BASE}/v1"),
        site_url: "https://social.example.test".to_string(),
        cache_dir: Some(tmp.join("cache")),
        modules_dir: Some(tmp.join("modules")),
        ..Settings::default()
    }
}

/// SDK wired to the scripted API, caching and installing under `tmp`.
pub fn sdk_with(api: &Arc<ScriptedApi>, tmp: &Path) -> BazaarSdk {
    BazaarSdk::builder()
        .settings(test_settings(tmp))
        .api(Box::new(SharedApi(api.clone())))
        .build()
        .unwrap()
}

pub fn admin() -> UserIdentity {
    UserIdentity::email("admin@example.test")
}

pub fn cache_entry_path(sdk: &BazaarSdk, user: &UserIdentity) -> PathBuf {
    sdk.cache()
        .cache_dir
        .join(format!("catalog-{}.json", user.cache_key()))
}

/// Write a cache entry directly with a back-dated timestamp, for TTL
/// tests that must not sleep.
pub fn write_cache_entry(
    sdk: &BazaarSdk,
    user: &UserIdentity,
    modules: &[ModuleRecord],
    age_secs: u64,
) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let entry = CachedCatalog {
        identity: user.as_str().to_string(),
        cached_at: now - age_secs,
        modules: modules.to_vec(),
    };
    fs::create_dir_all(&sdk.cache().cache_dir).unwrap();
    fs::write(
        cache_entry_path(sdk, user),
        serde_json::to_vec(&entry).unwrap(),
    )
    .unwrap();
}

// ---------------------------------------------------------------------------
// Archive builders
// ---------------------------------------------------------------------------

/// Gzipped tarball holding `<dir_name>/<manifest_name>` plus a README,
/// the layout real module archives use.
pub fn module_tarball(dir_name: &str, manifest_name: &str) -> Vec<u8> {
    let mut tarball = Vec::new();
    {
        let encoder = GzEncoder::new(&mut tarball, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append_file(
            &mut builder,
            &format!("{dir_name}/{manifest_name}"),
            b"{\"id\": \"test-module\"}",
        );
        append_file(&mut builder, &format!("{dir_name}/README.md"), b"readme");
        builder.into_inner().unwrap().finish().unwrap();
    }
    tarball
}

/// Gzipped tarball with no manifest anywhere, for fallback-name tests.
pub fn plain_tarball(dir_name: &str) -> Vec<u8> {
    let mut tarball = Vec::new();
    {
        let encoder = GzEncoder::new(&mut tarball, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append_file(&mut builder, &format!("{dir_name}/README.md"), b"readme");
        builder.into_inner().unwrap().finish().unwrap();
    }
    tarball
}

fn append_file<W: Write>(builder: &mut tar::Builder<W>, path: &str, contents: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, contents).unwrap();
}
