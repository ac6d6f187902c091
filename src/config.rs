//! SDK configuration and settings persistence.
//!
//! [`Settings`] is the full configuration surface: the catalogue endpoint,
//! optional API key, cache TTL, the purchasing kill switch, and the local
//! directories the SDK writes to. [`SettingsStore`] abstracts where the
//! admin-editable subset lives, so a host application can keep it in its
//! own settings backend while tests use an in-memory store.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BazaarError, Result};

/// Catalogue endpoint used when no other is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://api.greenmeteor.net/v1";

/// Catalogue cache TTL bounds and default, in seconds.
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 3600;
pub const MIN_CACHE_TIMEOUT_SECS: u64 = 60;
pub const MAX_CACHE_TIMEOUT_SECS: u64 = 86400;

const KEY_API_BASE_URL: &str = "apiBaseUrl";
const KEY_API_KEY: &str = "apiKey";
const KEY_CACHE_TIMEOUT: &str = "cacheTimeout";
const KEY_ENABLE_PURCHASING: &str = "enablePurchasing";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Full SDK configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the module catalogue API.
    pub api_base_url: String,

    /// Optional bearer token sent with every upstream request.
    pub api_key: Option<String>,

    /// Catalogue cache TTL in seconds. Kept within
    /// [`MIN_CACHE_TIMEOUT_SECS`]..=[`MAX_CACHE_TIMEOUT_SECS`] by
    /// [`Settings::validate`].
    pub cache_timeout: u64,

    /// Kill switch for the purchase flow. When false, purchase initiation
    /// is refused before any network traffic happens.
    pub enable_purchasing: bool,

    /// Explicit purchase verification endpoint. When unset, it is derived
    /// from `api_base_url` as a sibling `verify-purchase.php`.
    pub verify_url: Option<String>,

    /// Public URL of the host site, sent along with purchase initiation so
    /// the upstream can associate the checkout with the installation.
    pub site_url: String,

    /// Where per-user catalogue cache files live. Platform cache directory
    /// when unset.
    pub cache_dir: Option<PathBuf>,

    /// Where downloaded modules are unpacked. A relative `modules`
    /// directory when unset.
    pub modules_dir: Option<PathBuf>,

    /// Timeout for catalogue API calls.
    #[serde(skip, default = "default_http_timeout")]
    pub http_timeout: Duration,

    /// Timeout for archive downloads, which can run much longer than API
    /// responses.
    #[serde(skip, default = "default_download_timeout")]
    pub download_timeout: Duration,
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(120)
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            cache_timeout: DEFAULT_CACHE_TIMEOUT_SECS,
            enable_purchasing: true,
            verify_url: None,
            site_url: String::new(),
            cache_dir: None,
            modules_dir: None,
            http_timeout: default_http_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

impl Settings {
    /// Check the configuration for values the SDK cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(BazaarError::InvalidConfig(
                "apiBaseUrl is required".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BazaarError::InvalidConfig(format!(
                "apiBaseUrl must be an http(s) URL, got '{url}'"
            )));
        }
        if !(MIN_CACHE_TIMEOUT_SECS..=MAX_CACHE_TIMEOUT_SECS).contains(&self.cache_timeout) {
            return Err(BazaarError::InvalidConfig(format!(
                "cacheTimeout must be between {MIN_CACHE_TIMEOUT_SECS} and \
                 {MAX_CACHE_TIMEOUT_SECS} seconds, got {}",
                self.cache_timeout
            )));
        }
        if self.api_key.as_deref().is_some_and(|k| k.len() > 255) {
            return Err(BazaarError::InvalidConfig(
                "apiKey must be at most 255 characters".to_string(),
            ));
        }
        Ok(())
    }

    // -- Derived endpoints -------------------------------------------------

    /// The purchase verification endpoint.
    ///
    /// An explicit `verify_url` wins. Otherwise the endpoint lives next to
    /// the API base: a final file-like path segment (one containing a dot)
    /// is replaced with `verify-purchase.php`, anything else gets it
    /// appended.
    pub fn verify_endpoint(&self) -> String {
        if let Some(url) = self.verify_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        if let Ok(mut url) = reqwest::Url::parse(&self.api_base_url) {
            let replace_last = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .is_some_and(|last| last.contains('.'));
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty();
                if replace_last {
                    segments.pop();
                }
                segments.push("verify-purchase.php");
            }
            url.set_query(None);
            return url.to_string();
        }
        format!(
            "{}/verify-purchase.php",
            self.api_base_url.trim_end_matches('/')
        )
    }

    /// Origin of the API base URL, used to synthesize download URLs for
    /// modules the upstream lists without one.
    pub fn download_base(&self) -> String {
        if let Ok(url) = reqwest::Url::parse(&self.api_base_url) {
            if let Some(host) = url.host_str() {
                return match url.port() {
                    Some(port) => format!("{}://{host}:{port}", url.scheme()),
                    None => format!("{}://{host}", url.scheme()),
                };
            }
        }
        self.api_base_url.trim_end_matches('/').to_string()
    }

    /// Whether `url` shares the API base's origin (scheme, host, port).
    ///
    /// The bearer key must never reach any other origin: catalogue
    /// entries can carry download URLs on third-party hosts, and those
    /// are fetched with a plain request. Unparseable URLs count as
    /// foreign.
    pub fn is_api_origin(&self, url: &str) -> bool {
        match (
            reqwest::Url::parse(&self.api_base_url),
            reqwest::Url::parse(url),
        ) {
            (Ok(base), Ok(candidate)) => {
                base.scheme() == candidate.scheme()
                    && base.host_str() == candidate.host_str()
                    && base.port_or_known_default() == candidate.port_or_known_default()
            }
            _ => false,
        }
    }

    // -- Persistence -------------------------------------------------------

    /// Build settings from a store, falling back to defaults for anything
    /// missing or unparseable. The result is not validated here; callers
    /// decide when to enforce [`Settings::validate`].
    pub fn load(store: &dyn SettingsStore) -> Settings {
        let mut settings = Settings::default();
        if let Some(url) = store.get(KEY_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            settings.api_base_url = url;
        }
        settings.api_key = store.get(KEY_API_KEY).filter(|v| !v.is_empty());
        if let Some(timeout) = store
            .get(KEY_CACHE_TIMEOUT)
            .and_then(|v| v.trim().parse().ok())
        {
            settings.cache_timeout = timeout;
        }
        if let Some(flag) = store.get(KEY_ENABLE_PURCHASING) {
            settings.enable_purchasing = parse_flag(&flag);
        }
        settings
    }

    /// Write the admin-editable subset back to a store.
    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<()> {
        store.set(KEY_API_BASE_URL, &self.api_base_url)?;
        store.set(KEY_API_KEY, self.api_key.as_deref().unwrap_or(""))?;
        store.set(KEY_CACHE_TIMEOUT, &self.cache_timeout.to_string())?;
        store.set(
            KEY_ENABLE_PURCHASING,
            if self.enable_purchasing { "1" } else { "0" },
        )?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "on" | "yes")
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Backing storage for the admin-editable settings subset.
pub trait SettingsStore {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Settings stored as a flat JSON object in a single file.
///
/// Values are held in memory and rewritten on every `set`, with a temp
/// file plus rename so a crash mid-write never truncates the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open a store at `path`, reading any existing values.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(JsonFileStore { path, values })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.values.insert(name.to_string(), value.to_string());
        self.persist()
    }
}

/// Ephemeral store for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Default directories
// ---------------------------------------------------------------------------

pub fn default_cache_dir() -> PathBuf {
    if let Some(cache) = dirs::cache_dir() {
        cache.join("bazaar-sdk")
    } else {
        PathBuf::from(".bazaar-sdk-cache")
    }
}

pub fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}
