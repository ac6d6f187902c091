mod common;

use std::sync::atomic::Ordering;

use bazaar_sdk::{
    BazaarError, BazaarSdk, JsonFileStore, MemoryStore, Settings, SettingsStore, UserIdentity,
};

use common::{admin, sample_catalog, sdk_with, ScriptedApi};

// ---------------------------------------------------------------------------
// Defaults and validation
// ---------------------------------------------------------------------------

#[test]
fn default_settings() {
    let s = Settings::default();
    assert_eq!(s.api_base_url, "https://api.greenmeteor.net/v1");
    assert_eq!(s.api_key, None);
    assert_eq!(s.cache_timeout, 3600);
    assert!(s.enable_purchasing);
    assert!(s.validate().is_ok());
}

#[test]
fn cache_timeout_bounds() {
    let mut s = Settings::default();

    s.cache_timeout = 59;
    assert!(s.validate().is_err());
    s.cache_timeout = 60;
    assert!(s.validate().is_ok());
    s.cache_timeout = 86400;
    assert!(s.validate().is_ok());
    s.cache_timeout = 86401;
    assert!(s.validate().is_err());
}

#[test]
fn api_base_url_must_be_http() {
    let mut s = Settings::default();

    s.api_base_url = "ftp://files.example.test".to_string();
    assert!(matches!(
        s.validate(),
        Err(BazaarError::InvalidConfig(_))
    ));

    s.api_base_url = "   ".to_string();
    assert!(s.validate().is_err());
}

#[test]
fn api_key_length_is_capped() {
    let mut s = Settings::default();

    s.api_key = Some("k".repeat(255));
    assert!(s.validate().is_ok());
    s.api_key = Some("k".repeat(256));
    assert!(s.validate().is_err());
}

// ---------------------------------------------------------------------------
// Derived endpoints
// ---------------------------------------------------------------------------

#[test]
fn verify_endpoint_replaces_file_like_segment() {
    let s = Settings {
        api_base_url: "https://greenmeteor.net/api/modules.php".to_string(),
        ..Settings::default()
    };
    assert_eq!(
        s.verify_endpoint(),
        "https://greenmeteor.net/api/verify-purchase.php"
    );
}

#[test]
fn verify_endpoint_appends_to_path_base() {
    let s = Settings {
        api_base_url: "https://api.greenmeteor.net/v1".to_string(),
        ..Settings::default()
    };
    assert_eq!(
        s.verify_endpoint(),
        "https://api.greenmeteor.net/v1/verify-purchase.php"
    );
}

#[test]
fn verify_endpoint_on_bare_host() {
    let s = Settings {
        api_base_url: "https://api.greenmeteor.net".to_string(),
        ..Settings::default()
    };
    assert_eq!(
        s.verify_endpoint(),
        "https://api.greenmeteor.net/verify-purchase.php"
    );
}

#[test]
fn verify_endpoint_ignores_trailing_slash_and_query() {
    let s = Settings {
        api_base_url: "https://x.test/api/modules.php?v=2".to_string(),
        ..Settings::default()
    };
    assert_eq!(s.verify_endpoint(), "https://x.test/api/verify-purchase.php");

    let s = Settings {
        api_base_url: "https://x.test/api/".to_string(),
        ..Settings::default()
    };
    assert_eq!(s.verify_endpoint(), "https://x.test/api/verify-purchase.php");
}

#[test]
fn explicit_verify_url_wins() {
    let s = Settings {
        api_base_url: "https://api.greenmeteor.net/v1".to_string(),
        verify_url: Some("https://verify.example.test/check".to_string()),
        ..Settings::default()
    };
    assert_eq!(s.verify_endpoint(), "https://verify.example.test/check");
}

#[test]
fn download_base_is_the_origin() {
    let s = Settings {
        api_base_url: "https://api.greenmeteor.net/v1".to_string(),
        ..Settings::default()
    };
    assert_eq!(s.download_base(), "https://api.greenmeteor.net");

    let s = Settings {
        api_base_url: "http://localhost:8080/api".to_string(),
        ..Settings::default()
    };
    assert_eq!(s.download_base(), "http://localhost:8080");
}

#[test]
fn api_origin_matches_scheme_host_and_port() {
    let s = Settings {
        api_base_url: "https://api.greenmeteor.net/v1".to_string(),
        ..Settings::default()
    };

    assert!(s.is_api_origin("https://api.greenmeteor.net/files/polls.tar.gz"));
    assert!(s.is_api_origin("https://api.greenmeteor.net:443/files/polls.tar.gz"));
    assert!(!s.is_api_origin("http://api.greenmeteor.net/files/polls.tar.gz"));
    assert!(!s.is_api_origin("https://api.greenmeteor.net:8443/files/polls.tar.gz"));
}

#[test]
fn third_party_download_hosts_are_not_the_api_origin() {
    let s = Settings {
        api_base_url: "https://api.example.test/v1".to_string(),
        ..Settings::default()
    };

    // The bearer key is withheld from these.
    assert!(!s.is_api_origin("https://cdn.example.test/modules/polls.tar.gz"));
    assert!(!s.is_api_origin("not a url"));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn settings_round_trip_through_a_store() {
    let mut store = MemoryStore::new();
    let mut s = Settings::default();
    s.api_base_url = "https://bazaar.example.test/api".to_string();
    s.api_key = Some("secret-key".to_string());
    s.cache_timeout = 600;
    s.enable_purchasing = false;
    s.save(&mut store).unwrap();

    let loaded = Settings::load(&store);
    assert_eq!(loaded.api_base_url, "https://bazaar.example.test/api");
    assert_eq!(loaded.api_key.as_deref(), Some("secret-key"));
    assert_eq!(loaded.cache_timeout, 600);
    assert!(!loaded.enable_purchasing);
}

#[test]
fn empty_api_key_loads_as_none() {
    let mut store = MemoryStore::new();
    Settings::default().save(&mut store).unwrap();

    let loaded = Settings::load(&store);
    assert_eq!(loaded.api_key, None);
}

#[test]
fn garbage_stored_values_fall_back_to_defaults() {
    let mut store = MemoryStore::new();
    store.set("cacheTimeout", "soon").unwrap();
    store.set("enablePurchasing", "maybe").unwrap();
    store.set("apiBaseUrl", "   ").unwrap();

    let loaded = Settings::load(&store);
    assert_eq!(loaded.cache_timeout, 3600);
    assert!(!loaded.enable_purchasing);
    assert_eq!(loaded.api_base_url, "https://api.greenmeteor.net/v1");
}

#[test]
fn purchasing_flag_spellings() {
    for (value, expected) in [
        ("1", true),
        ("true", true),
        ("on", true),
        ("yes", true),
        ("0", false),
        ("false", false),
        ("off", false),
    ] {
        let mut store = MemoryStore::new();
        store.set("enablePurchasing", value).unwrap();
        assert_eq!(
            Settings::load(&store).enable_purchasing,
            expected,
            "flag value {value:?}"
        );
    }
}

#[test]
fn json_file_store_persists_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("settings").join("bazaar.json");

    {
        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("apiBaseUrl", "https://bazaar.example.test/api").unwrap();
        store.set("cacheTimeout", "600").unwrap();
    }

    let store = JsonFileStore::open(&path).unwrap();
    assert_eq!(
        store.get("apiBaseUrl").as_deref(),
        Some("https://bazaar.example.test/api")
    );
    assert_eq!(store.get("cacheTimeout").as_deref(), Some("600"));
    assert_eq!(store.get("apiKey"), None);
}

// ---------------------------------------------------------------------------
// User identity
// ---------------------------------------------------------------------------

#[test]
fn resolve_prefers_email() {
    let id = UserIdentity::resolve(Some("admin@example.test"), "sess-1");
    assert!(id.is_email());
    assert_eq!(id.as_str(), "admin@example.test");
}

#[test]
fn resolve_falls_back_to_session_for_blank_email() {
    let id = UserIdentity::resolve(Some("   "), "sess-1");
    assert!(!id.is_email());
    assert_eq!(id.as_str(), "sess-1");

    let id = UserIdentity::resolve(None, "sess-2");
    assert_eq!(id.as_str(), "sess-2");
}

#[test]
fn cache_keys_are_stable_and_distinct() {
    let a = UserIdentity::email("admin@example.test");
    let b = UserIdentity::email("other@example.test");

    assert_eq!(a.cache_key(), a.cache_key());
    assert_ne!(a.cache_key(), b.cache_key());
    assert_eq!(a.cache_key().len(), 16);
    assert!(a.cache_key().chars().all(|c| c.is_ascii_hexdigit()));
}

// ---------------------------------------------------------------------------
// SDK construction and connectivity
// ---------------------------------------------------------------------------

#[test]
fn builder_rejects_invalid_settings() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = common::test_settings(tmp.path());
    settings.cache_timeout = 10;

    let result = BazaarSdk::builder().settings(settings).build();
    assert!(matches!(result, Err(BazaarError::InvalidConfig(_))));
}

#[test]
fn connection_test_reports_module_count() {
    let tmp = tempfile::tempdir().unwrap();
    let api = ScriptedApi::new(sample_catalog());
    let sdk = sdk_with(&api, tmp.path());

    let report = sdk.test_connection(&admin());
    assert!(report.ok);
    assert_eq!(report.module_count, 4);
    assert_eq!(report.message, "Connection successful. Found 4 modules.");
}

#[test]
fn connection_test_reports_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let api = ScriptedApi::new(sample_catalog());
    api.fail_catalog.store(true, Ordering::SeqCst);
    let sdk = sdk_with(&api, tmp.path());

    let report = sdk.test_connection(&admin());
    assert!(!report.ok);
    assert_eq!(report.module_count, 0);
    assert!(report.message.starts_with("Connection failed:"));
}

#[test]
fn sdk_display_summarizes_configuration() {
    let tmp = tempfile::tempdir().unwrap();
    let api = ScriptedApi::new(sample_catalog());
    let sdk = sdk_with(&api, tmp.path());

    let rendered = sdk.to_string();
    assert!(rendered.contains("api_base=https://api.example.test/v1"));
    assert!(rendered.contains("purchasing=enabled"));
}
