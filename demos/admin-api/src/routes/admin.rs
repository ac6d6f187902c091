use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use bazaar_sdk::{AsyncBazaarSdk, InstallOutcome, Settings};

use crate::error::AppError;
use crate::routes::UserParam;
use crate::state::{identity, AppState};

/// POST /api/modules/:id/install?user=a@b.test
///
/// Download and unpack the module into the modules directory. Refused
/// for pre-release modules and paid modules the user has not bought.
pub async fn install_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParam>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let outcome = state.sdk.read().await.install(user, id).await?;

    Ok(Json(match outcome {
        InstallOutcome::Installed { name, path } => json!({
            "status": "installed",
            "name": name,
            "path": path.display().to_string(),
        }),
        InstallOutcome::AlreadyInstalled { name } => json!({
            "status": "already_installed",
            "name": name,
        }),
    }))
}

/// GET /api/connection
///
/// Check upstream connectivity and report the reachable module count.
pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParam>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let report = state.sdk.read().await.test_connection(user).await?;
    Ok(Json(json!({ "data": report })))
}

/// POST /api/cache/clear
///
/// Drop every user's cached catalogue view.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    state.sdk.read().await.clear_cache().await?;
    Ok(Json(json!({ "cleared": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsForm {
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout: u64,
    #[serde(default = "default_enable_purchasing")]
    pub enable_purchasing: bool,
}

fn default_cache_timeout() -> u64 {
    bazaar_sdk::config::DEFAULT_CACHE_TIMEOUT_SECS
}

fn default_enable_purchasing() -> bool {
    true
}

/// GET /api/settings
///
/// The persisted admin-editable settings. The API key itself is never
/// echoed back.
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let settings = {
        let store = state
            .store
            .lock()
            .map_err(|_| AppError::internal("Settings store lock poisoned"))?;
        Settings::load(&*store)
    };

    Ok(Json(json!({
        "apiBaseUrl": settings.api_base_url,
        "hasApiKey": settings.api_key.is_some(),
        "cacheTimeout": settings.cache_timeout,
        "enablePurchasing": settings.enable_purchasing,
    })))
}

/// PUT /api/settings
///
/// Validate and persist new settings, then rebuild the SDK and flush the
/// catalogue cache so they take effect immediately.
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    Json(form): Json<SettingsForm>,
) -> Result<Json<Value>, AppError> {
    let settings = Settings {
        api_base_url: form.api_base_url,
        api_key: form.api_key.filter(|k| !k.trim().is_empty()),
        cache_timeout: form.cache_timeout,
        enable_purchasing: form.enable_purchasing,
        site_url: state.public_url.clone(),
        ..Settings::default()
    };
    settings
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    {
        let mut store = state
            .store
            .lock()
            .map_err(|_| AppError::internal("Settings store lock poisoned"))?;
        settings.save(&mut *store)?;
    }

    let sdk = AsyncBazaarSdk::builder().settings(settings).build().await?;
    // Entries cached under the old settings must not outlive them.
    sdk.clear_cache().await?;
    *state.sdk.write().await = sdk;

    Ok(Json(json!({ "saved": true })))
}
