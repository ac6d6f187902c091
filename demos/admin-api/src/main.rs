mod error;
mod routes;
mod state;

use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bazaar_sdk::{AsyncBazaarSdk, JsonFileStore, Settings};

use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let public_url = std::env::var("PUBLIC_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    let settings_path = std::env::var("BAZAAR_SETTINGS")
        .unwrap_or_else(|_| "bazaar-settings.json".to_string());

    let store = JsonFileStore::open(&settings_path).expect("Failed to open settings store");
    let mut settings = Settings::load(&store);
    settings.site_url = public_url.clone();

    let sdk = AsyncBazaarSdk::builder()
        .settings(settings)
        .build()
        .await
        .expect("Failed to initialize bazaar SDK");
    info!(settings_path, "bazaar SDK ready");

    let state = Arc::new(AppState {
        sdk: RwLock::new(sdk),
        store: Mutex::new(store),
        public_url,
    });

    let app = Router::new()
        .route("/api/modules", get(routes::modules::list_modules))
        .route("/api/modules/{id}", get(routes::modules::get_module))
        .route(
            "/api/modules/{id}/purchase",
            post(routes::purchase::begin_purchase),
        )
        .route(
            "/api/modules/{id}/confirm",
            post(routes::purchase::confirm_purchase),
        )
        .route(
            "/api/modules/{id}/install",
            post(routes::admin::install_module),
        )
        .route("/api/purchase/return", get(routes::purchase::purchase_return))
        .route("/api/categories", get(routes::modules::list_categories))
        .route("/api/connection", get(routes::admin::test_connection))
        .route("/api/cache/clear", post(routes::admin::clear_cache))
        .route(
            "/api/settings",
            get(routes::admin::get_settings).put(routes::admin::save_settings),
        )
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = "0.0.0.0:3000";
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
