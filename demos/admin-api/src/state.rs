use std::sync::Mutex;

use tokio::sync::RwLock;

use bazaar_sdk::{AsyncBazaarSdk, JsonFileStore, UserIdentity};

/// Shared application state available to all route handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// The async bazaar SDK instance. Saving settings rebuilds it, so it
    /// sits behind a `RwLock`; every handler takes a read lock.
    pub sdk: RwLock<AsyncBazaarSdk>,

    /// Persistent store backing the admin-editable settings subset.
    pub store: Mutex<JsonFileStore>,

    /// Public base URL of this server, used for checkout return URLs.
    pub public_url: String,
}

/// Identity for the request. Routes take an optional `user` query
/// parameter carrying an email; anonymous requests share one demo
/// session.
pub fn identity(user: Option<&str>) -> UserIdentity {
    UserIdentity::resolve(user, "demo-session")
}
