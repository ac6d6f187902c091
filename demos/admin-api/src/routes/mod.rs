pub mod admin;
pub mod modules;
pub mod purchase;

use serde::Deserialize;

/// Optional `user` query parameter accepted by every per-user route.
#[derive(Deserialize)]
pub struct UserParam {
    pub user: Option<String>,
}
