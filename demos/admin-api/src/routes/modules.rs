use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use bazaar_sdk::{Category, ListFilter, SortOrder};

use crate::error::AppError;
use crate::routes::UserParam;
use crate::state::{identity, AppState};

#[derive(Deserialize)]
pub struct ListModulesParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub user: Option<String>,
}

/// GET /api/modules?search=poll&category=social&sort=price&user=a@b.test
///
/// List the catalogue for the requesting user, optionally narrowed by a
/// search term and category, in the requested order. Unknown category or
/// sort values are ignored.
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListModulesParams>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let filter = ListFilter {
        search: params.search,
        category: params.category.as_deref().and_then(Category::parse),
        sort: params.sort.as_deref().and_then(SortOrder::parse),
    };

    let modules = state.sdk.read().await.list(user, filter).await?;
    let count = modules.len();
    Ok(Json(json!({ "data": modules, "count": count })))
}

/// GET /api/modules/:id
///
/// Get one module with the requesting user's purchase state.
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParam>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let module = state.sdk.read().await.get(user, id).await?;

    match module {
        Some(m) => Ok(Json(json!({ "data": m }))),
        None => Err(AppError::not_found("Module not found")),
    }
}

/// GET /api/categories
///
/// Distinct categories present in the catalogue, in catalogue order.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParam>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let categories = state
        .sdk
        .read()
        .await
        .run(move |s| Ok(s.catalog().categories(&user)))
        .await?;

    Ok(Json(json!({ "data": categories })))
}
