use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use url::form_urlencoded;

use bazaar_sdk::{CheckoutUrls, PurchaseState, UserIdentity};

use crate::error::AppError;
use crate::routes::UserParam;
use crate::state::{identity, AppState};

#[derive(Deserialize)]
pub struct ReturnParams {
    pub module_id: Option<String>,
    pub session_id: Option<String>,
    pub user: Option<String>,
}

/// POST /api/modules/:id/purchase?user=a@b.test
///
/// Initiate a purchase. Free modules complete immediately; paid ones
/// answer with the hosted checkout URL to redirect the user to. The
/// checkout sends the user back to /api/purchase/return.
pub async fn begin_purchase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParam>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let urls = checkout_urls(&state.public_url, &id, &user);

    let outcome = state.sdk.read().await.begin_purchase(user, id, urls).await?;
    Ok(Json(purchase_state_json(&outcome)))
}

/// Return/cancel URLs pointing back at this API. The module id and the
/// identity are query values and get form-encoded, so identities like
/// `dev+books@example.test` survive the checkout round trip.
fn checkout_urls(public_url: &str, module_id: &str, user: &UserIdentity) -> CheckoutUrls {
    CheckoutUrls::new(
        format!(
            "{public_url}/api/purchase/return?module_id={}&user={}",
            query_encode(module_id),
            query_encode(user.as_str()),
        ),
        format!("{public_url}/api/modules/{module_id}"),
    )
}

fn query_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// GET /api/purchase/return?module_id=42&session_id=cs_...&user=a@b.test
///
/// Return redirect from the hosted checkout. Verifies the session
/// upstream and reports whether the purchase went through.
pub async fn purchase_return(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReturnParams>,
) -> Result<Json<Value>, AppError> {
    let module_id = params
        .module_id
        .ok_or_else(|| AppError::bad_request("Missing required query parameter: module_id"))?;
    let session_id = params
        .session_id
        .ok_or_else(|| AppError::bad_request("Missing required query parameter: session_id"))?;
    let user = identity(params.user.as_deref());

    let outcome = state
        .sdk
        .read()
        .await
        .complete_purchase(user, module_id, session_id)
        .await?;
    Ok(Json(purchase_state_json(&outcome)))
}

/// POST /api/modules/:id/confirm?user=a@b.test
///
/// Re-check a purchase directly against upstream, for checkouts that
/// finished without coming back through the return redirect.
pub async fn confirm_purchase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<UserParam>,
) -> Result<Json<Value>, AppError> {
    let user = identity(params.user.as_deref());
    let outcome = state.sdk.read().await.confirm_purchase(user, id).await?;
    Ok(Json(purchase_state_json(&outcome)))
}

fn purchase_state_json(state: &PurchaseState) -> Value {
    match state {
        PurchaseState::NotPurchased => json!({ "status": "not_purchased" }),
        PurchaseState::CheckoutPending {
            checkout_url,
            session_id,
        } => json!({
            "status": "checkout",
            "checkout_url": checkout_url,
            "session_id": session_id,
        }),
        PurchaseState::VerifyingSession { session_id } => {
            json!({ "status": "verifying", "session_id": session_id })
        }
        PurchaseState::Purchased { download_url } => {
            json!({ "status": "purchased", "download_url": download_url })
        }
        PurchaseState::VerificationFailed { reason } => {
            json!({ "status": "failed", "reason": reason })
        }
    }
}
