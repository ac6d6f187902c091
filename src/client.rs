//! Upstream catalogue access.
//!
//! [`ApiClient`] talks to the catalogue API over blocking HTTP. The
//! [`CatalogApi`] trait fronts it so the cache, purchase, and install
//! layers can run against scripted implementations in tests or against an
//! alternative backend.

use std::io::Write;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{BazaarError, Result};
use crate::identity::UserIdentity;
use crate::models::{CheckoutOutcome, CheckoutUrls, ModuleRecord, Verification};

const USER_AGENT: &str = concat!("bazaar-sdk/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// CatalogApi
// ---------------------------------------------------------------------------

/// The remote operations the rest of the SDK is built on.
pub trait CatalogApi: Send + Sync {
    /// Fetch the full catalogue, annotated with purchase state for
    /// `identity`.
    fn fetch_catalog(&self, identity: &UserIdentity) -> Result<Vec<ModuleRecord>>;

    /// Fetch one module by id, annotated for `identity`. `Ok(None)` when
    /// upstream answers but does not know the module.
    fn fetch_module(&self, id: &str, identity: &UserIdentity) -> Result<Option<ModuleRecord>>;

    /// Initiate a purchase. Returns the checkout redirect for paid
    /// modules or [`CheckoutOutcome::Free`] for free ones; anything else
    /// upstream sends is an error.
    fn purchase(
        &self,
        id: &str,
        urls: &CheckoutUrls,
        identity: &UserIdentity,
    ) -> Result<CheckoutOutcome>;

    /// Check a checkout session. Infallible by design: transport and
    /// payload errors fold into an unverified [`Verification`].
    fn verify_purchase(&self, session_id: &str, user_session: &str) -> Verification;

    /// Fresh purchase check for one module, bypassing every cache. Fails
    /// closed: any error reads as not purchased.
    fn check_purchase_status(&self, id: &str, identity: &UserIdentity) -> bool;

    /// Stream an archive into `dest`, returning the byte count.
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Blocking HTTP implementation of [`CatalogApi`].
pub struct ApiClient {
    settings: Settings,
    client: Client,
}

impl ApiClient {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(ApiClient { settings, client })
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json");
        if let Some(key) = &self.settings.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

impl CatalogApi for ApiClient {
    fn fetch_catalog(&self, identity: &UserIdentity) -> Result<Vec<ModuleRecord>> {
        let payload: Value = self
            .get(
                &self.settings.api_base_url,
                &[
                    ("action", "list"),
                    ("format", "json"),
                    ("include_purchased", identity.as_str()),
                ],
            )
            .send()?
            .error_for_status()?
            .json()?;

        if !payload_success(&payload) {
            return Err(BazaarError::Api(payload_error(
                &payload,
                "catalogue list request failed",
            )));
        }

        let base = self.settings.download_base();
        let modules: Vec<ModuleRecord> = payload
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| ModuleRecord::from_raw(item, &base))
                    .collect()
            })
            .unwrap_or_default();

        debug!(count = modules.len(), "fetched catalogue");
        Ok(modules)
    }

    fn fetch_module(&self, id: &str, identity: &UserIdentity) -> Result<Option<ModuleRecord>> {
        let payload: Value = self
            .get(
                &self.settings.api_base_url,
                &[
                    ("action", "get"),
                    ("module_id", id),
                    ("include_purchased", identity.as_str()),
                ],
            )
            .send()?
            .error_for_status()?
            .json()?;

        if !payload_success(&payload) {
            return Ok(None);
        }
        Ok(payload
            .get("data")
            .filter(|data| !data.is_null())
            .map(|item| ModuleRecord::from_raw(item, &self.settings.download_base())))
    }

    fn purchase(
        &self,
        id: &str,
        urls: &CheckoutUrls,
        identity: &UserIdentity,
    ) -> Result<CheckoutOutcome> {
        let body = json!({
            "action": "purchase",
            "module_id": id,
            "return_url": urls.return_url,
            "cancel_url": urls.cancel_url,
            "user_email": identity.as_str(),
            "site_url": self.settings.site_url,
        });

        let mut req = self
            .client
            .post(&self.settings.api_base_url)
            .json(&body)
            .header("Accept", "application/json");
        if let Some(key) = &self.settings.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send()?;
        if !resp.status().is_success() {
            return Err(BazaarError::Purchase(format!(
                "module {id}: HTTP {}",
                resp.status()
            )));
        }

        let payload: Value = resp.json()?;
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            return Err(BazaarError::Purchase(format!("module {id}: {error}")));
        }
        if payload.get("is_free").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(CheckoutOutcome::Free);
        }
        if let Some(url) = payload
            .get("checkout_url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
        {
            return Ok(CheckoutOutcome::Redirect {
                checkout_url: url.to_string(),
                session_id: payload
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        Err(BazaarError::Purchase(format!("module {id}: unknown error")))
    }

    fn verify_purchase(&self, session_id: &str, user_session: &str) -> Verification {
        let url = self.settings.verify_endpoint();
        let result = (|| -> Result<Verification> {
            let resp = self
                .get(
                    &url,
                    &[("session_id", session_id), ("user_session", user_session)],
                )
                .send()?;
            if !resp.status().is_success() {
                return Err(BazaarError::Api(format!(
                    "verification returned HTTP {}",
                    resp.status()
                )));
            }
            let payload: Value = resp.json()?;
            if let Some(error) = payload.get("error").and_then(Value::as_str) {
                return Err(BazaarError::Api(error.to_string()));
            }
            Ok(Verification {
                verified: payload
                    .get("verified")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                module_id: wire_id(payload.get("module_id")),
                payment_status: payload
                    .get("payment_status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                download_url: payload
                    .get("download_url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                error: None,
            })
        })();

        match result {
            Ok(verification) => verification,
            Err(e) => {
                warn!(session_id, error = %e, "purchase verification call failed");
                Verification::failed(e.to_string())
            }
        }
    }

    fn check_purchase_status(&self, id: &str, identity: &UserIdentity) -> bool {
        match self.fetch_module(id, identity) {
            Ok(Some(module)) => module.is_purchased,
            Ok(None) => false,
            Err(e) => {
                warn!(module_id = id, error = %e, "purchase status check failed");
                false
            }
        }
    }

    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        let mut req = self.client.get(url).timeout(self.settings.download_timeout);
        // The key stays on the API origin; archives can live anywhere.
        if self.settings.is_api_origin(url) {
            if let Some(key) = &self.settings.api_key {
                req = req.bearer_auth(key);
            }
        }
        let mut resp = req.send()?.error_for_status()?;
        let bytes = std::io::copy(&mut resp, dest)?;
        debug!(url, bytes, "archive downloaded");
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

fn payload_success(payload: &Value) -> bool {
    payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn payload_error(payload: &Value, fallback: &str) -> String {
    payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Identifier fields arrive as strings or numbers depending on the
/// endpoint; both normalize to a string.
fn wire_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        _ => None,
    }
}
