//! Purchase reconciliation across the hosted checkout redirect.
//!
//! A purchase happens in two halves the SDK never sees together: the
//! application initiates checkout and hands the user to the payment page,
//! then the user comes back by redirect with a session id. [`PurchaseFlow`]
//! drives one (user, module) pair through those halves and keeps the
//! per-user catalogue cache consistent at every transition. All failure
//! paths fail closed: nothing is granted on ambiguous upstream state.

use tracing::{debug, info, warn};

use crate::cache::CatalogCache;
use crate::catalog::CatalogQuery;
use crate::client::CatalogApi;
use crate::config::Settings;
use crate::error::{BazaarError, Result};
use crate::identity::UserIdentity;
use crate::models::record::fallback_download_url;
use crate::models::{CheckoutOutcome, CheckoutUrls, PurchaseState};

/// Drives purchases from `NotPurchased` to `Purchased`.
pub struct PurchaseFlow<'a> {
    settings: &'a Settings,
    api: &'a dyn CatalogApi,
    cache: &'a CatalogCache,
}

impl<'a> PurchaseFlow<'a> {
    pub(crate) fn new(
        settings: &'a Settings,
        api: &'a dyn CatalogApi,
        cache: &'a CatalogCache,
    ) -> Self {
        PurchaseFlow {
            settings,
            api,
            cache,
        }
    }

    // -- Checkout initiation -----------------------------------------------

    /// Initiate a purchase of module `id`.
    ///
    /// Refused before any network traffic when purchasing is disabled in
    /// the settings. Pre-release modules are refused too. A free module
    /// completes immediately as `Purchased`; a paid one yields
    /// `CheckoutPending` carrying the hosted checkout URL to redirect the
    /// user to. Calling this for an already-purchased module is a no-op
    /// that hands back `Purchased`.
    pub fn begin(
        &self,
        identity: &UserIdentity,
        id: &str,
        urls: &CheckoutUrls,
    ) -> Result<PurchaseState> {
        if !self.settings.enable_purchasing {
            return Err(BazaarError::PurchasingDisabled);
        }

        let module = CatalogQuery::new(self.api, self.cache)
            .get(identity, id)
            .ok_or_else(|| BazaarError::NotFound(format!("module {id}")))?;

        if module.is_soon {
            return Err(BazaarError::NotPurchasable(format!(
                "module {id} is not released yet"
            )));
        }
        if module.is_purchased {
            let download_url = module
                .download_url
                .unwrap_or_else(|| self.fallback_url(id));
            return Ok(PurchaseState::Purchased { download_url });
        }

        match self.api.purchase(id, urls, identity)? {
            CheckoutOutcome::Free => {
                info!(module_id = id, "free module acquired");
                self.cache.invalidate(identity);
                let download_url = module
                    .download_url
                    .unwrap_or_else(|| self.fallback_url(id));
                Ok(PurchaseState::Purchased { download_url })
            }
            CheckoutOutcome::Redirect {
                checkout_url,
                session_id,
            } => {
                debug!(module_id = id, "checkout session issued");
                Ok(PurchaseState::CheckoutPending {
                    checkout_url,
                    session_id,
                })
            }
        }
    }

    // -- Return-redirect verification --------------------------------------

    /// Handle the return redirect from the hosted checkout.
    ///
    /// The session id carried on the return URL is checked upstream. A
    /// verified session for this module enters `Purchased` and drops this
    /// user's cache entry so the next listing reflects the purchase.
    /// Anything else, including a session that verifies for a different
    /// module, enters `VerificationFailed` and grants nothing.
    pub fn complete(
        &self,
        identity: &UserIdentity,
        id: &str,
        session_id: &str,
    ) -> PurchaseState {
        debug!(module_id = id, session_id, "verifying checkout session");
        let verification = self.api.verify_purchase(session_id, identity.as_str());

        if !verification.verified {
            let reason = verification
                .error
                .unwrap_or_else(|| format!("payment status: {}", verification.payment_status));
            warn!(module_id = id, %reason, "purchase verification failed");
            return PurchaseState::VerificationFailed { reason };
        }

        if let Some(verified_id) = verification.module_id.as_deref() {
            if verified_id != id {
                warn!(
                    module_id = id,
                    verified_id, "checkout session belongs to a different module"
                );
                return PurchaseState::VerificationFailed {
                    reason: format!("session belongs to module {verified_id}"),
                };
            }
        }

        info!(module_id = id, "purchase verified");
        self.cache.invalidate(identity);
        let download_url = verification
            .download_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.fallback_url(id));
        PurchaseState::Purchased { download_url }
    }

    // -- Direct confirmation -----------------------------------------------

    /// Confirm a purchase without a checkout session, via a fresh
    /// upstream status check.
    ///
    /// Covers direct navigation to the success page after a checkout
    /// finished in another tab, and credits applied upstream out of band.
    /// Fails closed: an unreachable upstream reads as not purchased.
    pub fn confirm(&self, identity: &UserIdentity, id: &str) -> PurchaseState {
        if self.api.check_purchase_status(id, identity) {
            info!(module_id = id, "purchase confirmed by status check");
            self.cache.invalidate(identity);
            return PurchaseState::Purchased {
                download_url: self.fallback_url(id),
            };
        }
        PurchaseState::NotPurchased
    }

    fn fallback_url(&self, id: &str) -> String {
        fallback_download_url(&self.settings.download_base(), id)
    }
}
