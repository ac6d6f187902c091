use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CheckoutUrls — where the hosted checkout sends the user afterwards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutUrls {
    /// Where the checkout redirects after a completed payment. Carries the
    /// session id back to the application.
    pub return_url: String,
    /// Where the checkout redirects when the user backs out.
    pub cancel_url: String,
}

impl CheckoutUrls {
    pub fn new<R: Into<String>, C: Into<String>>(return_url: R, cancel_url: C) -> Self {
        CheckoutUrls {
            return_url: return_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    /// Conventional admin-panel URLs rooted at the host site.
    pub fn for_site(site_url: &str, module_id: &str) -> Self {
        let base = site_url.trim_end_matches('/');
        CheckoutUrls {
            return_url: format!("{base}/bazaar/admin/purchase-success?module_id={module_id}"),
            cancel_url: format!("{base}/bazaar/admin/view?id={module_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// CheckoutOutcome — upstream's answer to a purchase initiation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Paid module: send the user to the hosted checkout page.
    Redirect {
        checkout_url: String,
        session_id: Option<String>,
    },
    /// Free module: acquired immediately, no checkout round trip.
    Free,
}

// ---------------------------------------------------------------------------
// Verification — upstream's verdict on a checkout session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    /// Module the session belongs to, when upstream reports it.
    pub module_id: Option<String>,
    /// Raw payment status string, `"unknown"` when absent.
    pub payment_status: String,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl Verification {
    /// Verdict used when the verification call itself failed. Never
    /// verified: a session that cannot be checked grants nothing.
    pub fn failed<S: Into<String>>(error: S) -> Self {
        Verification {
            verified: false,
            module_id: None,
            payment_status: "unknown".to_string(),
            download_url: None,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// PurchaseState — progress of one (user, module) purchase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseState {
    /// No completed purchase on record.
    NotPurchased,
    /// Checkout session issued; the user has been handed the checkout URL
    /// and has not returned yet.
    CheckoutPending {
        checkout_url: String,
        session_id: Option<String>,
    },
    /// Return redirect received; the session is being checked upstream.
    VerifyingSession { session_id: String },
    /// Purchase confirmed. `download_url` is immediately usable.
    Purchased { download_url: String },
    /// The session could not be verified. Terminal for this attempt; the
    /// user may retry the purchase from scratch.
    VerificationFailed { reason: String },
}

impl PurchaseState {
    pub fn is_purchased(&self) -> bool {
        matches!(self, PurchaseState::Purchased { .. })
    }
}

// ---------------------------------------------------------------------------
// ConnectionReport — result of the connectivity test
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub ok: bool,
    pub module_count: usize,
    pub message: String,
}
