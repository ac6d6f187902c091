//! User identity attached to catalogue requests.
//!
//! The upstream catalogue annotates each module with per-user purchase
//! state, so every read and purchase operation carries an identity. An
//! email address is the preferred form; a session identifier covers users
//! the host application has not resolved to an email.

use std::fmt;

/// Identity of the user a catalogue view or purchase belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserIdentity {
    /// Email address of a known user.
    Email(String),
    /// Opaque session identifier for a user with no known email.
    Session(String),
}

impl UserIdentity {
    pub fn email<S: Into<String>>(address: S) -> Self {
        UserIdentity::Email(address.into())
    }

    pub fn session<S: Into<String>>(id: S) -> Self {
        UserIdentity::Session(id.into())
    }

    /// Resolve an identity from an optional email and a session id, the
    /// order the host application prefers them in.
    pub fn resolve(email: Option<&str>, session_id: &str) -> Self {
        match email.map(str::trim) {
            Some(addr) if !addr.is_empty() => UserIdentity::Email(addr.to_string()),
            _ => UserIdentity::Session(session_id.to_string()),
        }
    }

    /// The raw value sent upstream in `include_purchased`.
    pub fn as_str(&self) -> &str {
        match self {
            UserIdentity::Email(s) | UserIdentity::Session(s) => s,
        }
    }

    pub fn is_email(&self) -> bool {
        matches!(self, UserIdentity::Email(_))
    }

    /// Stable filename-safe key for this identity's cache entry.
    ///
    /// FNV-1a over the raw identity, rendered as fixed-width hex. Keeps
    /// emails and session tokens out of cache file names.
    pub fn cache_key(&self) -> String {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in self.as_str().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        format!("{hash:016x}")
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
