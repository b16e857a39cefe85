//! Web portal cookies and their loading into a `reqwest` jar.
//!
//! The portal authenticates a browser session with three cookies: the Rails
//! session id, the Cloudflare clearance token and the user id. Values are
//! copied from a logged-in browser and never logged.

use std::fmt;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, instrument};
use url::Url;

/// Cookie name carrying the portal session id.
pub const SESSION_COOKIE_NAME: &str = "_intra_42_session_production";

/// Cookie name carrying the Cloudflare clearance token.
pub const CLEARANCE_COOKIE_NAME: &str = "cf_clearance";

/// Cookie name carrying the user id.
pub const USER_ID_COOKIE_NAME: &str = "user.id";

/// Cookie set that authenticates requests against the web portal.
///
/// Values are redacted in `Debug` output.
#[derive(Clone)]
pub struct PortalCookies {
    session: String,
    clearance: Option<String>,
    user_id: Option<String>,
}

impl PortalCookies {
    /// Creates a cookie set from the session id alone.
    #[must_use]
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            clearance: None,
            user_id: None,
        }
    }

    /// Adds the clearance token.
    #[must_use]
    pub fn with_clearance(mut self, clearance: impl Into<String>) -> Self {
        self.clearance = Some(clearance.into());
        self
    }

    /// Adds the user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns `(name, value)` pairs for every cookie present.
    ///
    /// Cookie values are secret; do not log the return value.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![(SESSION_COOKIE_NAME, self.session.as_str())];
        if let Some(clearance) = &self.clearance {
            pairs.push((CLEARANCE_COOKIE_NAME, clearance.as_str()));
        }
        if let Some(user_id) = &self.user_id {
            pairs.push((USER_ID_COOKIE_NAME, user_id.as_str()));
        }
        pairs
    }

    /// Loads the cookies into a jar scoped to `origin`'s host.
    #[instrument(level = "debug", skip(self), fields(host = origin.host_str()))]
    pub fn into_jar(&self, origin: &Url) -> Arc<Jar> {
        let jar = Arc::new(Jar::default());
        for (name, value) in self.pairs() {
            jar.add_cookie_str(&build_set_cookie_string(name, value, origin), origin);
            debug!(name, "loaded cookie into jar");
        }
        jar
    }
}

impl fmt::Debug for PortalCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("PortalCookies")
            .field("session", &"[REDACTED]")
            .field("clearance", &redact(&self.clearance))
            .field("user_id", &redact(&self.user_id))
            .finish()
    }
}

/// Builds a host-only `Set-Cookie` string valid for every path of `origin`.
fn build_set_cookie_string(name: &str, value: &str, origin: &Url) -> String {
    let mut parts = vec![format!("{name}={value}"), "Path=/".to_string()];
    if origin.scheme() == "https" {
        parts.push("Secure".to_string());
    }
    parts.join("; ")
}
