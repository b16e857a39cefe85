//! Shared User-Agent string for API and portal traffic.

/// Default User-Agent for every request issued through a [`Session`](crate::Session).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("intra42/{version} (records-and-attachments)")
}
