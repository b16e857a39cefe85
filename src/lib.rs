//! intra42 Core Library
//!
//! Client-side building blocks for the school's REST API and its
//! cookie-authenticated web portal: bulk retrieval of paginated records and
//! versioned download of project attachments.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`session`] - Shared HTTP session: connection pool, timeouts, cookies, bearer token
//! - [`api`] - Bearer-authenticated API client and OAuth token exchange
//! - [`paginate`] - Page enumeration: sequential, parallel worker pool, lazy stream
//! - [`versioning`] - Decides where an attachment goes and whether it changed
//! - [`attachment`] - Atomic streaming download to disk
//! - [`error`] - Error taxonomy shared by all of the above
//!
//! Nothing in this crate retries on its own; see [`ErrorKind`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod attachment;
pub mod error;
pub mod paginate;
pub mod session;
mod user_agent;
pub mod versioning;

// Re-export commonly used types
pub use api::{ApiClient, DEFAULT_API_BASE_URL, Record};
pub use attachment::AttachmentDownloader;
pub use error::{ErrorKind, FetchError};
pub use paginate::{
    DEFAULT_PAGE_SIZE, FetchStrategy, PageRequest, PageResponse, PageSource, Paginator,
    WorkerPoolConfig, default_max_workers,
};
pub use session::{
    BearerToken, ConfigError, PooledResponse, PortalCookies, RemoteMetadata, Session,
    SessionBuilder, SessionConfig, SessionError,
};
pub use versioning::{DownloadDescriptor, VersionResolver, versioned_path};

/// Default web portal root.
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://projects.intra.42.fr";
