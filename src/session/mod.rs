//! HTTP session shared by the paginator, resolver and downloader.
//!
//! A [`Session`] owns one `reqwest` connection pool, the default timeouts and
//! (for the web portal) a cookie jar. It is created once and cloned cheaply
//! into every component or worker that needs it; no component mutates it
//! during a run.
//!
//! # Connection cap
//!
//! Every request holds a permit from a semaphore sized by
//! [`SessionConfig::max_connections`] until its [`PooledResponse`] is
//! dropped or its body consumed. When all permits are taken, further
//! requests wait for one to free instead of failing.
//!
//! # Example
//!
//! ```no_run
//! use intra42::{PortalCookies, Session, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::builder()
//!     .config(SessionConfig::default())
//!     .base_url("https://projects.intra.42.fr")
//!     .cookies(PortalCookies::new("session-id").with_clearance("cf-token"))
//!     .build()?;
//! let meta = session.probe("/uploads/document/en.subject.pdf").await?;
//! println!("last modified: {:?}", meta.last_modified);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
mod cookies;
mod token;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, HeaderMap, LAST_MODIFIED, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};
use url::Url;

pub use config::{ConfigError, SessionConfig};
pub use cookies::{
    CLEARANCE_COOKIE_NAME, PortalCookies, SESSION_COOKIE_NAME, USER_ID_COOKIE_NAME,
};
pub use token::BearerToken;

use crate::error::FetchError;

/// Errors raised while constructing a [`Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration values out of range.
    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),

    /// Base URL could not be parsed.
    #[error("invalid base URL: {url}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
    },

    /// Cookies need a base URL to scope them to.
    #[error("portal cookies require a base URL")]
    CookiesWithoutBaseUrl,

    /// `reqwest` refused the client configuration.
    #[error("HTTP client construction failed: {0}")]
    Client(#[source] reqwest::Error),

    /// The client builder panicked even with the env-proxy fallback.
    #[error("HTTP client construction panicked while applying env-proxy fallback")]
    ClientPanicked,
}

/// Reusable HTTP session: connection pool, timeouts, connection cap, optional base URL.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    base_url: Option<Url>,
    connections: Arc<Semaphore>,
    config: SessionConfig,
}

/// Builder for [`Session`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    base_url: Option<String>,
    cookies: Option<PortalCookies>,
}

impl SessionBuilder {
    /// Replaces the default configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the base URL relative paths are joined onto.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Attaches portal cookies, scoped to the base URL's host.
    #[must_use]
    pub fn cookies(mut self, cookies: PortalCookies) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Validates the configuration and builds the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the configuration is out of range, the
    /// base URL does not parse, cookies were given without a base URL, or
    /// the HTTP client cannot be built.
    #[instrument(level = "debug", skip(self), fields(base_url = self.base_url.as_deref()))]
    pub fn build(self) -> Result<Session, SessionError> {
        self.config.validate()?;

        let base_url = self
            .base_url
            .map(|raw| {
                Url::parse(&raw).map_err(|_| SessionError::InvalidBaseUrl { url: raw.clone() })
            })
            .transpose()?;

        let cookie_jar = match (&self.cookies, &base_url) {
            (Some(cookies), Some(origin)) => Some(cookies.into_jar(origin)),
            (Some(_), None) => return Err(SessionError::CookiesWithoutBaseUrl),
            (None, _) => None,
        };

        let client = client::build_client(&self.config, cookie_jar)?;
        debug!(
            max_connections = self.config.max_connections,
            request_timeout_secs = self.config.request_timeout.as_secs(),
            "session ready"
        );

        Ok(Session {
            client,
            base_url,
            connections: Arc::new(Semaphore::new(self.config.max_connections)),
            config: self.config,
        })
    }
}

impl Session {
    /// Returns a builder with default configuration.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Creates a session without base URL or cookies.
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::build`].
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        Self::builder().config(config).build()
    }

    /// Returns the configuration this session was built with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the base URL, if any.
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Returns the number of connection permits currently free.
    #[must_use]
    pub fn available_connections(&self) -> usize {
        self.connections.available_permits()
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Resolves `target` to an absolute URL.
    ///
    /// Absolute `http(s)` URLs are returned as-is; anything else is joined
    /// onto the base URL (a leading `/` replaces the base URL's path).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when `target` is relative and there
    /// is no base URL, or when it cannot be parsed at all.
    pub fn url(&self, target: &str) -> Result<Url, FetchError> {
        match Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
            Ok(_) => Err(FetchError::invalid_url(target)),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .as_ref()
                .and_then(|base| base.join(target).ok())
                .ok_or_else(|| FetchError::invalid_url(target)),
            Err(_) => Err(FetchError::invalid_url(target)),
        }
    }

    /// Starts a request against an already resolved URL.
    #[must_use]
    pub fn request_builder(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends a request, holding a connection permit until the response is dropped.
    ///
    /// Non-success statuses are mapped onto [`FetchError`]: 401/403/407 →
    /// `Auth`, 404/410 → `NotFound`, 429 → `RateLimited`, 408/5xx → `Server`,
    /// anything else → `HttpStatus`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, timeout, or non-success status.
    pub async fn send(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<PooledResponse, FetchError> {
        let permit = Arc::clone(&self.connections)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Worker {
                reason: "connection pool closed".to_string(),
            })?;

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            debug!(url = %url, status = status.as_u16(), "request rejected");
            return Err(FetchError::from_status(
                url.as_str(),
                status.as_u16(),
                retry_after,
            ));
        }

        Ok(PooledResponse {
            response,
            permit,
        })
    }

    /// Issues `method` against `target` (relative to the base URL or absolute).
    ///
    /// # Errors
    ///
    /// See [`Session::url`] and [`Session::send`].
    #[instrument(level = "debug", skip(self))]
    pub async fn request(
        &self,
        method: Method,
        target: &str,
    ) -> Result<PooledResponse, FetchError> {
        let url = self.url(target)?;
        let builder = self.request_builder(method, url.clone());
        self.send(builder, &url).await
    }

    /// Issues a `GET` against `target`.
    ///
    /// # Errors
    ///
    /// See [`Session::request`].
    pub async fn get(&self, target: &str) -> Result<PooledResponse, FetchError> {
        self.request(Method::GET, target).await
    }

    /// Metadata-only probe (`HEAD`, no body transfer) of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the probe itself fails (auth, not found,
    /// transport). A missing or unparseable `Last-Modified` header is not an
    /// error; it yields `last_modified: None`.
    #[instrument(skip(self))]
    pub async fn probe(&self, target: &str) -> Result<RemoteMetadata, FetchError> {
        let response = self.request(Method::HEAD, target).await?;
        let metadata = RemoteMetadata {
            url: response.url().clone(),
            last_modified: response.last_modified(),
            content_length: response.content_length(),
        };
        debug!(
            url = %metadata.url,
            last_modified = ?metadata.last_modified,
            "probed remote"
        );
        Ok(metadata)
    }
}

/// Result of a metadata-only probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Final URL after redirects.
    pub url: Url,
    /// Remote `Last-Modified`, if supplied and parseable.
    pub last_modified: Option<DateTime<Utc>>,
    /// Remote `Content-Length`, if supplied.
    pub content_length: Option<u64>,
}

/// A success response that keeps its connection permit alive.
#[derive(Debug)]
pub struct PooledResponse {
    response: Response,
    permit: OwnedSemaphorePermit,
}

impl PooledResponse {
    /// HTTP status (always a success status).
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Final URL after redirects.
    #[must_use]
    pub fn url(&self) -> &Url {
        self.response.url()
    }

    /// Parsed `Last-Modified` header.
    #[must_use]
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        last_modified(self.headers())
    }

    /// Parsed `Content-Length` header.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] or [`FetchError::Timeout`] if the body
    /// cannot be read to completion.
    pub async fn bytes(self) -> Result<Vec<u8>, FetchError> {
        let url = self.response.url().to_string();
        self.response
            .bytes()
            .await
            .map(|body| body.to_vec())
            .map_err(|e| FetchError::network(url, e))
    }

    /// Reads the whole body as text.
    ///
    /// # Errors
    ///
    /// Same as [`PooledResponse::bytes`].
    pub async fn text(self) -> Result<String, FetchError> {
        let url = self.response.url().to_string();
        self.response
            .text()
            .await
            .map_err(|e| FetchError::network(url, e))
    }

    /// Splits into the raw response and its connection permit.
    ///
    /// Keep the permit alive for as long as the body is being read.
    #[must_use]
    pub fn into_parts(self) -> (Response, OwnedSemaphorePermit) {
        (self.response, self.permit)
    }
}

/// Parses an RFC 7231 HTTP-date `Last-Modified` header into UTC.
pub(crate) fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}

/// Parses an HTTP-date string (`Fri, 09 May 2025 12:16:12 GMT`) into UTC.
pub(crate) fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    httpdate::parse_http_date(value.trim())
        .ok()
        .map(DateTime::<Utc>::from)
}
