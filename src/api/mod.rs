//! Bearer-authenticated client for the JSON REST API.
//!
//! [`ApiClient`] wraps a [`Session`] whose base URL is the API root and a
//! [`BearerToken`] shared by all clones. It serves pages to the
//! [`Paginator`](crate::Paginator) through its [`PageSource`](crate::PageSource)
//! implementation.

mod oauth;
mod pages;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

pub use oauth::TOKEN_PATH;
pub use pages::{MAX_PAGE_SIZE, PAGE_NUMBER_PARAM, PAGE_SIZE_PARAM, total_pages_from_headers};

use crate::error::FetchError;
use crate::session::{BearerToken, PooledResponse, Session};

/// Default API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.intra.42.fr";

/// One API record, kept as raw JSON.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Authenticated API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    session: Session,
    token: BearerToken,
}

impl ApiClient {
    /// Wraps a session and an already obtained token.
    #[must_use]
    pub fn new(session: Session, token: BearerToken) -> Self {
        Self { session, token }
    }

    /// Obtains a token with the client-credentials grant and returns a ready client.
    ///
    /// # Errors
    ///
    /// [`FetchError::Auth`] when the credentials are rejected, or any
    /// transport error from the token request.
    pub async fn authenticate(
        session: Session,
        uid: &str,
        secret: &str,
    ) -> Result<Self, FetchError> {
        let access_token = oauth::request_token(&session, uid, secret).await?;
        info!("authenticated against API");
        Ok(Self::new(session, BearerToken::new(access_token)))
    }

    /// Requests a fresh token and swaps it in for every clone of this client.
    ///
    /// Requests already in flight keep the token they were sent with.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::authenticate`]; the current token is kept on failure.
    pub async fn refresh_token(&self, uid: &str, secret: &str) -> Result<(), FetchError> {
        let access_token = oauth::request_token(&self.session, uid, secret).await?;
        self.token.replace(access_token);
        info!("refreshed API token");
        Ok(())
    }

    /// Returns the underlying session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the shared token cell.
    #[must_use]
    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    /// Sends an authenticated request to `path` with extra query parameters.
    ///
    /// # Errors
    ///
    /// See [`Session::send`].
    #[instrument(level = "debug", skip(self, query))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<PooledResponse, FetchError> {
        let mut url = self.session.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        let mut builder = self
            .session
            .request_builder(method, url.clone())
            .header(ACCEPT, "application/json");
        if let Some(value) = self.token.header_value() {
            builder = builder.header(AUTHORIZATION, value);
        }
        self.session.send(builder, &url).await
    }

    /// Fetches `path` and decodes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// [`FetchError::Decode`] when the body does not match `T`, otherwise see
    /// [`ApiClient::request`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self.request(Method::GET, path, query).await?;
        let url = response.url().to_string();
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::decode(url, e.to_string()))
    }
}
