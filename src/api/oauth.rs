//! OAuth2 client-credentials token exchange.

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::session::Session;

/// Token endpoint path, relative to the API base URL.
pub const TOKEN_PATH: &str = "/oauth/token";

/// Body of the token endpoint response.
///
/// Both success and failure shapes are accepted; the endpoint may report a
/// rejection with a 200 status and an `error` field.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Exchanges application credentials for an access token.
#[instrument(skip(session, secret))]
pub(crate) async fn request_token(
    session: &Session,
    uid: &str,
    secret: &str,
) -> Result<String, FetchError> {
    let url = session.url(TOKEN_PATH)?;
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", uid)
        .append_pair("client_secret", secret)
        .finish();

    let request = session
        .request_builder(Method::POST, url.clone())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body);
    let bytes = session.send(request, &url).await?.bytes().await?;

    let token: TokenResponse = serde_json::from_slice(&bytes)
        .map_err(|e| FetchError::decode(url.as_str(), format!("token response: {e}")))?;
    access_token_from(token, url.as_str())
}

fn access_token_from(token: TokenResponse, url: &str) -> Result<String, FetchError> {
    if let Some(description) = token.error_description.or(token.error) {
        return Err(FetchError::auth(url, 0, description));
    }
    match token.access_token {
        Some(access_token) if !access_token.is_empty() => {
            debug!(
                token_type = token.token_type.as_deref().unwrap_or("bearer"),
                expires_in = token.expires_in,
                "obtained access token"
            );
            Ok(access_token)
        }
        _ => Err(FetchError::auth(url, 0, "token response carries no access_token")),
    }
}
