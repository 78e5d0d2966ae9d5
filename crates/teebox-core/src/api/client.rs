//! API client for the teebox account endpoints.
//!
//! Three endpoints are consumed: `POST /login` issues a bearer token,
//! `POST /user` creates an account, and `GET /me` returns the profile of
//! the token's owner.

use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::auth::SessionToken;
use crate::models::{Credentials, NewAccount, UserProfile};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Keys that may carry the token in a login payload, in order of preference
static TOKEN_KEYS: [&str; 2] = ["access_token", "token"];

/// HTTP client bound to one API server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionToken, ApiError> {
        let url = self.url("/login");
        debug!(url = %url, username = %credentials.username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await?;

        let payload: Value = Self::parse_json(Self::check_response(response).await?).await?;

        extract_token(&payload).ok_or_else(|| {
            ApiError::InvalidResponse("login response did not contain a token".to_string())
        })
    }

    /// Create an account. The server does not issue a token for it.
    pub async fn create_user(&self, account: &NewAccount) -> Result<UserProfile, ApiError> {
        let url = self.url("/user");
        debug!(url = %url, username = %account.username, "Sending create user request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(account)
            .send()
            .await?;

        Self::parse_json(Self::check_response(response).await?).await
    }

    /// Fetch the profile of the token's owner
    pub async fn me(&self, token: &SessionToken) -> Result<UserProfile, ApiError> {
        let url = self.url("/me");
        debug!(url = %url, "Fetching current user");

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        Self::parse_json(Self::check_response(response).await?).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %ApiError::truncate_body(&body), "Request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("{}: {}", e, ApiError::truncate_body(&body)))
        })
    }
}

/// Find the bearer token in a login payload.
///
/// Accepts the token at the top level, or one object deep
/// (`{"data": {"access_token": ...}}`, `{"token": {"access_token": ...}}`).
fn extract_token(payload: &Value) -> Option<SessionToken> {
    let object = payload.as_object()?;

    let direct = TOKEN_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|token| !token.is_empty());
    if let Some(token) = direct {
        return Some(SessionToken::new(token));
    }

    object
        .values()
        .filter_map(Value::as_object)
        .flat_map(|nested| {
            TOKEN_KEYS
                .iter()
                .filter_map(move |key| nested.get(*key).and_then(Value::as_str))
        })
        .find(|token| !token.is_empty())
        .map(SessionToken::new)
}
