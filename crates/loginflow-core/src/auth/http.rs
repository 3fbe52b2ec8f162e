//! reqwest-backed [`AuthClient`] for Djoser-style token endpoints.

use std::future::Future;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::{AuthClient, AuthError, AuthResult, Token, USER_AGENT, UserProfile};
use crate::config::ApiConfig;
use crate::form::Credentials;
use crate::session::SessionStore;

const TOKEN_LOGIN_PATH: &str = "/token/login/";
const TOKEN_LOGOUT_PATH: &str = "/token/logout/";
const CURRENT_USER_PATH: &str = "/users/me/";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    auth_token: String,
}

/// HTTP auth client.
///
/// Reads the token for authenticated requests from the shared
/// [`SessionStore`], so a token set on the store is presented by every
/// subsequent call.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    http: reqwest::Client,
    base_url: String,
    token_scheme: String,
    session: SessionStore,
}

impl HttpAuthClient {
    /// Builds a client from config, honoring `LOGINFLOW_BASE_URL`.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(api: &ApiConfig, session: SessionStore) -> Result<Self> {
        let base_url = api.resolve_base_url()?;
        Self::new(api, base_url, session)
    }

    /// Builds a client for an explicit base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api: &ApiConfig, base_url: impl Into<String>, session: SessionStore) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = api.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_scheme: api.token_scheme.clone(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorization(&self) -> AuthResult<HeaderValue> {
        let token = self.session.token().ok_or_else(AuthError::missing_token)?;
        let mut value = HeaderValue::from_str(&format!("{} {}", self.token_scheme, token.expose()))
            .map_err(|e| AuthError::parse(format!("Token is not a valid header value: {e}"), ""))?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn request_exchange(&self, credentials: &Credentials) -> AuthResult<Token> {
        let url = self.url(TOKEN_LOGIN_PATH);
        tracing::debug!(%url, username = %credentials.username, "requesting auth token");

        let response = self
            .http
            .post(&url)
            .form(credentials)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let body: TokenResponse = read_json(response).await?;
        if body.auth_token.trim().is_empty() {
            return Err(AuthError::parse("Token response had an empty auth_token", ""));
        }
        Ok(Token::new(body.auth_token))
    }

    async fn request_current_user(&self) -> AuthResult<UserProfile> {
        let url = self.url(CURRENT_USER_PATH);
        let authorization = self.authorization()?;
        tracing::debug!(%url, "fetching current user");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        read_json(response).await
    }

    async fn request_logout(&self) -> AuthResult<()> {
        let url = self.url(TOKEN_LOGOUT_PATH);
        let authorization = self.authorization()?;
        tracing::debug!(%url, "invalidating auth token");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::http_status(status.as_u16(), &body));
        }
        Ok(())
    }
}

impl AuthClient for HttpAuthClient {
    async fn exchange_token(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> AuthResult<Token> {
        cancellable(cancel, self.request_exchange(credentials)).await
    }

    async fn fetch_current_user(&self, cancel: &CancellationToken) -> AuthResult<UserProfile> {
        cancellable(cancel, self.request_current_user()).await
    }

    async fn logout(&self, cancel: &CancellationToken) -> AuthResult<()> {
        cancellable(cancel, self.request_logout()).await
    }
}

/// Races a request against cancellation. Dropping the request future aborts
/// the underlying connection.
async fn cancellable<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = AuthResult<T>>,
) -> AuthResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AuthError::cancelled()),
        result = request => result,
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> AuthResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::http_status(status.as_u16(), &body));
    }

    let body = response.text().await.map_err(classify_reqwest_error)?;
    serde_json::from_str(&body)
        .map_err(|e| AuthError::parse(format!("Failed to parse response: {e}"), &body))
}

fn classify_reqwest_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        AuthError::network(format!("Connection failed: {e}"))
    } else if e.is_decode() {
        AuthError::parse(format!("Failed to decode response: {e}"), "")
    } else {
        AuthError::network(format!("Network error: {e}"))
    }
}
