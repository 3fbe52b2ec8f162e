//! Authentication API client types.
//!
//! Defines the [`AuthClient`] seam used by the login flow, the token and
//! user types it produces, and a structured [`AuthError`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::form::Credentials;

mod http;

pub use http::HttpAuthClient;

/// Standard User-Agent header for loginflow API requests.
pub const USER_AGENT: &str = concat!("loginflow/", env!("CARGO_PKG_VERSION"));

/// Opaque credential issued by the token endpoint.
///
/// `Debug` and `Display` only show a short prefix; use [`Token::expose`] to
/// get the secret for a request header.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First few characters followed by an ellipsis.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// The authenticated user as returned by `/users/me/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    /// Every other attribute the server sent.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl UserProfile {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Best human-readable name: `name`, `username`, `email`, then `#id`.
    pub fn display_name(&self) -> String {
        ["name", "username", "email"]
            .iter()
            .filter_map(|key| self.attribute(key))
            .find(|value| !value.trim().is_empty())
            .map_or_else(|| format!("#{}", self.id), str::to_string)
    }
}

/// Categories of authentication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Non-2xx response.
    HttpStatus(u16),
    /// Request or connect timeout.
    Timeout,
    /// Connection or transport failure.
    Network,
    /// Response body did not have the expected shape.
    Parse,
    /// An authenticated call was attempted without a token.
    MissingToken,
    /// The caller cancelled the request.
    Cancelled,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::HttpStatus(status) => write!(f, "http_status({status})"),
            AuthErrorKind::Timeout => write!(f, "timeout"),
            AuthErrorKind::Network => write!(f, "network"),
            AuthErrorKind::Parse => write!(f, "parse"),
            AuthErrorKind::MissingToken => write!(f, "missing_token"),
            AuthErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured error from the auth API with kind and details.
#[derive(Debug, Clone)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    /// One-line summary suitable for logs
    pub message: String,
    /// Server-provided explanation, if one could be extracted
    pub server_message: Option<String>,
    /// Raw response body or parser output
    pub details: Option<String>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            server_message: None,
            details: None,
        }
    }

    /// Creates an HTTP status error, mining DRF-style bodies for a message.
    pub fn http_status(status: u16, body: &str) -> Self {
        let server_message = extract_server_message(body);
        let message = match &server_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: AuthErrorKind::HttpStatus(status),
            message,
            server_message,
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    pub fn parse(message: impl Into<String>, body: &str) -> Self {
        Self {
            details: (!body.is_empty()).then(|| body.to_string()),
            ..Self::new(AuthErrorKind::Parse, message)
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Network, message)
    }

    pub fn missing_token() -> Self {
        Self::new(AuthErrorKind::MissingToken, "No auth token is set")
    }

    pub fn cancelled() -> Self {
        Self::new(AuthErrorKind::Cancelled, "Request cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == AuthErrorKind::Cancelled
    }

    /// Message to show the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self.kind {
            AuthErrorKind::HttpStatus(status) => match (&self.server_message, status) {
                (Some(msg), 400..=499) => msg.clone(),
                (_, 400 | 401) => "Invalid username or password.".to_string(),
                (_, 403) => "This account is not allowed to sign in.".to_string(),
                (_, 500..=599) => "The server is unavailable. Try again later.".to_string(),
                _ => format!("Sign-in failed (HTTP {status})."),
            },
            AuthErrorKind::Timeout | AuthErrorKind::Network => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            AuthErrorKind::Parse => "Unexpected response from the server.".to_string(),
            AuthErrorKind::MissingToken => "You are not signed in.".to_string(),
            AuthErrorKind::Cancelled => "Sign-in cancelled.".to_string(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AuthError {}

/// Result type for auth operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Pulls a one-line message out of a DRF/Djoser error body.
///
/// Recognizes `{"detail": "..."}`, `{"non_field_errors": ["..."]}` and
/// per-field lists such as `{"password": ["..."]}`.
fn extract_server_message(body: &str) -> Option<String> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };

    let first_string = |value: &Value| -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
            _ => None,
        }
    };

    if let Some(msg) = map.get("detail").and_then(first_string) {
        return Some(msg);
    }
    if let Some(msg) = map.get("non_field_errors").and_then(first_string) {
        return Some(msg);
    }
    map.iter()
        .find_map(|(field, value)| first_string(value).map(|msg| format!("{field}: {msg}")))
}

/// Client for the token-authenticated user API.
///
/// Authenticated calls carry whatever token the session currently holds.
/// Every call takes a cancellation token; a cancelled call resolves to
/// [`AuthErrorKind::Cancelled`].
pub trait AuthClient: Send + Sync {
    /// Exchanges credentials for a token (`POST /token/login/`).
    fn exchange_token(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> impl Future<Output = AuthResult<Token>> + Send;

    /// Fetches the user the current token belongs to (`GET /users/me/`).
    fn fetch_current_user(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = AuthResult<UserProfile>> + Send;

    /// Invalidates the current token server-side (`POST /token/logout/`).
    fn logout(&self, cancel: &CancellationToken) -> impl Future<Output = AuthResult<()>> + Send;
}

impl<T: AuthClient> AuthClient for Arc<T> {
    fn exchange_token(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> impl Future<Output = AuthResult<Token>> + Send {
        (**self).exchange_token(credentials, cancel)
    }

    fn fetch_current_user(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = AuthResult<UserProfile>> + Send {
        (**self).fetch_current_user(cancel)
    }

    fn logout(&self, cancel: &CancellationToken) -> impl Future<Output = AuthResult<()>> + Send {
        (**self).logout(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let token = Token::new("abc123def456");
        assert_eq!(token.expose(), "abc123def456");
        assert!(!format!("{token:?}").contains("def456"));
        assert!(!token.to_string().contains("def456"));
        assert!(token.to_string().starts_with("abc1"));
    }

    #[test]
    fn test_user_profile_keeps_extra_attributes() {
        let user: UserProfile = serde_json::from_str(r#"{"id":1,"name":"John"}"#).unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.attribute("name"), Some("John"));
        assert_eq!(user.display_name(), "John");

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "John"}));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let user: UserProfile =
            serde_json::from_str(r#"{"id":7,"name":"","username":"jdoe"}"#).unwrap();
        assert_eq!(user.display_name(), "jdoe");

        let user: UserProfile = serde_json::from_str(r#"{"id":7}"#).unwrap();
        assert_eq!(user.display_name(), "#7");
    }

    #[test]
    fn test_http_status_extracts_non_field_errors() {
        let err = AuthError::http_status(
            400,
            r#"{"non_field_errors":["Unable to log in with provided credentials."]}"#,
        );
        assert_eq!(err.kind, AuthErrorKind::HttpStatus(400));
        assert_eq!(
            err.message,
            "HTTP 400: Unable to log in with provided credentials."
        );
        assert_eq!(
            err.user_message(),
            "Unable to log in with provided credentials."
        );
    }

    #[test]
    fn test_http_status_extracts_detail_and_field_errors() {
        let err = AuthError::http_status(401, r#"{"detail":"Invalid token."}"#);
        assert_eq!(err.server_message.as_deref(), Some("Invalid token."));

        let err = AuthError::http_status(400, r#"{"password":["This field may not be blank."]}"#);
        assert_eq!(
            err.server_message.as_deref(),
            Some("password: This field may not be blank.")
        );
    }

    #[test]
    fn test_http_status_without_json_body() {
        let err = AuthError::http_status(401, "");
        assert_eq!(err.message, "HTTP 401");
        assert!(err.details.is_none());
        assert_eq!(err.user_message(), "Invalid username or password.");

        let err = AuthError::http_status(502, "<html>bad gateway</html>");
        assert!(err.server_message.is_none());
        assert_eq!(err.details.as_deref(), Some("<html>bad gateway</html>"));
        assert!(err.user_message().contains("unavailable"));
    }
}
