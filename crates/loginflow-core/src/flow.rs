//! The login flow: validate, exchange, store, fetch, store, navigate.
//!
//! `LoginFlow` is the only writer to the session during login. It admits one
//! submit at a time; a second submit while the first is pending is rejected
//! with [`LoginError::Busy`] instead of firing another token request.

use std::fmt;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthClient, AuthError};
use crate::form::Credentials;
use crate::navigation::{Navigator, Screen};
use crate::session::{Session, SessionSink};
use crate::validation::{ValidationState, Validator};

/// Why a submit did not produce a session.
#[derive(Debug, Clone)]
pub enum LoginError {
    /// Credentials failed client-side validation; nothing was sent.
    Invalid(ValidationState),
    /// Another submit is already in flight.
    Busy,
    /// The token exchange or the profile fetch failed.
    Auth(AuthError),
}

impl LoginError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoginError::Auth(e) if e.is_cancelled())
    }

    /// Message to show on the login screen.
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Invalid(state) => match (state.username(), state.password()) {
                (false, false) => "Enter a valid username and password.".to_string(),
                (false, true) => "Enter a valid username.".to_string(),
                _ => "Enter a valid password.".to_string(),
            },
            LoginError::Busy => "Sign-in already in progress.".to_string(),
            LoginError::Auth(e) => e.user_message(),
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginError::Invalid(state) => write!(
                f,
                "Invalid credentials (username valid: {}, password valid: {})",
                state.username(),
                state.password()
            ),
            LoginError::Busy => write!(f, "A login request is already in flight"),
            LoginError::Auth(e) => write!(f, "Login failed: {e}"),
        }
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoginError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AuthError> for LoginError {
    fn from(e: AuthError) -> Self {
        LoginError::Auth(e)
    }
}

/// Orchestrates a login against an [`AuthClient`].
pub struct LoginFlow<C, S, N> {
    client: C,
    sink: S,
    navigator: N,
    validator: Validator,
    in_flight: Mutex<()>,
}

impl<C, S, N> LoginFlow<C, S, N>
where
    C: AuthClient,
    S: SessionSink,
    N: Navigator,
{
    pub fn new(client: C, sink: S, navigator: N, validator: Validator) -> Self {
        Self {
            client,
            sink,
            navigator,
            validator,
            in_flight: Mutex::new(()),
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Runs the login sequence for `credentials`.
    ///
    /// Steps run strictly in order and the first failure aborts the rest.
    /// Cancelling `cancel` aborts whichever request is pending.
    ///
    /// A submit replaces whatever session the sink held before: storing the
    /// new token already discards the previous one. If the profile fetch then
    /// fails or is cancelled, the sink is cleared, so it ends up empty rather
    /// than holding a token without a user.
    ///
    /// # Errors
    /// Returns [`LoginError::Invalid`] without any network call if the
    /// credentials fail validation, [`LoginError::Busy`] if another submit is
    /// pending, or [`LoginError::Auth`] if a request fails.
    pub async fn submit(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<Session, LoginError> {
        let validation = self.validator.check(credentials);
        if !validation.all_valid() {
            tracing::debug!(?validation, "submit refused, credentials invalid");
            return Err(LoginError::Invalid(validation));
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("submit refused, a login is already in flight");
            return Err(LoginError::Busy);
        };

        let token = self
            .client
            .exchange_token(credentials, cancel)
            .await
            .inspect_err(|e| tracing::warn!(kind = %e.kind, error = %e, "token exchange failed"))?;
        self.sink.set_token(token.clone());

        let user = match self.client.fetch_current_user(cancel).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(kind = %e.kind, error = %e, "fetching current user failed");
                self.sink.clear();
                return Err(e.into());
            }
        };
        self.sink.set_user(user.clone());

        tracing::info!(
            user_id = user.id,
            username = %credentials.username,
            "login succeeded"
        );
        self.navigator.go_to(Screen::Home);

        Ok(Session { token, user })
    }

    /// Invalidates the token server-side, then clears the session and
    /// returns to the login screen.
    ///
    /// The local session is cleared even if the server call fails.
    ///
    /// # Errors
    /// Returns [`LoginError::Busy`] while a login is pending, or
    /// [`LoginError::Auth`] if the server rejected the logout.
    pub async fn logout(&self, cancel: &CancellationToken) -> Result<(), LoginError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return Err(LoginError::Busy);
        };

        let result = self.client.logout(cancel).await;
        if let Err(e) = &result {
            tracing::warn!(kind = %e.kind, error = %e, "server logout failed");
        }
        self.sink.clear();
        tracing::info!("logged out");
        self.navigator.go_to(Screen::Login);
        result.map_err(LoginError::from)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use tokio::sync::Notify;

    use super::testing::{Call, FakeClient, RecordingNavigator, RecordingSink, SinkEvent, john};
    use super::*;
    use crate::auth::{AuthErrorKind, Token};
    use crate::session::SessionStore;
    use crate::validation::default_validator;

    type TestFlow = LoginFlow<Arc<FakeClient>, Arc<RecordingSink>, Arc<RecordingNavigator>>;

    struct Harness {
        client: Arc<FakeClient>,
        sink: Arc<RecordingSink>,
        navigator: Arc<RecordingNavigator>,
        flow: TestFlow,
    }

    fn harness(client: FakeClient) -> Harness {
        let client = Arc::new(client);
        let sink = Arc::new(RecordingSink::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let flow = LoginFlow::new(
            Arc::clone(&client),
            Arc::clone(&sink),
            Arc::clone(&navigator),
            default_validator(),
        );
        Harness {
            client,
            sink,
            navigator,
            flow,
        }
    }

    fn creds() -> Credentials {
        Credentials::new("john", "secret")
    }

    #[tokio::test]
    async fn test_successful_login_runs_every_step_in_order() {
        let h = harness(FakeClient::answering(Ok(Token::new("abc123")), Ok(john())));

        let session = h
            .flow
            .submit(&creds(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.token, Token::new("abc123"));
        assert_eq!(session.user, john());
        assert_eq!(
            h.client.calls(),
            vec![Call::Exchange("john".to_string()), Call::FetchUser]
        );
        assert_eq!(
            h.sink.events(),
            vec![SinkEvent::Token("abc123".to_string()), SinkEvent::User(1)]
        );
        assert_eq!(h.navigator.screens(), vec![Screen::Home]);
    }

    #[tokio::test]
    async fn test_exchange_failure_stops_everything() {
        let h = harness(FakeClient::answering(
            Err(AuthError::http_status(401, "")),
            Ok(john()),
        ));

        let err = h
            .flow
            .submit(&creds(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LoginError::Auth(AuthError {
                kind: AuthErrorKind::HttpStatus(401),
                ..
            })
        ));
        assert_eq!(h.client.calls(), vec![Call::Exchange("john".to_string())]);
        assert!(h.sink.events().is_empty());
        assert!(h.navigator.screens().is_empty());
    }

    #[tokio::test]
    async fn test_user_fetch_failure_clears_token_and_does_not_navigate() {
        let h = harness(FakeClient::answering(
            Ok(Token::new("abc123")),
            Err(AuthError::http_status(500, "")),
        ));

        let err = h
            .flow
            .submit(&creds(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(!err.is_cancelled());
        assert_eq!(
            h.sink.events(),
            vec![SinkEvent::Token("abc123".to_string()), SinkEvent::Clear]
        );
        assert!(h.navigator.screens().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_credentials_never_reach_the_client() {
        let h = harness(FakeClient::default());

        let err = h
            .flow
            .submit(&Credentials::new("", "secret"), &CancellationToken::new())
            .await
            .unwrap_err();

        let LoginError::Invalid(state) = err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert!(!state.username());
        assert!(state.password());
        assert!(h.client.calls().is_empty());
        assert!(h.sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_double_submit_keeps_one_exchange_in_flight() {
        let gate = Arc::new(Notify::new());
        let mut client = FakeClient::answering(Ok(Token::new("abc123")), Ok(john()));
        client.gate = Some(Arc::clone(&gate));
        let h = harness(client);
        let cancel = CancellationToken::new();
        let credentials = creds();

        let (first, second) = tokio::join!(h.flow.submit(&credentials, &cancel), async {
            while h.client.exchange_calls() == 0 {
                tokio::task::yield_now().await;
            }
            let second = h.flow.submit(&credentials, &cancel).await;
            gate.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(LoginError::Busy)));
        assert_eq!(h.client.exchange_calls(), 1);
        assert_eq!(h.client.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(h.navigator.screens(), vec![Screen::Home]);
    }

    #[tokio::test]
    async fn test_submit_after_failure_is_allowed() {
        let client = FakeClient::answering(Err(AuthError::http_status(401, "")), Ok(john()));
        client
            .tokens
            .lock()
            .unwrap()
            .push_back(Ok(Token::new("abc123")));
        let h = harness(client);
        let cancel = CancellationToken::new();

        assert!(h.flow.submit(&creds(), &cancel).await.is_err());
        assert!(h.flow.submit(&creds(), &cancel).await.is_ok());
        assert_eq!(h.navigator.screens(), vec![Screen::Home]);
    }

    #[tokio::test]
    async fn test_cancelled_submit_leaves_session_untouched() {
        let gate = Arc::new(Notify::new());
        let mut client = FakeClient::answering(Ok(Token::new("abc123")), Ok(john()));
        client.gate = Some(gate);
        let h = harness(client);
        let cancel = CancellationToken::new();

        let creds = creds();
        let (result, ()) = tokio::join!(h.flow.submit(&creds, &cancel), async {
            while h.client.exchange_calls() == 0 {
                tokio::task::yield_now().await;
            }
            cancel.cancel();
        });

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.user_message(), "Sign-in cancelled.");
        assert!(h.sink.events().is_empty());
        assert!(h.navigator.screens().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_user_fetch_clears_token() {
        let gate = Arc::new(Notify::new());
        let mut client = FakeClient::answering(Ok(Token::new("abc123")), Ok(john()));
        client.user_gate = Some(gate);
        let h = harness(client);
        let cancel = CancellationToken::new();

        let creds = creds();
        let (result, ()) = tokio::join!(h.flow.submit(&creds, &cancel), async {
            while !h.client.calls().contains(&Call::FetchUser) {
                tokio::task::yield_now().await;
            }
            cancel.cancel();
        });

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(
            h.sink.events(),
            vec![SinkEvent::Token("abc123".to_string()), SinkEvent::Clear]
        );
        assert!(h.navigator.screens().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submit_replaces_restored_session() {
        let store = SessionStore::restored(Session {
            token: Token::new("old-token"),
            user: john(),
        });
        let flow = LoginFlow::new(
            FakeClient::answering(
                Ok(Token::new("abc123")),
                Err(AuthError::http_status(500, "")),
            ),
            store.clone(),
            RecordingNavigator::default(),
            default_validator(),
        );

        assert!(flow.submit(&creds(), &CancellationToken::new()).await.is_err());
        assert!(store.token().is_none());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_returns_to_login() {
        let h = harness(FakeClient::default());
        h.flow.logout(&CancellationToken::new()).await.unwrap();
        assert_eq!(h.client.calls(), vec![Call::Logout]);
        assert_eq!(h.sink.events(), vec![SinkEvent::Clear]);
        assert_eq!(h.navigator.screens(), vec![Screen::Login]);
    }

    #[test]
    fn test_user_messages() {
        let invalid = default_validator().check(&Credentials::new("", ""));
        assert_eq!(
            LoginError::Invalid(invalid).user_message(),
            "Enter a valid username and password."
        );
        assert_eq!(
            LoginError::Busy.user_message(),
            "Sign-in already in progress."
        );
        assert_eq!(
            LoginError::from(AuthError::http_status(401, "")).user_message(),
            "Invalid username or password."
        );
    }
}
