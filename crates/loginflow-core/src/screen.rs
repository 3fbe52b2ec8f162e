//! Login screen state holder.
//!
//! The reducer owns the form and the flow state. It never performs I/O:
//! [`LoginScreen::update`] mutates state and returns [`LoginEffect`]s, and the
//! runtime executes them (see [`execute_effect`]) and feeds results back as
//! [`LoginEvent`]s.

use tokio_util::sync::CancellationToken;

use crate::auth::AuthClient;
use crate::flow::{LoginError, LoginFlow};
use crate::form::{Credentials, Field, FieldStore};
use crate::navigation::Navigator;
use crate::session::{Session, SessionSink};
use crate::validation::{FieldFlags, Validator};

/// Where the screen is in the login lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    Submitting,
    /// Terminal: the flow has navigated away.
    Authenticated,
    /// The last submit failed; the message is meant for display.
    Failed { message: String },
}

/// Input to the reducer.
#[derive(Debug)]
pub enum LoginEvent {
    FieldChanged { field: Field, value: String },
    SubmitPressed,
    SubmitFinished(Result<Session, LoginError>),
    /// The screen is being torn down.
    Closed,
}

/// Work for the runtime.
#[derive(Debug)]
pub enum LoginEffect {
    /// Run [`LoginFlow::submit`] with this snapshot and report back with
    /// [`LoginEvent::SubmitFinished`].
    SpawnSubmit {
        credentials: Credentials,
        cancel: CancellationToken,
    },
    /// Cancel an in-flight submit.
    CancelTask { cancel: CancellationToken },
}

#[derive(Debug)]
pub struct LoginScreen {
    form: FieldStore,
    state: FlowState,
    cancel: Option<CancellationToken>,
}

impl LoginScreen {
    pub fn new(validator: Validator) -> Self {
        Self {
            form: FieldStore::new(validator),
            state: FlowState::Idle,
            cancel: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn form(&self) -> &FieldStore {
        &self.form
    }

    pub fn flags(&self, field: Field) -> FieldFlags {
        self.form.flags(field)
    }

    pub fn is_submitting(&self) -> bool {
        self.state == FlowState::Submitting
    }

    /// Whether the submit control should accept presses.
    pub fn is_submit_enabled(&self) -> bool {
        self.form.can_submit()
            && matches!(self.state, FlowState::Idle | FlowState::Failed { .. })
    }

    /// The failure message to display, if any.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            FlowState::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn update(&mut self, event: LoginEvent) -> Vec<LoginEffect> {
        match event {
            LoginEvent::FieldChanged { field, value } => {
                self.on_field_changed(field, value);
                vec![]
            }
            LoginEvent::SubmitPressed => self.on_submit_pressed(),
            LoginEvent::SubmitFinished(result) => {
                self.on_submit_finished(result);
                vec![]
            }
            LoginEvent::Closed => self.on_closed(),
        }
    }

    fn on_field_changed(&mut self, field: Field, value: String) {
        if self.state == FlowState::Authenticated {
            return;
        }
        self.form.set_field(field, value);
        if matches!(self.state, FlowState::Failed { .. }) {
            self.state = FlowState::Idle;
        }
    }

    fn on_submit_pressed(&mut self) -> Vec<LoginEffect> {
        if !self.is_submit_enabled() {
            tracing::debug!(state = ?self.state, "submit ignored");
            return vec![];
        }

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.state = FlowState::Submitting;
        vec![LoginEffect::SpawnSubmit {
            credentials: self.form.credentials().clone(),
            cancel,
        }]
    }

    fn on_submit_finished(&mut self, result: Result<Session, LoginError>) {
        if self.state != FlowState::Submitting {
            // Late result after the screen was closed.
            return;
        }
        self.cancel = None;

        self.state = match result {
            Ok(_) => FlowState::Authenticated,
            Err(e) if e.is_cancelled() => FlowState::Idle,
            Err(e) => FlowState::Failed {
                message: e.user_message(),
            },
        };
    }

    fn on_closed(&mut self) -> Vec<LoginEffect> {
        if self.state == FlowState::Submitting {
            self.state = FlowState::Idle;
        }
        self.cancel
            .take()
            .map(|cancel| LoginEffect::CancelTask { cancel })
            .into_iter()
            .collect()
    }
}

/// Executes one effect, returning the event to feed back, if any.
pub async fn execute_effect<C, S, N>(
    flow: &LoginFlow<C, S, N>,
    effect: LoginEffect,
) -> Option<LoginEvent>
where
    C: AuthClient,
    S: SessionSink,
    N: Navigator,
{
    match effect {
        LoginEffect::SpawnSubmit {
            credentials,
            cancel,
        } => {
            let result = flow.submit(&credentials, &cancel).await;
            Some(LoginEvent::SubmitFinished(result))
        }
        LoginEffect::CancelTask { cancel } => {
            cancel.cancel();
            None
        }
    }
}
