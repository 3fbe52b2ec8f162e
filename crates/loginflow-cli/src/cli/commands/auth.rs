//! Login, logout and whoami command handlers.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use loginflow_core::auth::{AuthClient, HttpAuthClient};
use loginflow_core::config::{Config, paths};
use loginflow_core::flow::LoginFlow;
use loginflow_core::form::Field;
use loginflow_core::navigation::{ChannelNavigator, Navigator, Screen};
use loginflow_core::screen::{FlowState, LoginEffect, LoginEvent, LoginScreen, execute_effect};
use loginflow_core::session::cache::SessionCache;
use loginflow_core::session::{SessionSink, SessionStore};
use loginflow_core::validation::Validator;
use tokio_util::sync::CancellationToken;

use crate::interrupt::{self, InterruptedError};

/// Reads one trimmed line from stdin. `None` on EOF.
fn read_line(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    prompt: &str,
) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush().context("flush stdout")?;
    lines
        .next()
        .transpose()
        .context("read stdin")
        .map(|line| line.map(|l| l.trim_end_matches(['\r', '\n']).to_string()))
}

/// Prints why the current field values cannot be submitted.
fn report_invalid_fields(screen: &LoginScreen) {
    for field in Field::all() {
        if !screen.form().validation().get(*field) {
            let rule = screen.form().validator().rule(*field);
            eprintln!("Invalid {field}: must match {}", rule.as_str());
        }
    }
}

/// Reads one line, failing with [`InterruptedError`] if Ctrl+C was pressed
/// while waiting for it.
fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> Result<Option<String>> {
    let line = read_line(lines, label)?;
    if interrupt::is_interrupted() {
        return Err(InterruptedError.into());
    }
    Ok(line)
}

/// Runs effects until none remain, feeding results back into the screen.
///
/// Ctrl+C closes the screen. The in-flight submit is cancelled and still
/// awaited so the flow unwinds its own session writes before we bail.
async fn run_effects<C, S, N>(
    flow: &LoginFlow<C, S, N>,
    screen: &mut LoginScreen,
    effects: Vec<LoginEffect>,
) -> Result<()>
where
    C: AuthClient,
    S: SessionSink,
    N: Navigator,
{
    let mut pending: VecDeque<LoginEffect> = effects.into();
    while let Some(effect) = pending.pop_front() {
        let task = execute_effect(flow, effect);
        tokio::pin!(task);

        let event = tokio::select! {
            event = &mut task => event,
            () = interrupt::wait_for_interrupt() => {
                for effect in screen.update(LoginEvent::Closed) {
                    execute_effect(flow, effect).await;
                }
                let outcome = task.await;
                tracing::debug!(?outcome, "submit unwound after interrupt");
                return Err(InterruptedError.into());
            }
        };
        if let Some(event) = event {
            pending.extend(screen.update(event));
        }
    }
    Ok(())
}

pub async fn login(config: &Config, flag_username: Option<String>) -> Result<()> {
    let validator = Validator::from_config(&config.validation).context("load validation rules")?;
    let session = SessionStore::new();
    let client = HttpAuthClient::from_config(&config.api, session.clone())?;
    let base_url = client.base_url().to_string();
    let (navigator, mut screens) = ChannelNavigator::new();
    let flow = LoginFlow::new(client, session.clone(), navigator, validator.clone());
    let mut screen = LoginScreen::new(validator);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut last_error: Option<String> = None;

    loop {
        let username = match &flag_username {
            Some(name) => Some(name.clone()),
            None => prompt(&mut lines, "Username: ")?,
        };
        let Some(username) = username else {
            break;
        };
        let Some(password) = prompt(&mut lines, "Password: ")? else {
            break;
        };

        screen.update(LoginEvent::FieldChanged {
            field: Field::Username,
            value: username,
        });
        screen.update(LoginEvent::FieldChanged {
            field: Field::Password,
            value: password,
        });

        if !screen.is_submit_enabled() {
            report_invalid_fields(&screen);
            if flag_username.is_some() && !screen.form().validation().username() {
                anyhow::bail!("Invalid username given with --username");
            }
            last_error = Some("Credentials do not match the required format".to_string());
            continue;
        }

        let effects = screen.update(LoginEvent::SubmitPressed);
        run_effects(&flow, &mut screen, effects).await?;

        match screen.state() {
            FlowState::Authenticated => break,
            FlowState::Failed { message } => {
                eprintln!("Login failed: {message}");
                last_error = Some(message.clone());
            }
            FlowState::Idle | FlowState::Submitting => {
                anyhow::bail!("Login cancelled");
            }
        }
    }

    if screen.state() != &FlowState::Authenticated {
        anyhow::bail!(last_error.unwrap_or_else(|| "No credentials provided".to_string()));
    }

    let current = session
        .current()
        .context("login finished without a session")?;
    if screens.try_recv().ok() == Some(Screen::Home) {
        tracing::debug!("arrived at home screen");
    }

    SessionCache::new(base_url, current.clone())
        .save(&paths::session_path())
        .context("save session")?;

    println!("Logged in as {}", current.user.display_name());
    Ok(())
}

pub async fn logout(config: &Config) -> Result<()> {
    let path = paths::session_path();
    let Some(cache) = SessionCache::load(&path)? else {
        println!("Not logged in.");
        return Ok(());
    };

    let session = SessionStore::restored(cache.session());
    let client = HttpAuthClient::new(&config.api, cache.base_url.clone(), session.clone())?;
    let (navigator, _screens) = ChannelNavigator::new();
    let validator = Validator::from_config(&config.validation)?;
    let flow = LoginFlow::new(client, session, navigator, validator);

    let result = flow.logout(&CancellationToken::new()).await;
    SessionCache::remove(&path)?;

    match result {
        Ok(()) => println!("Logged out."),
        Err(e) => {
            eprintln!("Warning: {e}");
            println!("Logged out locally.");
        }
    }
    Ok(())
}

pub async fn whoami(config: &Config) -> Result<()> {
    let path = paths::session_path();
    let Some(cache) = SessionCache::load(&path)? else {
        anyhow::bail!("Not logged in. Run `loginflow login` first.");
    };

    let session = SessionStore::new();
    session.set_token(cache.token.clone());
    let client = HttpAuthClient::new(&config.api, cache.base_url.clone(), session)?;

    let user = client
        .fetch_current_user(&CancellationToken::new())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let since = cache.logged_in_at.with_timezone(&chrono::Local);
    eprintln!("Signed in at {} since {}", cache.base_url, since.format("%Y-%m-%d %H:%M"));
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}
