//! Screen transitions.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Login,
    Home,
}

impl Screen {
    pub fn name(self) -> &'static str {
        match self {
            Screen::Login => "Login",
            Screen::Home => "Home",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives screen transition requests. Fire-and-forget.
pub trait Navigator: Send + Sync {
    fn go_to(&self, screen: Screen);
}

impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn go_to(&self, screen: Screen) {
        (**self).go_to(screen);
    }
}

/// Forwards transitions to whoever owns the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Screen>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Screen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn go_to(&self, screen: Screen) {
        tracing::debug!(%screen, "navigating");
        if self.tx.send(screen).is_err() {
            // Receiver dropped: the app is tearing down.
            tracing::debug!(%screen, "navigation dropped, no receiver");
        }
    }
}
