//! Session State
//!
//! The slice of application state the send workflow reads: which fiat
//! currency backs the "other" unit, whether single sign-on is on, and how the
//! node labels its smallest unit. Changes are made with explicit commands and
//! pushed to subscribers over a watch channel.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Fiat code behind [`crate::units::CurrencyUnit::Other`]
    pub fiat_unit: String,
    /// Single sign-on: skip password re-authorization
    pub sso: bool,
    /// Label of the node's smallest unit, e.g. "Sats"
    pub smaller_currency_unit: String,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            fiat_unit: "USD".to_string(),
            sso: false,
            smaller_currency_unit: "Sats".to_string(),
        }
    }
}

/// A change to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SetFiatUnit(String),
    SetSso(bool),
    SetSmallerCurrencyUnit(String),
    Replace(SessionSnapshot),
}

impl SessionSnapshot {
    fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetFiatUnit(fiat) => self.fiat_unit = fiat,
            SessionCommand::SetSso(sso) => self.sso = sso,
            SessionCommand::SetSmallerCurrencyUnit(label) => self.smaller_currency_unit = label,
            SessionCommand::Replace(snapshot) => *self = snapshot,
        }
    }
}

/// Shared handle to the session state
#[derive(Debug, Clone)]
pub struct AppState {
    sender: Arc<watch::Sender<SessionSnapshot>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SessionSnapshot::default())
    }
}

impl AppState {
    pub fn new(initial: SessionSnapshot) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.sender.borrow().clone()
    }

    /// Apply a command and notify subscribers if anything changed
    pub fn apply(&self, command: SessionCommand) {
        debug!("Session command: {:?}", command);
        self.sender.send_if_modified(|snapshot| {
            let before = snapshot.clone();
            snapshot.apply(command);
            *snapshot != before
        });
    }

    /// Receive every future change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.sender.subscribe()
    }
}
