//! Confirmation and Password Prompts
//!
//! The workflow asks the user two kinds of questions: "send this?" and "enter
//! your login password". [`PromptGateway`] is the seam to whatever shows them.
//!
//! [`PromptBroker`] hands prompts to a UI over a channel. Each prompt gets its
//! own token and a reply is only accepted for the token it was issued for, so
//! a late answer to an old prompt can never resolve a newer one.
//! [`TerminalPrompts`] asks on stdin instead.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::PromptError;
use crate::lifecycle::AttemptId;

/// Summary shown before sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub title: String,
    /// Label/value pairs, in display order
    pub fields: Vec<(String, String)>,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl ConfirmationRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            confirm_label: "Send".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl ToString) {
        self.fields.push((label.into(), value.to_string()));
    }

    /// Value shown for `label`, if present
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.fields.iter().map(|(l, _)| l.as_str()).collect()
    }
}

/// Masked password entry used to re-authorize a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationChallenge {
    pub title: String,
    pub placeholder: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl AuthorizationChallenge {
    pub fn login_password() -> Self {
        Self {
            title: "Enter Login Password".to_string(),
            placeholder: "Enter Login Password".to_string(),
            confirm_label: "Authorize".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }
}

/// Shows prompts and returns the user's answer.
///
/// A closed or dismissed prompt is an ordinary answer (`false` / `None`),
/// not an error.
#[async_trait]
pub trait PromptGateway: Send + Sync {
    async fn confirm(
        &self,
        attempt: AttemptId,
        request: ConfirmationRequest,
    ) -> Result<bool, PromptError>;

    async fn password(
        &self,
        attempt: AttemptId,
        challenge: AuthorizationChallenge,
    ) -> Result<Option<Zeroizing<String>>, PromptError>;
}

/// Identifies one issued prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptToken {
    pub attempt: AttemptId,
    seq: u64,
}

impl fmt::Display for PromptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.attempt, self.seq)
    }
}

/// A prompt waiting to be shown by the UI
#[derive(Debug, Clone)]
pub enum PromptEvent {
    Confirm {
        token: PromptToken,
        request: ConfirmationRequest,
    },
    Password {
        token: PromptToken,
        challenge: AuthorizationChallenge,
    },
}

impl PromptEvent {
    pub fn token(&self) -> PromptToken {
        match self {
            PromptEvent::Confirm { token, .. } | PromptEvent::Password { token, .. } => *token,
        }
    }
}

/// The UI's answer to a [`PromptEvent`]
#[derive(Debug)]
pub enum PromptReply {
    Confirmed(bool),
    /// `None` when the password prompt was cancelled
    Password(Option<Zeroizing<String>>),
}

type Pending = Mutex<HashMap<PromptToken, oneshot::Sender<PromptReply>>>;

/// Channel-based gateway with per-prompt reply correlation
#[derive(Debug)]
pub struct PromptBroker {
    events: mpsc::UnboundedSender<PromptEvent>,
    pending: Pending,
    next_seq: AtomicU64,
}

impl PromptBroker {
    /// Create a broker and the receiver the UI reads prompts from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PromptEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let broker = Self {
            events,
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        };
        (broker, receiver)
    }

    /// Deliver the UI's answer.
    ///
    /// Returns false if the token is unknown: the prompt was already
    /// answered, or its attempt is gone.
    pub fn respond(&self, token: PromptToken, reply: PromptReply) -> bool {
        let Some(sender) = self.pending.lock().remove(&token) else {
            warn!("Dropping reply for stale prompt {}", token);
            return false;
        };
        sender.send(reply).is_ok()
    }

    /// Number of prompts awaiting an answer
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    async fn ask(&self, attempt: AttemptId, make: impl FnOnce(PromptToken) -> PromptEvent) -> Option<PromptReply> {
        let token = PromptToken {
            attempt,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        };
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(token, sender);
        let _pending = PendingGuard {
            pending: &self.pending,
            token,
        };

        if self.events.send(make(token)).is_err() {
            debug!("Prompt UI is gone; treating {} as dismissed", token);
            return None;
        }

        receiver.await.ok()
    }
}

/// Forgets a prompt when its waiter goes away, answered or not
struct PendingGuard<'a> {
    pending: &'a Pending,
    token: PromptToken,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.token);
    }
}

#[async_trait]
impl PromptGateway for PromptBroker {
    async fn confirm(
        &self,
        attempt: AttemptId,
        request: ConfirmationRequest,
    ) -> Result<bool, PromptError> {
        let reply = self
            .ask(attempt, |token| PromptEvent::Confirm { token, request })
            .await;
        match reply {
            Some(PromptReply::Confirmed(confirmed)) => Ok(confirmed),
            Some(PromptReply::Password(_)) => {
                warn!("Password reply to a confirmation prompt; treating as dismissed");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn password(
        &self,
        attempt: AttemptId,
        challenge: AuthorizationChallenge,
    ) -> Result<Option<Zeroizing<String>>, PromptError> {
        let reply = self
            .ask(attempt, |token| PromptEvent::Password { token, challenge })
            .await;
        match reply {
            Some(PromptReply::Password(password)) => Ok(password),
            Some(PromptReply::Confirmed(_)) => {
                warn!("Confirmation reply to a password prompt; treating as dismissed");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Prompts on the controlling terminal
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompts {
    /// Answer "yes" to confirmations without asking
    assume_yes: bool,
}

impl TerminalPrompts {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl PromptGateway for TerminalPrompts {
    async fn confirm(
        &self,
        _attempt: AttemptId,
        request: ConfirmationRequest,
    ) -> Result<bool, PromptError> {
        println!();
        println!("{}:", request.title);
        let width = request.fields.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (label, value) in &request.fields {
            println!("  {:<width$}  {}", format!("{}:", label), value, width = width + 1);
        }
        println!();

        if self.assume_yes {
            return Ok(true);
        }

        let question = format!("{}?", request.confirm_label);
        tokio::task::spawn_blocking(move || prompt_confirm(&question))
            .await
            .map_err(|e| PromptError::Interrupted(e.to_string()))?
    }

    async fn password(
        &self,
        _attempt: AttemptId,
        challenge: AuthorizationChallenge,
    ) -> Result<Option<Zeroizing<String>>, PromptError> {
        let prompt = format!("{}: ", challenge.placeholder);
        let password = tokio::task::spawn_blocking(move || prompt_password(&prompt))
            .await
            .map_err(|e| PromptError::Interrupted(e.to_string()))??;

        // An empty entry is taken as cancel
        if password.is_empty() {
            Ok(None)
        } else {
            Ok(Some(password))
        }
    }
}

/// Prompt for password input (hidden)
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>, PromptError> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = rpassword::read_password()?;
    Ok(Zeroizing::new(password))
}

/// Prompt for confirmation
pub fn prompt_confirm(message: &str) -> Result<bool, PromptError> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y") || input.trim().eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::WorkflowScope;
    use std::sync::Arc;

    #[test]
    fn test_confirmation_request_fields() {
        let mut request = ConfirmationRequest::new("Send Funds");
        request.push("Address", "bc1qtest");
        request.push("Amount (Sats)", 50_000);

        assert_eq!(request.labels(), vec!["Address", "Amount (Sats)"]);
        assert_eq!(request.field("Amount (Sats)"), Some("50000"));
        assert_eq!(request.field("Fee"), None);
        assert_eq!(request.confirm_label, "Send");
    }

    #[tokio::test]
    async fn test_broker_routes_reply_by_token() {
        let (broker, mut events) = PromptBroker::new();
        let broker = Arc::new(broker);
        let scope = WorkflowScope::new();
        let attempt = scope.begin();

        let waiter = {
            let broker = broker.clone();
            let id = attempt.id();
            tokio::spawn(async move { broker.confirm(id, ConfirmationRequest::new("t")).await })
        };

        let event = events.recv().await.unwrap();
        assert_eq!(event.token().attempt, attempt.id());
        assert!(broker.respond(event.token(), PromptReply::Confirmed(true)));

        assert!(waiter.await.unwrap().unwrap());
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_broker_rejects_stale_token() {
        let (broker, mut events) = PromptBroker::new();
        let broker = Arc::new(broker);
        let scope = WorkflowScope::new();
        let attempt = scope.begin();
        let id = attempt.id();

        let first = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.confirm(id, ConfirmationRequest::new("first")).await })
        };
        let stale = events.recv().await.unwrap().token();
        assert!(broker.respond(stale, PromptReply::Confirmed(false)));
        assert!(!first.await.unwrap().unwrap());

        let second = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.confirm(id, ConfirmationRequest::new("second")).await })
        };
        let fresh = events.recv().await.unwrap().token();

        // Replaying the old answer must not resolve the new prompt
        assert!(!broker.respond(stale, PromptReply::Confirmed(true)));
        assert!(broker.respond(fresh, PromptReply::Confirmed(true)));
        assert!(second.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_broker_without_ui_dismisses() {
        let (broker, events) = PromptBroker::new();
        drop(events);
        let scope = WorkflowScope::new();
        let attempt = scope.begin();

        let confirmed = broker
            .confirm(attempt.id(), ConfirmationRequest::new("t"))
            .await
            .unwrap();
        assert!(!confirmed);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_waiter_forgets_prompt() {
        let (broker, mut events) = PromptBroker::new();
        let scope = WorkflowScope::new();
        let attempt = scope.begin();

        {
            let waiting = broker.password(attempt.id(), AuthorizationChallenge::login_password());
            tokio::pin!(waiting);
            // Poll once so the prompt is issued, then drop it
            assert!(poll_once(waiting.as_mut()).await.is_none());
        }

        let token = events.recv().await.unwrap().token();
        assert_eq!(broker.pending_count(), 0);
        assert!(!broker.respond(token, PromptReply::Password(None)));
    }

    async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            out = fut => Some(out),
            _ = tokio::task::yield_now() => None,
        }
    }

    #[tokio::test]
    async fn test_mismatched_reply_is_dismissal() {
        let (broker, mut events) = PromptBroker::new();
        let broker = Arc::new(broker);
        let scope = WorkflowScope::new();
        let id = scope.begin().id();

        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .password(id, AuthorizationChallenge::login_password())
                    .await
            })
        };
        let token = events.recv().await.unwrap().token();
        broker.respond(token, PromptReply::Confirmed(true));
        assert!(waiter.await.unwrap().unwrap().is_none());
    }
}
