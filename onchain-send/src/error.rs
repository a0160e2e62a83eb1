//! Error types
//!
//! Every failure here is local to one send attempt. None of them is fatal to
//! the process; the form is always left in a state the user can correct.

use std::io;
use thiserror::Error;

use crate::lifecycle::{ScopeError, Stage};
use crate::units::CurrencyUnit;

/// Why a send attempt or unit switch did not complete
#[derive(Debug, Error)]
pub enum SendError {
    /// The draft failed validation; nothing was shown to the user
    #[error("transaction is incomplete: address, amount and fee are required")]
    InvalidDraft,

    /// Another attempt is still running
    #[error("a send attempt is already in progress")]
    AttemptInProgress,

    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// The backend refused the password
    #[error("authorization denied")]
    AuthorizationDenied,

    #[error("authorization check failed: {0}")]
    Authorization(#[from] AuthError),

    /// The user declined or closed a prompt
    #[error("cancelled during {0}")]
    Cancelled(Stage),

    #[error("timed out during {0}")]
    Timeout(Stage),

    #[error("prompt failed: {0}")]
    Prompt(#[from] PromptError),

    /// The workflow was torn down while the attempt was pending
    #[error("send workflow was torn down")]
    TornDown,
}

impl SendError {
    /// True for outcomes the user chose, as opposed to failures
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SendError::Cancelled(_) | SendError::TornDown)
    }
}

impl From<ScopeError> for SendError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Cancelled => SendError::TornDown,
            ScopeError::TimedOut(stage) => SendError::Timeout(stage),
        }
    }
}

/// Failures of the conversion lookup
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("no exchange rate for {0}")]
    UnknownFiat(String),

    #[error("invalid exchange rate {rate} for {fiat}")]
    InvalidRate { fiat: String, rate: f64 },

    #[error("conversion result has no value for {0}")]
    MissingUnit(CurrencyUnit),

    #[error("could not re-read formatted amount: {0}")]
    Format(#[from] std::num::ParseFloatError),

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// Failures of the authorization backend (as opposed to a denial)
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid password hash: {0}")]
    InvalidHash(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Failures of the prompt gateway itself
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("prompt task failed: {0}")]
    Interrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        assert!(SendError::Cancelled(Stage::Confirming).is_cancellation());
        assert!(SendError::TornDown.is_cancellation());
        assert!(!SendError::AuthorizationDenied.is_cancellation());
        assert!(!SendError::Timeout(Stage::Authorizing).is_cancellation());
    }

    #[test]
    fn test_scope_errors_map_to_send_errors() {
        assert!(matches!(
            SendError::from(ScopeError::Cancelled),
            SendError::TornDown
        ));
        assert!(matches!(
            SendError::from(ScopeError::TimedOut(Stage::Normalizing)),
            SendError::Timeout(Stage::Normalizing)
        ));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            SendError::Cancelled(Stage::Authorizing).to_string(),
            "cancelled during authorization"
        );
        assert_eq!(
            ConversionError::MissingUnit(CurrencyUnit::Btc).to_string(),
            "conversion result has no value for BTC"
        );
    }
}
