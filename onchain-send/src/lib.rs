//! On-chain Send
//!
//! The workflow behind a "send funds" form: an amount is entered in sats,
//! BTC or a fiat currency, confirmed by the user, re-authorized with the login
//! password when the whole balance is swept, and finally handed to a node.
//!
//! ## Structure
//!
//! - [`form`] and [`draft`] hold what the user entered
//! - [`conversion`] and [`units`] translate between denominations
//! - [`workflow`] runs the confirm/authorize/dispatch sequence
//! - [`lifecycle`] ties every pending wait to the workflow's lifetime
//!
//! The workflow only talks to its surroundings through traits
//! ([`ConversionService`], [`PromptGateway`], [`AuthorizationBackend`],
//! [`Dispatcher`]), with node, ticker and terminal implementations provided.

pub mod auth;
pub mod config;
pub mod conversion;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod form;
pub mod lifecycle;
pub mod prompt;
pub mod rpc;
pub mod session;
pub mod units;
pub mod workflow;

pub use auth::{AuthDecision, AuthorizationBackend, PasswordHash};
pub use conversion::{Conversion, ConversionService};
pub use dispatch::{Dispatcher, Notification};
pub use draft::{FeeMode, FeeModeKind, FinalizedTransaction, TransactionDraft};
pub use error::SendError;
pub use form::FormState;
pub use prompt::{PromptBroker, PromptGateway};
pub use session::{AppState, SessionCommand, SessionSnapshot};
pub use units::CurrencyUnit;
pub use workflow::{Collaborators, SendWorkflow, StageTimeouts};
