//! Send Workflow
//!
//! Drives one send attempt through four stages, strictly in order:
//!
//! 1. **Normalizing**: convert the amount to base units if it is shown in
//!    another unit.
//! 2. **Confirming**: show the summary and wait for the user.
//! 3. **Authorizing**: for sweeps without single sign-on, ask for the login
//!    password and have the backend check it.
//! 4. **Dispatching**: show the loading message, hand off the transaction and
//!    clear the draft.
//!
//! Any stage may end the attempt early. When it does, nothing is dispatched
//! and the form keeps what the user entered. Only one attempt (or unit
//! switch) runs at a time.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{AuthDecision, AuthorizationBackend, PasswordHash};
use crate::conversion::ConversionService;
use crate::dispatch::{Dispatcher, SENDING_FUNDS};
use crate::draft::{FeeMode, FinalizedTransaction};
use crate::error::{ConversionError, SendError};
use crate::form::FormState;
use crate::lifecycle::{AttemptScope, Stage, WorkflowScope};
use crate::prompt::{AuthorizationChallenge, ConfirmationRequest, PromptGateway};
use crate::session::{AppState, SessionSnapshot};
use crate::units::{CurrencyUnit, UnitFormats};

/// Title of the confirmation prompt
pub const CONFIRM_TITLE: &str = "Send Funds";

/// Default bound on conversion lookups and the password check
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bounds on the workflow's network waits. `None` waits forever.
///
/// Prompts are never bounded; they end when the user answers or the
/// workflow is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub conversion: Option<Duration>,
    pub authorization: Option<Duration>,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            conversion: Some(DEFAULT_STAGE_TIMEOUT),
            authorization: Some(DEFAULT_STAGE_TIMEOUT),
        }
    }
}

/// Services the workflow depends on
#[derive(Clone)]
pub struct Collaborators {
    pub converter: Arc<dyn ConversionService>,
    pub prompts: Arc<dyn PromptGateway>,
    pub authorizer: Arc<dyn AuthorizationBackend>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// Clears the in-flight flag when the attempt ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The send/sweep workflow for one form
pub struct SendWorkflow {
    form: Mutex<FormState>,
    session: AppState,
    collaborators: Collaborators,
    scope: WorkflowScope,
    in_flight: AtomicBool,
    timeouts: StageTimeouts,
    formats: UnitFormats,
}

impl SendWorkflow {
    pub fn new(form: FormState, session: AppState, collaborators: Collaborators) -> Self {
        Self {
            form: Mutex::new(form),
            session,
            collaborators,
            scope: WorkflowScope::new(),
            in_flight: AtomicBool::new(false),
            timeouts: StageTimeouts::default(),
            formats: UnitFormats::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_formats(mut self, formats: UnitFormats) -> Self {
        self.formats = formats;
        self
    }

    /// Copy of the current form
    pub fn form(&self) -> FormState {
        self.form.lock().clone()
    }

    /// Edit the form in place
    pub fn edit_form<R>(&self, edit: impl FnOnce(&mut FormState) -> R) -> R {
        edit(&mut self.form.lock())
    }

    pub fn session(&self) -> &AppState {
        &self.session
    }

    /// Whether a submit or unit switch is running
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cancel everything pending. Later calls fail with
    /// [`SendError::TornDown`].
    pub fn teardown(&self) {
        self.scope.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.scope.is_torn_down()
    }

    /// Run one send attempt to completion.
    ///
    /// Returns the transaction handed to the dispatcher.
    pub async fn submit(&self) -> Result<FinalizedTransaction, SendError> {
        if self.scope.is_torn_down() {
            return Err(SendError::TornDown);
        }
        let _in_flight = InFlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            warn!("Submit ignored: an attempt is already in progress");
            SendError::AttemptInProgress
        })?;

        if !self.form.lock().validate() {
            debug!("Submit rejected: draft is incomplete");
            return Err(SendError::InvalidDraft);
        }

        let attempt = self.scope.begin();
        info!("Send attempt {} started", attempt.id());

        let result = self.run_attempt(&attempt).await;
        match &result {
            Ok(tx) => info!(
                "Send attempt {} dispatched {} sats to {}",
                attempt.id(),
                tx.amount,
                tx.address
            ),
            Err(e) if e.is_cancellation() => info!("Send attempt {} {}", attempt.id(), e),
            Err(e) => warn!("Send attempt {} failed: {}", attempt.id(), e),
        }
        result
    }

    async fn run_attempt(&self, attempt: &AttemptScope) -> Result<FinalizedTransaction, SendError> {
        self.normalize(attempt).await?;

        let (request, tx) = self.prepare_confirmation()?;
        debug!("Attempt {}: confirming", attempt.id());
        let confirmed = attempt
            .run(
                Stage::Confirming,
                None,
                self.collaborators.prompts.confirm(attempt.id(), request),
            )
            .await??;
        if !confirmed {
            return Err(SendError::Cancelled(Stage::Confirming));
        }

        let session = self.session.snapshot();
        if tx.send_all && !session.sso {
            self.authorize(attempt).await?;
        } else {
            debug!("Attempt {}: authorization not required", attempt.id());
        }

        attempt.ensure_live(Stage::Dispatching)?;
        debug!("Attempt {}: dispatching", attempt.id());
        self.collaborators.dispatcher.show_loading(SENDING_FUNDS);
        self.collaborators.dispatcher.submit(tx.clone());
        self.form.lock().clear_draft();
        Ok(tx)
    }

    /// Rewrite a non-base amount as whole base units
    async fn normalize(&self, attempt: &AttemptScope) -> Result<(), SendError> {
        let (unit, amount) = {
            let form = self.form.lock();
            (form.unit(), form.draft().amount)
        };
        if unit.is_base_unit() || amount == 0.0 {
            debug!("Attempt {}: amount already in base units", attempt.id());
            return Ok(());
        }

        let fiat = self.session.snapshot().fiat_unit;
        debug!("Attempt {}: converting {} {} to sats", attempt.id(), amount, unit);
        let conversion = attempt
            .run(
                Stage::Normalizing,
                self.timeouts.conversion,
                self.collaborators
                    .converter
                    .convert(amount, unit, &fiat),
            )
            .await??;
        let base = whole_base_units(conversion.require(CurrencyUnit::Sats)?);
        if base == 0.0 {
            debug!("Attempt {}: amount is zero in base units", attempt.id());
            return Err(SendError::InvalidDraft);
        }

        self.form.lock().normalize_amount(base);
        Ok(())
    }

    /// Fix up the draft for sending and build the summary shown to the user
    fn prepare_confirmation(&self) -> Result<(ConfirmationRequest, FinalizedTransaction), SendError> {
        let session = self.session.snapshot();
        let mut form = self.form.lock();
        let sweep = form.sweep_all();
        form.draft_mut().send_all = sweep;

        let tx = form.draft().finalize().ok_or(SendError::InvalidDraft)?;
        Ok((confirmation_request(&tx, &session), tx))
    }

    async fn authorize(&self, attempt: &AttemptScope) -> Result<(), SendError> {
        debug!("Attempt {}: authorizing", attempt.id());
        let password = attempt
            .run(
                Stage::Authorizing,
                None,
                self.collaborators
                    .prompts
                    .password(attempt.id(), AuthorizationChallenge::login_password()),
            )
            .await??;
        let Some(password) = password else {
            return Err(SendError::Cancelled(Stage::Authorizing));
        };
        let hash = PasswordHash::from_password(&password);

        let decision = attempt
            .run(
                Stage::Authorizing,
                self.timeouts.authorization,
                self.collaborators.authorizer.check_password(&hash),
            )
            .await??;
        match decision {
            AuthDecision::Authorized => Ok(()),
            AuthDecision::Denied => Err(SendError::AuthorizationDenied),
        }
    }

    /// Switch the display unit, converting the shown amount.
    ///
    /// In sweep mode the sweep balance is converted instead. Returns the new
    /// displayed amount. If the lookup fails the form is left unchanged.
    pub async fn change_unit(&self, unit: CurrencyUnit) -> Result<f64, SendError> {
        if self.scope.is_torn_down() {
            return Err(SendError::TornDown);
        }
        let _in_flight =
            InFlightGuard::acquire(&self.in_flight).ok_or(SendError::AttemptInProgress)?;

        let (from, amount) = {
            let mut form = self.form.lock();
            if form.unit() == unit {
                return Ok(form.draft().amount);
            }
            if form.draft().amount == 0.0 {
                debug!("Switching to {} without conversion: amount is zero", unit);
                form.set_unit(unit);
                return Ok(0.0);
            }
            if form.sweep_all() {
                (CurrencyUnit::Sats, form.sweep_balance() as f64)
            } else {
                (form.unit(), form.draft().amount)
            }
        };

        let attempt = self.scope.begin();
        let fiat = self.session.snapshot().fiat_unit;
        debug!("Unit switch {}: {} {} -> {}", attempt.id(), amount, from, unit);
        let conversion = attempt
            .run(
                Stage::UnitSwitch,
                self.timeouts.conversion,
                self.collaborators.converter.convert(amount, from, &fiat),
            )
            .await??;
        let value = conversion.require(unit)?;
        let displayed = self
            .formats
            .redisplay(unit, value)
            .map_err(ConversionError::from)?;

        let mut form = self.form.lock();
        form.set_unit(unit);
        form.draft_mut().amount = displayed;
        Ok(displayed)
    }
}

/// Truncate a converted amount to whole base units.
///
/// Values within `BASE_UNIT_EPSILON` of an integer are taken as that integer
/// (0.29 BTC multiplies out to 28,999,999.999999996).
fn whole_base_units(sats: f64) -> f64 {
    if !sats.is_finite() || sats <= 0.0 {
        return 0.0;
    }
    let nearest = sats.round();
    if (sats - nearest).abs() < BASE_UNIT_EPSILON {
        nearest
    } else {
        sats.trunc()
    }
}

const BASE_UNIT_EPSILON: f64 = 1e-6;

/// Summary lines for a finalized send
pub fn confirmation_request(tx: &FinalizedTransaction, session: &SessionSnapshot) -> ConfirmationRequest {
    let mut request = ConfirmationRequest::new(CONFIRM_TITLE);
    request.push("Address", &tx.address);
    if tx.send_all {
        request.push("Sweep All", "True");
    } else {
        request.push(format!("Amount ({})", session.smaller_currency_unit), tx.amount);
    }
    match tx.fee {
        FeeMode::TargetBlocks(blocks) => request.push("Target Confirmation Blocks", blocks),
        FeeMode::FeeRate(rate) => request.push(
            format!("Fee ({}/Byte)", session.smaller_currency_unit),
            rate,
        ),
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(smaller: &str) -> SessionSnapshot {
        SessionSnapshot {
            smaller_currency_unit: smaller.to_string(),
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn test_request_for_regular_send() {
        let tx = FinalizedTransaction {
            address: "bc1qtest".to_string(),
            amount: 50_000,
            send_all: false,
            fee: FeeMode::TargetBlocks(6),
        };
        let request = confirmation_request(&tx, &session("Sats"));

        assert_eq!(request.title, CONFIRM_TITLE);
        assert_eq!(
            request.labels(),
            vec!["Address", "Amount (Sats)", "Target Confirmation Blocks"]
        );
        assert_eq!(request.field("Amount (Sats)"), Some("50000"));
        assert_eq!(request.field("Target Confirmation Blocks"), Some("6"));
    }

    #[test]
    fn test_request_for_sweep_with_fee_rate() {
        let tx = FinalizedTransaction {
            address: "bc1qsweep".to_string(),
            amount: 120_000,
            send_all: true,
            fee: FeeMode::FeeRate(15),
        };
        let request = confirmation_request(&tx, &session("sats"));

        assert_eq!(request.labels(), vec!["Address", "Sweep All", "Fee (sats/Byte)"]);
        assert_eq!(request.field("Sweep All"), Some("True"));
        assert_eq!(request.field("Fee (sats/Byte)"), Some("15"));
    }

    #[test]
    fn test_in_flight_guard() {
        let flag = AtomicBool::new(false);
        let guard = InFlightGuard::acquire(&flag).unwrap();
        assert!(InFlightGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_whole_base_units() {
        assert_eq!(whole_base_units(0.29 * 100_000_000.0), 29_000_000.0);
        assert_eq!(whole_base_units(28_999_999.999_999_996), 29_000_000.0);
        assert_eq!(whole_base_units(50_000.7), 50_000.0);
        assert_eq!(whole_base_units(0.4), 0.0);
        assert_eq!(whole_base_units(-3.0), 0.0);
        assert_eq!(whole_base_units(f64::NAN), 0.0);
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = StageTimeouts::default();
        assert_eq!(timeouts.conversion, Some(DEFAULT_STAGE_TIMEOUT));
        assert_eq!(timeouts.authorization, Some(DEFAULT_STAGE_TIMEOUT));
    }
}
