//! Send and sweep command

use anyhow::Result;
use std::sync::Arc;

use onchain_send::{
    auth::{AuthorizationBackend, StaticHashAuthorizer},
    config::SendConfig,
    conversion::{CachedRateConverter, TickerRateSource},
    dispatch::{Notification, RpcDispatcher},
    error::SendError,
    form::FormState,
    prompt::TerminalPrompts,
    rpc::NodeRpc,
    session::AppState,
    units::CurrencyUnit,
    workflow::{Collaborators, SendWorkflow},
};

use super::{print_error, print_success, print_warning};

/// Exit status after Ctrl-C
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What the user asked to send
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub address: String,
    pub amount: Option<f64>,
    pub unit: CurrencyUnit,
    pub target_blocks: Option<u32>,
    pub fee_rate: Option<u64>,
    /// Sweepable balance in sats; `Some` selects sweep mode
    pub sweep_balance: Option<u64>,
    pub skip_confirm: bool,
}

impl SendRequest {
    fn to_form(&self) -> FormState {
        let mut form = match self.sweep_balance {
            Some(balance) => FormState::sweep(balance),
            None => {
                let mut form = FormState::new();
                form.set_unit(self.unit);
                form.set_amount(self.amount.unwrap_or_default());
                form
            }
        };
        form.set_address(self.address.as_str());
        if let Some(blocks) = self.target_blocks {
            form.set_target_blocks(blocks);
        }
        if let Some(rate) = self.fee_rate {
            form.set_fee_rate(rate);
        }
        form
    }
}

/// Run the send command
pub async fn run(config: &SendConfig, request: SendRequest) -> Result<()> {
    let rpc = Arc::new(NodeRpc::new(&config.node.rpc_endpoints)?);

    let authorizer: Arc<dyn AuthorizationBackend> = match config.password_hash()? {
        Some(hash) => Arc::new(StaticHashAuthorizer::new(hash)),
        None => rpc.clone(),
    };
    let converter = CachedRateConverter::with_ttl(
        TickerRateSource::new(&config.conversion.ticker_url)?,
        config.cache_ttl(),
    );
    let (dispatcher, mut notifications) = RpcDispatcher::new(rpc.clone());

    let collaborators = Collaborators {
        converter: Arc::new(converter),
        prompts: Arc::new(TerminalPrompts::new(request.skip_confirm)),
        authorizer,
        dispatcher: Arc::new(dispatcher),
    };
    let workflow = SendWorkflow::new(
        request.to_form(),
        AppState::new(config.session_snapshot()),
        collaborators,
    )
    .with_timeouts(config.stage_timeouts())
    .with_formats(config.conversion.formats.clone());

    let submit = workflow.submit();
    tokio::pin!(submit);
    let mut interrupted = false;
    let result = tokio::select! {
        result = &mut submit => result,
        _ = tokio::signal::ctrl_c() => {
            interrupted = true;
            workflow.teardown();
            submit.await
        }
    };

    match result {
        Ok(tx) => {
            println!("Submitting to {}...", rpc.primary_endpoint());
            while let Some(notification) = notifications.recv().await {
                match notification {
                    Notification::Loading(message) => println!("{}", message),
                    Notification::Sent { txid } => {
                        print_success(&format!("Sent {} sats to {}", tx.amount, tx.address));
                        println!("Transaction ID: {}", txid);
                        break;
                    }
                    Notification::Failed(error) => {
                        print_error(&format!("Node rejected the transaction: {}", error));
                        break;
                    }
                }
            }
        }
        Err(SendError::TornDown) if interrupted => {
            print_warning("Interrupted. Nothing was sent.");
            // A terminal prompt may still be blocked on stdin
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        Err(e) if e.is_cancellation() => {
            println!("Transaction cancelled.");
        }
        Err(SendError::InvalidDraft) => {
            print_error("Address, a positive amount and a fee (--target-blocks or --fee-rate) are required.");
        }
        Err(e) => {
            print_error(&e.to_string());
        }
    }

    Ok(())
}
