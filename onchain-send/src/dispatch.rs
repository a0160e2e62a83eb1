//! Dispatch Boundary
//!
//! Where a confirmed send leaves the workflow. Both calls are fire-and-forget:
//! the workflow does not wait for the node, and the outcome is reported as a
//! [`Notification`] to whoever is listening.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::draft::FinalizedTransaction;
use crate::rpc::NodeRpc;

/// Status message shown while a send is being submitted
pub const SENDING_FUNDS: &str = "Sending Funds...";

/// Accepts finalized transactions
pub trait Dispatcher: Send + Sync {
    /// Show a spinner with `message`
    fn show_loading(&self, message: &str);

    /// Hand off the transaction for submission
    fn submit(&self, tx: FinalizedTransaction);
}

/// What happened to a dispatched send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Loading(String),
    Sent { txid: String },
    Failed(String),
}

/// Submits over JSON-RPC on a background task
pub struct RpcDispatcher {
    rpc: Arc<NodeRpc>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl RpcDispatcher {
    /// Create a dispatcher and the receiver its notifications arrive on
    pub fn new(rpc: Arc<NodeRpc>) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (notifications, receiver) = mpsc::unbounded_channel();
        (Self { rpc, notifications }, receiver)
    }
}

impl Dispatcher for RpcDispatcher {
    fn show_loading(&self, message: &str) {
        let _ = self
            .notifications
            .send(Notification::Loading(message.to_string()));
    }

    fn submit(&self, tx: FinalizedTransaction) {
        let rpc = self.rpc.clone();
        let notifications = self.notifications.clone();

        tokio::spawn(async move {
            let notification = match rpc.send_coins(&tx).await {
                Ok(txid) => {
                    info!("Sent {} sats to {}: {}", tx.amount, tx.address, txid);
                    Notification::Sent { txid }
                }
                Err(e) => {
                    error!("Failed to send to {}: {}", tx.address, e);
                    Notification::Failed(e.to_string())
                }
            };
            let _ = notifications.send(notification);
        });
    }
}
