//! Workflow Lifecycle
//!
//! Every suspension in the send workflow (conversion lookups, prompts, the
//! authorization check) runs inside a scope owned by the workflow. Tearing
//! the workflow down cancels all of them at once, and a cancelled scope never
//! delivers a result.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Stage of a send attempt, or the unit-switch conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Normalizing,
    Confirming,
    Authorizing,
    Dispatching,
    UnitSwitch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalizing => "normalization",
            Stage::Confirming => "confirmation",
            Stage::Authorizing => "authorization",
            Stage::Dispatching => "dispatch",
            Stage::UnitSwitch => "unit switch",
        };
        f.write_str(name)
    }
}

/// Identifies one attempt (or one unit switch) for prompt correlation and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a scoped future did not produce its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    Cancelled,
    TimedOut(Stage),
}

/// The owning scope of one workflow instance
#[derive(Debug)]
pub struct WorkflowScope {
    root: CancellationToken,
    torn_down: AtomicBool,
    next_id: AtomicU64,
}

impl Default for WorkflowScope {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowScope {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a child scope for one attempt or conversation.
    ///
    /// After teardown the returned scope is already cancelled.
    pub fn begin(&self) -> AttemptScope {
        let id = AttemptId(self.next_id.fetch_add(1, Ordering::SeqCst));
        AttemptScope {
            id,
            token: self.root.child_token(),
        }
    }

    /// Cancel every pending conversation. Safe to call any number of times.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Tearing down send workflow");
        self.root.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

/// A child scope, cancelled on teardown or when dropped
#[derive(Debug)]
pub struct AttemptScope {
    id: AttemptId,
    token: CancellationToken,
}

impl AttemptScope {
    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail if the scope was cancelled before `stage` could start
    pub fn ensure_live(&self, stage: Stage) -> Result<(), ScopeError> {
        if self.token.is_cancelled() {
            debug!("Attempt {} cancelled before {}", self.id, stage);
            Err(ScopeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Await `fut` unless the scope is cancelled first or `limit` elapses
    pub async fn run<F>(
        &self,
        stage: Stage,
        limit: Option<Duration>,
        fut: F,
    ) -> Result<F::Output, ScopeError>
    where
        F: Future,
    {
        self.ensure_live(stage)?;

        let bounded = async {
            match limit {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| ScopeError::TimedOut(stage)),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("Attempt {} cancelled during {}", self.id, stage);
                Err(ScopeError::Cancelled)
            }
            result = bounded => result,
        }
    }
}

impl Drop for AttemptScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
