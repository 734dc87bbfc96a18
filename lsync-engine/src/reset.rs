//! Cooperative cancellation token raised from the signal boundary.
//!
//! Raising the flag is one atomic store plus a wake-up; everything that
//! reacts to it (dropping watches, rescanning) runs in the engine task when it
//! next polls the flag.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

const CLEAR: u8 = 0;
const RESTART: u8 = 1;
const SHUTDOWN: u8 = 2;

/// Why the engine should stop what it is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Tear down the watch tree and build it again.
    Restart,
    /// Stop the daemon.
    Shutdown,
}

impl ResetReason {
    fn code(self) -> u8 {
        match self {
            ResetReason::Restart => RESTART,
            ResetReason::Shutdown => SHUTDOWN,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            RESTART => Some(ResetReason::Restart),
            SHUTDOWN => Some(ResetReason::Shutdown),
            _ => None,
        }
    }
}

/// Shared reset flag. Clones observe the same state.
///
/// `Shutdown` dominates `Restart` when both are raised before the flag is taken.
#[derive(Debug, Clone, Default)]
pub struct ResetFlag {
    state: Arc<AtomicU8>,
    wake: Arc<Notify>,
}

impl ResetFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, reason: ResetReason) {
        self.state.fetch_max(reason.code(), Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Non-blocking check used by scans between steps.
    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::SeqCst) != CLEAR
    }

    pub fn reason(&self) -> Option<ResetReason> {
        ResetReason::from_code(self.state.load(Ordering::SeqCst))
    }

    /// Read and clear in one step.
    pub fn take(&self) -> Option<ResetReason> {
        ResetReason::from_code(self.state.swap(CLEAR, Ordering::SeqCst))
    }

    pub fn clear(&self) {
        self.state.store(CLEAR, Ordering::SeqCst);
    }

    /// Resolve once the flag is raised.
    pub async fn raised(&self) -> ResetReason {
        loop {
            if let Some(reason) = self.reason() {
                return reason;
            }
            self.wake.notified().await;
        }
    }
}
