//! Trailing-debounce scheduling for rebuild triggers.
//!
//! # Responsibilities
//! - Collapse a burst of change notifications into one trigger
//! - Re-arm the quiet window on every notification
//!
//! # Design Decisions
//! - Pure scheduling, no domain knowledge: input is `notify()`, output is a
//!   channel message
//! - Cannot fail, only delay; dropping every handle shuts the task down

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

/// Cheap, cloneable notification entry point.
///
/// May be called from any number of tasks at unbounded rate.
#[derive(Clone)]
pub struct CoalescerHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl CoalescerHandle {
    /// Record one change. The rebuild trigger fires once the quiet period
    /// elapses with no further calls.
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }
}

/// Spawns the debounce task.
pub struct ChangeCoalescer;

impl ChangeCoalescer {
    /// Start coalescing with the given quiet period.
    ///
    /// Returns the notification handle and the trigger stream: exactly one
    /// message per burst.
    pub fn spawn(quiet: Duration) -> (CoalescerHandle, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        tokio::spawn(run(quiet, rx, trigger_tx));
        (CoalescerHandle { tx }, trigger_rx)
    }
}

async fn run(quiet: Duration, mut rx: mpsc::UnboundedReceiver<()>, trigger: mpsc::Sender<()>) {
    while rx.recv().await.is_some() {
        loop {
            match timeout(quiet, rx.recv()).await {
                // Another notification inside the window: re-arm.
                Ok(Some(())) => continue,
                // Every handle dropped.
                Ok(None) => return,
                // Quiet period elapsed.
                Err(_) => break,
            }
        }
        if trigger.send(()).await.is_err() {
            return;
        }
    }
}
