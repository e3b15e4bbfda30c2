//! Watch-and-rebuild pipeline.
//!
//! # Data Flow
//! ```text
//! ControlPlaneSource events (routes, services, secrets)
//!     → one subscription task per kind → CoalescerHandle::notify()
//!     → ChangeCoalescer (quiet period)
//!     → rebuild loop: SnapshotBuilder::build() → RoutingTable::replace()
//! ```
//!
//! # Design Decisions
//! - Subscriptions never inspect payloads or diff state; every event is the
//!   same "something changed" signal
//! - There is exactly one rebuild producer, so the table only ever moves
//!   from one complete snapshot to a newer complete snapshot
//! - A failed rebuild leaves the previous snapshot published; the next
//!   change event retries

pub mod coalescer;

pub use coalescer::{ChangeCoalescer, CoalescerHandle};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::control_plane::{ChangeEvent, ControlPlaneSource, ResourceKind};
use crate::routing::RoutingTable;
use crate::snapshot::SnapshotBuilder;

/// Errors terminating the watch pipeline.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The control-plane source dropped its event channels. There is no way
    /// to observe further changes, so the process should come down.
    #[error("control-plane subscription closed")]
    SubscriptionClosed,
}

/// Owns the subscription loops and the rebuild loop.
pub struct Watcher<S> {
    source: Arc<S>,
    table: Arc<RoutingTable>,
    quiet: Duration,
}

impl<S: ControlPlaneSource> Watcher<S> {
    pub fn new(source: Arc<S>, table: Arc<RoutingTable>, quiet: Duration) -> Self {
        Self {
            source,
            table,
            quiet,
        }
    }

    /// Run the pipeline until shutdown.
    ///
    /// Blocks for the lifetime of the process; the first snapshot is built
    /// one quiet period after startup even if no change arrives.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), WatchError> {
        let (handle, mut triggers) = ChangeCoalescer::spawn(self.quiet);
        let builder = SnapshotBuilder::new(Arc::clone(&self.source));

        for kind in [ResourceKind::Route, ResourceKind::Service, ResourceKind::Secret] {
            tokio::spawn(subscription_loop(
                kind,
                self.source.events(kind),
                handle.clone(),
                shutdown.resubscribe(),
            ));
        }

        // Initial sync: populate the table without waiting for a change.
        handle.notify();
        drop(handle);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("watch pipeline stopping");
                    return Ok(());
                }
                trigger = triggers.recv() => match trigger {
                    Some(()) => self.rebuild(&builder),
                    None => return Err(WatchError::SubscriptionClosed),
                }
            }
        }
    }

    fn rebuild(&self, builder: &SnapshotBuilder<S>) {
        let rebuild_id = Uuid::new_v4();
        match builder.build(rebuild_id) {
            Ok(snapshot) => {
                tracing::info!(
                    rebuild_id = %rebuild_id,
                    hosts = snapshot.len(),
                    "publishing routing snapshot"
                );
                self.table.replace(snapshot);
            }
            Err(err) => {
                tracing::error!(
                    rebuild_id = %rebuild_id,
                    error = %err,
                    "rebuild failed, previous snapshot stays live"
                );
            }
        }
    }
}

/// Forward every event of one resource kind into the coalescer.
async fn subscription_loop(
    kind: ResourceKind,
    mut events: broadcast::Receiver<ChangeEvent>,
    handle: CoalescerHandle,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => return,
            event = events.recv() => match event {
                Ok(event) => {
                    tracing::debug!(kind = ?kind, op = ?event.op, "control-plane change");
                    handle.notify();
                }
                // Missed events still mean "something changed"; the rebuild
                // re-lists everything anyway.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(kind = ?kind, missed, "event subscription lagged");
                    handle.notify();
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
