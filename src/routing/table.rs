//! The process-wide routing table.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::snapshot::Snapshot;

/// Holds the currently published snapshot and the one it replaced.
///
/// `current` is read by every inbound connection; `replace` is called by the
/// single rebuild producer. Both are safe under unbounded concurrency.
#[derive(Default)]
pub struct RoutingTable {
    current: ArcSwap<Snapshot>,
    previous: ArcSwapOption<Snapshot>,
}

impl RoutingTable {
    /// An empty table; the process starts here until the first rebuild.
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently installed snapshot. Cheap: one atomic load, no copy.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// The snapshot the last `replace` displaced, if any.
    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        self.previous.load_full()
    }

    /// Atomically install a new snapshot.
    pub fn replace(&self, next: Snapshot) {
        let displaced = self.current.swap(Arc::new(next));
        self.previous.store(Some(displaced));
    }
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("hosts", &self.current.load().len())
            .finish()
    }
}
