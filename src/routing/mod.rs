//! Routing table publication.
//!
//! # Data Flow
//! ```text
//! Rebuild pipeline:
//!     SnapshotBuilder::build() → RoutingTable::replace(snapshot)
//!
//! Serving path (per request / per handshake):
//!     RoutingTable::current() → one Arc<Snapshot> held for the
//!     request's whole lifetime
//! ```
//!
//! # Design Decisions
//! - Lock-free atomic pointer swap: readers never block, and a reader can
//!   never observe a half-replaced table
//! - Whole-snapshot replacement only; there is no partial mutation API

pub mod table;

pub use table::RoutingTable;
