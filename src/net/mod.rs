//! Network-facing TLS plumbing.

pub mod tls;

pub use tls::{server_config, SnapshotCertResolver};
