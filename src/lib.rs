//! Cluster-native ingress reverse proxy.
//!
//! Observes routing intent from a control plane (virtual hosts, path rules,
//! backend targets, TLS material) and serves live traffic according to the
//! latest observed intent, with no restart between a change and its effect.
//!
//! # Architecture Overview
//!
//! ```text
//!  control plane                        clients
//!       │                                 │
//!       ▼                                 ▼
//!  ┌───────────────┐   events    ┌─────────────────────────┐
//!  │ control_plane │────────────▶│  http (:80 redirect,    │
//!  │   (source)    │             │   :443 TLS + proxy)     │
//!  └──────┬────────┘             └───────────┬─────────────┘
//!         │ listings                         │ per request /
//!         ▼                                  │ per handshake
//!  ┌───────────────┐  coalesced  ┌───────────▼─────────────┐
//!  │     watch     │  rebuilds   │        routing          │
//!  │ (debounce +   │────────────▶│  (atomic snapshot swap) │
//!  │  rebuild)     │   replace   └───────────▲─────────────┘
//!  └──────┬────────┘                         │ certificates
//!         │ build                            │
//!         ▼                            ┌─────┴─────┐
//!  ┌───────────────┐                   │    net    │
//!  │   snapshot    │                   │ (SNI cert │
//!  │  (immutable)  │                   │ resolver) │
//!  └───────────────┘                   └───────────┘
//! ```

// Core subsystems
pub mod config;
pub mod control_plane;
pub mod http;
pub mod net;
pub mod routing;
pub mod snapshot;
pub mod watch;

// Cross-cutting concerns
pub mod lifecycle;

pub use config::ProxyConfig;
pub use http::Server;
pub use lifecycle::Shutdown;
pub use routing::RoutingTable;
pub use watch::Watcher;
