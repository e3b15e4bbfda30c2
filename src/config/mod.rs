//! Runtime configuration.
//!
//! # Responsibilities
//! - Define listener addresses and rebuild scheduling knobs
//! - Provide sensible defaults for in-cluster deployment
//!
//! # Design Decisions
//! - Routing intent is NOT configured here; it is observed live from the
//!   control plane. This schema covers process-level settings only.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the ingress proxy process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Plaintext listener address. Every request here is redirected to https.
    pub http_addr: SocketAddr,

    /// TLS listener address serving proxied traffic.
    pub https_addr: SocketAddr,

    /// Change-coalescing settings for the rebuild pipeline.
    pub coalesce: CoalesceConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:80".parse().expect("static address"),
            https_addr: "0.0.0.0:443".parse().expect("static address"),
            coalesce: CoalesceConfig::default(),
        }
    }
}

/// Settings for collapsing bursts of control-plane change events.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Quiet period in milliseconds. A rebuild fires only after no change
    /// event has arrived for this long.
    pub quiet_period_ms: u64,
}

impl CoalesceConfig {
    /// Quiet period as a [`Duration`].
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self { quiet_period_ms: 1000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_standard_ports() {
        let config = ProxyConfig::default();
        assert_eq!(config.http_addr.port(), 80);
        assert_eq!(config.https_addr.port(), 443);
        assert_eq!(config.coalesce.quiet_period(), Duration::from_secs(1));
    }
}
