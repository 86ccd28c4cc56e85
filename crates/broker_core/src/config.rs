//! Broker configuration (`spec.md` §6 "Configuration options").

use broker_protocol::defaults::{DEFAULT_BIND_ADDR, DEFAULT_HEARTBEAT_MS, DEFAULT_RATTEMPTS};

use crate::dispatcher::WorkerSelectMode;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// ZMQ bind address for the client/worker ROUTER socket.
    pub bind_addr: String,
    /// Heartbeat tick period, in milliseconds. Default 2500.
    pub heartbeat_ms: u64,
    /// Default worker-selection mode. Default `load`.
    pub dmode: WorkerSelectMode,
    /// Retry ceiling after worker rejects. Default 5.
    pub rattempts: u32,
    /// Enables the response cache and request fingerprinting. Default off.
    pub cache_enabled: bool,
    /// Optional bind address for the control/introspection socket
    /// (`SPEC_FULL.md` §6 supplement). `None` disables it.
    pub control_addr: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            dmode: WorkerSelectMode::Load,
            rattempts: DEFAULT_RATTEMPTS,
            cache_enabled: false,
            control_addr: None,
        }
    }
}
