//! Broker core library: registries, dispatcher, request lifecycle, and the
//! synchronous `zmq::ROUTER` event loop (`spec.md` §3-§5).

pub mod broker;
pub mod cache;
pub mod clock;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod registry;
pub mod request;

pub use broker::Broker;
pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use metrics::METRICS;

/// CLI arguments for the broker binary.
#[derive(clap::Parser, Debug)]
#[command(name = "broker", about = "Generic named-service request broker")]
pub struct BrokerArgs {
    /// ZMQ bind address for the client/worker ROUTER socket.
    #[arg(long, default_value_t = broker_protocol::defaults::DEFAULT_BIND_ADDR.to_string())]
    pub bind: String,

    /// Heartbeat tick period, in milliseconds.
    #[arg(long, default_value_t = broker_protocol::defaults::DEFAULT_HEARTBEAT_MS)]
    pub heartbeat_ms: u64,

    /// Worker-selection mode: `load` or `rand`.
    #[arg(long, default_value = "load")]
    pub dmode: String,

    /// Retry ceiling after worker rejects.
    #[arg(long, default_value_t = broker_protocol::defaults::DEFAULT_RATTEMPTS)]
    pub rattempts: u32,

    /// Enable the response cache and request fingerprinting.
    #[arg(long)]
    pub cache: bool,

    /// Bind address for the optional control/introspection socket.
    #[arg(long)]
    pub control_addr: Option<String>,
}

impl BrokerArgs {
    pub fn into_config(self) -> Result<BrokerConfig> {
        let dmode = self
            .dmode
            .parse()
            .map_err(BrokerError::InvalidArg)?;
        Ok(BrokerConfig {
            bind_addr: self.bind,
            heartbeat_ms: self.heartbeat_ms,
            dmode,
            rattempts: self.rattempts,
            cache_enabled: self.cache,
            control_addr: self.control_addr,
        })
    }
}
