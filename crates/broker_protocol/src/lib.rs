//! Wire codec for the broker's client/worker protocol (`spec.md` §6).
//!
//! This crate owns frame parsing/serialization only. The transport (a
//! router-style socket that prepends sender identities) and the broker's
//! in-memory state machine live elsewhere — see `broker_core`.

pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod ids;
pub mod opts;
pub mod service;

pub use error::{ProtocolError, Result};
pub use fingerprint::Fingerprint;
pub use frame::{
    build_client_reply, build_worker_dispatch, build_worker_disconnect, build_worker_heartbeat,
    build_worker_heartbeat_relay, Inbound, Tag,
};
pub use ids::{Rid, WorkerId};
pub use opts::{ReplyOpts, RequestOpts, WorkerHeartbeatOpts};
pub use service::ServiceName;
