//! Control/introspection socket (`SPEC_FULL.md` §6 supplement).
//!
//! A second, optional `zmq::REP` socket answering simple JSON requests
//! about live broker state. Gated behind [`crate::config::BrokerConfig`]'s
//! `control_addr`; disabled by default. This never touches the
//! client/worker wire grammar — it exists purely for operators.

use serde::{Deserialize, Serialize};

use broker_protocol::ServiceName;

use crate::error::Result;
use crate::registry::{ServiceRegistry, WorkerRegistry};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Ping,
    QueueStats { service: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Pong { pong: bool },
    QueueStats {
        service: String,
        queued: usize,
        workers: usize,
    },
    Error {
        error: String,
    },
}

/// Binds (or doesn't) the control socket per `config.control_addr`.
pub struct ControlSocket {
    socket: zmq::Socket,
}

impl ControlSocket {
    pub fn bind(ctx: &zmq::Context, addr: &str) -> Result<Self> {
        let socket = ctx.socket(zmq::REP)?;
        socket.bind(addr)?;
        socket.set_rcvtimeo(0)?;
        Ok(Self { socket })
    }

    /// Poll once, non-blocking. Returns `true` if a request was answered.
    pub fn poll_once(&self, services: &ServiceRegistry, workers: &WorkerRegistry) -> bool {
        let raw = match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let response = match serde_json::from_slice::<ControlRequest>(&raw) {
            Ok(ControlRequest::Ping) => ControlResponse::Pong { pong: true },
            Ok(ControlRequest::QueueStats { service }) => {
                let name = ServiceName::new(service.clone());
                ControlResponse::QueueStats {
                    service,
                    queued: services.queue_len(&name),
                    workers: services.workers_of(&name).len(),
                }
            }
            Err(e) => ControlResponse::Error {
                error: e.to_string(),
            },
        };
        let bytes = serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec());
        let _ = self.socket.send(bytes, 0);
        true
    }
}
