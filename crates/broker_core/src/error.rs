//! Error types for the broker's core state machine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("wire protocol error: {0}")]
    Protocol(#[from] broker_protocol::ProtocolError),

    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid argument: {0}")]
    InvalidArg(String),
}
