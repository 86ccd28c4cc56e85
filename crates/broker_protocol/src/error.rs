//! Error types for the wire codec.

use thiserror::Error;

/// Codec operation result type.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or building wire frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("expected at least {expected} frames, got {got}")]
    TooFewFrames { expected: usize, got: usize },

    #[error("unknown protocol tag {0:?}")]
    UnknownTag(Vec<u8>),

    #[error("unknown command {0:?} for tag {1:?}")]
    UnknownCommand(Vec<u8>, &'static str),

    #[error("empty service name on READY")]
    EmptyServiceOnReady,

    #[error("invalid opts JSON: {0}")]
    Opts(#[from] serde_json::Error),
}
