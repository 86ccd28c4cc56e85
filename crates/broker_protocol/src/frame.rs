//! Multi-part wire frames (`spec.md` §6).
//!
//! A frame here is everything the transport hands us *after* it has
//! stripped the sender identity — the frame channel prepends/consumes
//! that envelope frame itself (`spec.md` §1 "opaque frame channel").
//! `Inbound::parse` classifies a received frame; the `build_*` functions
//! construct frames to send. Both directions share the same
//! tag/command vocabulary, `parse` and `build_*` being the two faces of
//! one wire format.

use crate::defaults::{CLIENT_TAG, WORKER_TAG};
use crate::error::{ProtocolError, Result};
use crate::ids::Rid;
use crate::opts::{ReplyOpts, RequestOpts};
use crate::service::ServiceName;

/// Protocol tag: which side's grammar a frame follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Client,
    Worker,
}

impl Tag {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Tag::Client => CLIENT_TAG,
            Tag::Worker => WORKER_TAG,
        }
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        match bytes {
            b if b == CLIENT_TAG => Ok(Tag::Client),
            b if b == WORKER_TAG => Ok(Tag::Worker),
            other => Err(ProtocolError::UnknownTag(other.to_vec())),
        }
    }
}

/// Command bytes, shared across both tags (`spec.md` §6).
mod command {
    pub const READY: &[u8] = b"READY";
    pub const REQUEST: &[u8] = b"REQUEST";
    pub const REPLY: &[u8] = b"REPLY";
    pub const REPLY_PARTIAL: &[u8] = b"REPLY_PARTIAL";
    pub const REPLY_REJECT: &[u8] = b"REPLY_REJECT";
    pub const DISCONNECT: &[u8] = b"DISCONNECT";
    pub const HEARTBEAT: &[u8] = b"HEARTBEAT";
}

/// A classified inbound frame, ready for the protocol handler to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `spec.md` §4.1 Client -> `W_REQUEST`.
    ClientRequest {
        service: ServiceName,
        rid: Rid,
        payload: Vec<u8>,
        opts: RequestOpts,
    },
    /// `spec.md` §4.1 Client -> `W_HEARTBEAT` (with a rid).
    ClientHeartbeat { rid: Rid },
    /// `spec.md` §4.1 Worker -> `W_READY`.
    WorkerReady { service: ServiceName },
    /// `spec.md` §4.1 Worker -> `W_REPLY` / `W_REPLY_PARTIAL`.
    WorkerReply {
        client_id: Vec<u8>,
        rid: Rid,
        payload: Vec<u8>,
        opts: ReplyOpts,
        partial: bool,
    },
    /// `spec.md` §4.1 Worker -> `W_REPLY_REJECT`.
    WorkerReject { client_id: Vec<u8>, rid: Rid },
    /// `spec.md` §4.1 Worker -> `W_HEARTBEAT`.
    WorkerHeartbeat { opts_json: Vec<u8> },
    /// `spec.md` §4.1 Worker -> `W_DISCONNECT`.
    WorkerDisconnect,
}

impl Inbound {
    /// The tag this frame was sent under, independent of parse success —
    /// used by the protocol handler to enforce "workers must handshake
    /// before interacting" even for malformed worker frames.
    pub fn tag(frames: &[Vec<u8>]) -> Result<Tag> {
        let first = frames
            .first()
            .ok_or(ProtocolError::TooFewFrames { expected: 2, got: frames.len() })?;
        Tag::parse(first)
    }

    pub fn parse(frames: &[Vec<u8>]) -> Result<Self> {
        if frames.len() < 2 {
            return Err(ProtocolError::TooFewFrames {
                expected: 2,
                got: frames.len(),
            });
        }
        let tag = Tag::parse(&frames[0])?;
        let cmd = frames[1].as_slice();
        let rest = &frames[2..];

        match tag {
            Tag::Client => Self::parse_client(cmd, rest),
            Tag::Worker => Self::parse_worker(cmd, rest),
        }
    }

    fn parse_client(cmd: &[u8], rest: &[Vec<u8>]) -> Result<Self> {
        match cmd {
            command::REQUEST => {
                if rest.len() < 3 {
                    return Err(ProtocolError::TooFewFrames {
                        expected: 5,
                        got: rest.len() + 2,
                    });
                }
                let service = ServiceName::from(String::from_utf8_lossy(&rest[0]).into_owned());
                let rid = Rid::new(rest[1].clone());
                let payload = rest[2].clone();
                let opts = rest.get(3).map(|b| RequestOpts::parse(b)).unwrap_or_default();
                Ok(Inbound::ClientRequest {
                    service,
                    rid,
                    payload,
                    opts,
                })
            }
            command::HEARTBEAT => {
                let rid = rest
                    .first()
                    .ok_or(ProtocolError::TooFewFrames { expected: 3, got: 2 })?;
                Ok(Inbound::ClientHeartbeat {
                    rid: Rid::new(rid.clone()),
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_vec(), "CLIENT")),
        }
    }

    fn parse_worker(cmd: &[u8], rest: &[Vec<u8>]) -> Result<Self> {
        match cmd {
            command::READY => {
                let service_bytes = rest.first().map(|v| v.as_slice()).unwrap_or(&[]);
                if service_bytes.is_empty() {
                    return Err(ProtocolError::EmptyServiceOnReady);
                }
                Ok(Inbound::WorkerReady {
                    service: ServiceName::from(String::from_utf8_lossy(service_bytes).into_owned()),
                })
            }
            command::REPLY | command::REPLY_PARTIAL => {
                if rest.len() < 3 {
                    return Err(ProtocolError::TooFewFrames {
                        expected: 5,
                        got: rest.len() + 2,
                    });
                }
                let client_id = rest[0].clone();
                // rest[1] is the empty delimiter frame.
                let rid = Rid::new(rest[2].clone());
                let payload = rest.get(3).cloned().unwrap_or_default();
                let opts = rest.get(4).map(|b| ReplyOpts::parse(b)).unwrap_or_default();
                Ok(Inbound::WorkerReply {
                    client_id,
                    rid,
                    payload,
                    opts,
                    partial: cmd == command::REPLY_PARTIAL,
                })
            }
            command::REPLY_REJECT => {
                if rest.len() < 3 {
                    return Err(ProtocolError::TooFewFrames {
                        expected: 5,
                        got: rest.len() + 2,
                    });
                }
                let client_id = rest[0].clone();
                let rid = Rid::new(rest[2].clone());
                Ok(Inbound::WorkerReject { client_id, rid })
            }
            command::HEARTBEAT => Ok(Inbound::WorkerHeartbeat {
                opts_json: rest.first().cloned().unwrap_or_default(),
            }),
            command::DISCONNECT => Ok(Inbound::WorkerDisconnect),
            other => Err(ProtocolError::UnknownCommand(other.to_vec(), "WORKER")),
        }
    }
}

/// `spec.md` §6 "Broker -> Client reply": `[CLIENT, W_REPLY|W_REPLY_PARTIAL, "", rid, reply_payload]`.
pub fn build_client_reply(rid: &Rid, payload: &[u8], partial: bool) -> Vec<Vec<u8>> {
    vec![
        Tag::Client.as_bytes().to_vec(),
        if partial {
            command::REPLY_PARTIAL.to_vec()
        } else {
            command::REPLY.to_vec()
        },
        Vec::new(),
        rid.as_bytes().to_vec(),
        payload.to_vec(),
    ]
}

/// `spec.md` §4.5 "Send `[workerId, WORKER, W_REQUEST, clientId, service, "", ...originalPayload]`"
/// (the `workerId` routing frame is prepended by the caller, not by this builder).
pub fn build_worker_dispatch(
    client_id: &[u8],
    service: &ServiceName,
    payload: &[u8],
    opts_json: &[u8],
) -> Vec<Vec<u8>> {
    vec![
        Tag::Worker.as_bytes().to_vec(),
        command::REQUEST.to_vec(),
        client_id.to_vec(),
        service.as_str().as_bytes().to_vec(),
        Vec::new(),
        payload.to_vec(),
        opts_json.to_vec(),
    ]
}

/// `spec.md` §4.7 heartbeat tick: `[workerId, WORKER, W_HEARTBEAT]`.
pub fn build_worker_heartbeat() -> Vec<Vec<u8>> {
    vec![Tag::Worker.as_bytes().to_vec(), command::HEARTBEAT.to_vec()]
}

/// `spec.md` §4.1: a client `W_HEARTBEAT` relayed to the worker currently
/// assigned the rid, carrying the original client identity.
pub fn build_worker_heartbeat_relay(client_id: &[u8], rid: &Rid) -> Vec<Vec<u8>> {
    vec![
        Tag::Worker.as_bytes().to_vec(),
        command::HEARTBEAT.to_vec(),
        client_id.to_vec(),
        rid.as_bytes().to_vec(),
    ]
}

/// `spec.md` §4.1/§4.7: `[workerId, WORKER, W_DISCONNECT]`.
pub fn build_worker_disconnect() -> Vec<Vec<u8>> {
    vec![Tag::Worker.as_bytes().to_vec(), command::DISCONNECT.to_vec()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(parts: &[&[u8]]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.to_vec()).collect()
    }

    #[test]
    fn parses_client_request() {
        let parsed = Inbound::parse(&frames(&[
            CLIENT_TAG,
            b"REQUEST",
            b"echo",
            b"1",
            b"hi",
            b"{}",
        ]))
        .unwrap();
        match parsed {
            Inbound::ClientRequest {
                service,
                rid,
                payload,
                ..
            } => {
                assert_eq!(service.as_str(), "echo");
                assert_eq!(rid.as_bytes(), b"1");
                assert_eq!(payload, b"hi");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parses_worker_ready() {
        let parsed = Inbound::parse(&frames(&[WORKER_TAG, b"READY", b"echo"])).unwrap();
        assert_eq!(
            parsed,
            Inbound::WorkerReady {
                service: ServiceName::from("echo")
            }
        );
    }

    #[test]
    fn empty_service_on_ready_is_rejected() {
        let err = Inbound::parse(&frames(&[WORKER_TAG, b"READY", b""])).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyServiceOnReady));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = Inbound::parse(&frames(&[b"NOPE", b"READY"])).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(_)));
    }

    #[test]
    fn round_trips_client_reply() {
        let rid = Rid::from("42");
        let built = build_client_reply(&rid, b"result", false);
        assert_eq!(built[0], CLIENT_TAG);
        assert_eq!(built[1], b"REPLY");
        assert_eq!(built[3], b"42");
        assert_eq!(built[4], b"result");
    }
}
