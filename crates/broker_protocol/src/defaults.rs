//! Canonical default values shared between the broker and its wire codec.

/// Default request timeout, in milliseconds (`spec.md` §4.1, §6).
pub const DEFAULT_REQUEST_TIMEOUT_MS: i64 = 60_000;

/// Default heartbeat tick period, in milliseconds (`spec.md` §4.7, §6).
pub const DEFAULT_HEARTBEAT_MS: u64 = 2_500;

/// Default retry ceiling after worker rejects (`spec.md` §4.4, §6).
pub const DEFAULT_RATTEMPTS: u32 = 5;

/// Default per-worker concurrency limit (`spec.md` §3).
pub const DEFAULT_CONCURRENCY: i64 = 100;

/// Sentinel value meaning "unbounded concurrency" (`spec.md` §3).
pub const UNBOUNDED_CONCURRENCY: i64 = -1;

/// Liveness counter a worker starts and resets to on any inbound frame (`spec.md` §3, §4.7).
pub const INITIAL_LIVENESS: i8 = 3;

/// Default ZMQ bind address for the broker's ROUTER socket.
pub const DEFAULT_BIND_ADDR: &str = "tcp://127.0.0.1:5555";

/// Client protocol tag, as it appears on the wire (`spec.md` §6).
pub const CLIENT_TAG: &[u8] = b"MDPC01";

/// Worker protocol tag, as it appears on the wire (`spec.md` §6).
pub const WORKER_TAG: &[u8] = b"MDPW01";
