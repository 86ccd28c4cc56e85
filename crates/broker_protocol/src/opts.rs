//! Typed views over the `opts_json` frame (`spec.md` §4.1, §6).
//!
//! Malformed JSON is treated as empty opts so defaults apply rather than
//! failing the request (`spec.md` §7).

use serde::{Deserialize, Serialize};

use crate::defaults::DEFAULT_REQUEST_TIMEOUT_MS;

/// Options a client may attach to `W_REQUEST`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOpts {
    /// Deadline in milliseconds from submission; `spec.md` default 60000.
    pub timeout: i64,
    /// Retry-on-worker-loss flag, read as an integer per `spec.md` §6
    /// ("Request opts") and as a boolean at worker-loss time per §4.7 —
    /// see DESIGN.md for how this crate unifies the two readings.
    pub retry: i64,
    /// Mirror this request to the persistence controller.
    pub persist: bool,
    /// TTL in milliseconds for caching the eventual reply; `None` disables
    /// fingerprinting for this request even when the broker cache is on.
    pub cache: Option<u64>,
}

impl Default for RequestOpts {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT_MS,
            retry: 0,
            persist: false,
            cache: None,
        }
    }
}

impl RequestOpts {
    /// Parse from raw `opts_json` bytes, defaulting on malformed/empty input.
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_default()
    }
}

/// Options a worker may attach to a final `W_REPLY`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyOpts {
    /// TTL in milliseconds for the cache entry, if the cache is enabled.
    pub cache: Option<u64>,
}

impl ReplyOpts {
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_default()
    }
}

/// Options a worker may attach to `W_HEARTBEAT`, merged into its record
/// (`spec.md` §4.1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerHeartbeatOpts {
    /// Maximum simultaneous assignments; `None` leaves the current value
    /// unchanged (merge semantics, `spec.md` §3).
    pub concurrency: Option<i64>,
}

impl WorkerHeartbeatOpts {
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_yields_defaults() {
        let opts = RequestOpts::parse(b"{not json");
        assert_eq!(opts, RequestOpts::default());
    }

    #[test]
    fn empty_opts_is_default() {
        assert_eq!(RequestOpts::parse(b""), RequestOpts::default());
    }

    #[test]
    fn partial_opts_fill_remaining_defaults() {
        let opts = RequestOpts::parse(br#"{"timeout": 1000}"#);
        assert_eq!(opts.timeout, 1000);
        assert_eq!(opts.retry, 0);
        assert!(!opts.persist);
    }
}
