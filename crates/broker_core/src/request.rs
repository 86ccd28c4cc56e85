//! Request records (`spec.md` §3 "Request record").

use std::collections::HashSet;

use broker_protocol::{Fingerprint, Rid, ServiceName, WorkerId};

/// A request, from enqueue to final reply/abandon.
///
/// Invariant (`spec.md` §3): exactly one of {in a service queue, assigned
/// to a worker, completed/abandoned}. While queued, the broker's only
/// handle to a request is its position in `ServiceRecord::queue`; once
/// assigned, ownership moves to the global request table (`RequestTable`)
/// and only the `rid` is mirrored into the worker's `rids` list
/// (`spec.md` §9 "records hold ids, not direct references").
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub rid: Rid,
    pub service: ServiceName,
    pub client_id: Vec<u8>,
    pub attempts: u32,
    pub rejects: HashSet<WorkerId>,
    pub hash: Option<Fingerprint>,
    /// Milliseconds added to `ts` to get the deadline, or `-1` for none
    /// (`spec.md` §4.4's validate formula: `now > req.ts + req.timeout`).
    pub timeout: i64,
    /// Raw `retry` opt. `spec.md` §9 flags this field as read inconsistently
    /// (boolean at worker-loss time, integer in request opts) — see
    /// DESIGN.md. We keep the raw value and expose `retry_on_worker_loss`.
    pub retry: i64,
    pub persist: bool,
    pub ts: i64,
    pub worker_id: Option<WorkerId>,
    pub payload: Vec<u8>,
    pub opts_json: Vec<u8>,
    /// Monotonic sequence assigned at enqueue; bookkeeping only, not part
    /// of the protocol (`SPEC_FULL.md` §3 supplement).
    pub seq: u64,
}

impl RequestRecord {
    /// `spec.md` §4.7: "the `retry` field is read as a boolean on worker loss".
    pub fn retry_on_worker_loss(&self) -> bool {
        self.retry != 0
    }

    /// `spec.md` §4.4: `-1` outcome — request is expired.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.timeout >= 0 && now_ms > self.ts + self.timeout
    }
}
