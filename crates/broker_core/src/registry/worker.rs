//! Worker registry (`spec.md` §3 "Worker record").

use std::collections::HashMap;

use broker_protocol::defaults::{DEFAULT_CONCURRENCY, INITIAL_LIVENESS};
use broker_protocol::{Rid, ServiceName, WorkerId};

/// A registered worker: its service, liveness, and in-flight assignments.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub service: ServiceName,
    pub liveness: i8,
    /// Ordered sequence of currently assigned request ids (`spec.md` §3).
    pub rids: Vec<Rid>,
    /// Max simultaneous assignments; `-1` = unbounded.
    pub concurrency: i64,
}

impl WorkerRecord {
    pub fn new(worker_id: WorkerId, service: ServiceName) -> Self {
        Self {
            worker_id,
            service,
            liveness: INITIAL_LIVENESS,
            rids: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// `spec.md` §4.3/§8: a worker already holding `concurrency` assignments
    /// has no room for another. (§4.3's prose formula reads
    /// `rids.length > concurrency`, but end-to-end scenario 6 in §8 is
    /// unambiguous that a worker at its limit must NOT receive another
    /// assignment until one frees up — see DESIGN.md for this resolution.)
    pub fn has_capacity(&self) -> bool {
        self.concurrency < 0 || (self.rids.len() as i64) < self.concurrency
    }

}

/// Tracks every known worker, keyed by transport identity.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerId, WorkerRecord>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, worker_id: &WorkerId) -> bool {
        self.workers.contains_key(worker_id)
    }

    pub fn get(&self, worker_id: &WorkerId) -> Option<&WorkerRecord> {
        self.workers.get(worker_id)
    }

    pub fn get_mut(&mut self, worker_id: &WorkerId) -> Option<&mut WorkerRecord> {
        self.workers.get_mut(worker_id)
    }

    pub fn insert(&mut self, record: WorkerRecord) {
        self.workers.insert(record.worker_id.clone(), record);
    }

    pub fn remove(&mut self, worker_id: &WorkerId) -> Option<WorkerRecord> {
        self.workers.remove(worker_id)
    }

    pub fn reset_liveness(&mut self, worker_id: &WorkerId) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.liveness = INITIAL_LIVENESS;
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &WorkerId> {
        self.workers.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(concurrency: i64, in_flight: usize) -> WorkerRecord {
        let mut w = WorkerRecord::new(WorkerId::new(b"w1".to_vec()), ServiceName::new("echo"));
        w.concurrency = concurrency;
        for i in 0..in_flight {
            w.rids.push(Rid::from(i.to_string().as_str()));
        }
        w
    }

    #[test]
    fn capacity_respects_concurrency_limit() {
        assert!(worker(1, 0).has_capacity());
        assert!(!worker(1, 1).has_capacity());
    }

    #[test]
    fn unbounded_concurrency_always_has_capacity() {
        assert!(worker(-1, 1000).has_capacity());
    }
}
