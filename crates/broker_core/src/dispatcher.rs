//! Worker selection and request validation (`spec.md` §4.3, §4.4).

use std::fmt;
use std::str::FromStr;

use broker_protocol::{ServiceName, WorkerId};

use crate::registry::{ServiceRegistry, WorkerRegistry};
use crate::registry::worker::WorkerRecord;
use crate::request::RequestRecord;

/// Worker-pick policy (`spec.md` §4.3 "Worker-pick mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSelectMode {
    /// Sort by current assignment count ascending; pick the first under
    /// its concurrency limit.
    Load,
    /// Pick a uniformly random eligible worker.
    Rand,
}

impl fmt::Display for WorkerSelectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerSelectMode::Load => "load",
            WorkerSelectMode::Rand => "rand",
        })
    }
}

impl FromStr for WorkerSelectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(WorkerSelectMode::Load),
            "rand" => Ok(WorkerSelectMode::Rand),
            other => Err(format!("unknown dispatch mode: {other}")),
        }
    }
}

/// A (service, worker) pairing returned by [`select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The service whose queue the head request should be popped from —
    /// may differ from the name `select` was called with, when a
    /// wildcard/concrete cross-match is used.
    pub service: ServiceName,
    pub worker_id: WorkerId,
}

/// `spec.md` §4.3 "Selection `select(service, mode)`".
pub fn select(
    services: &ServiceRegistry,
    workers: &WorkerRegistry,
    service: &ServiceName,
    mode: WorkerSelectMode,
) -> Option<Selection> {
    let local_workers = services.workers_of(service);
    let local_queue_len = services.queue_len(service);

    if !local_workers.is_empty() && local_queue_len > 0 {
        if let Some(worker_id) = pick_worker(workers, local_workers, mode) {
            return Some(Selection {
                service: service.clone(),
                worker_id,
            });
        }
    }

    if service.is_wildcard() {
        if local_workers.is_empty() {
            return None;
        }
        let matched = services.services_matching_with_queue(service).next().cloned()?;
        let worker_id = pick_worker(workers, local_workers, mode)?;
        return Some(Selection {
            service: matched,
            worker_id,
        });
    }

    if local_queue_len == 0 {
        return None;
    }
    let wildcard = services
        .wildcard_services_matching_with_workers(service)
        .next()?
        .clone();
    let wildcard_workers = services.workers_of(&wildcard);
    let worker_id = pick_worker(workers, wildcard_workers, mode)?;
    Some(Selection {
        service: service.clone(),
        worker_id,
    })
}

/// `spec.md` §4.3 "Worker-pick mode": eligibility is capacity only — a
/// worker at or over its concurrency limit yields no candidate.
pub fn pick_worker(
    workers: &WorkerRegistry,
    candidates: &[WorkerId],
    mode: WorkerSelectMode,
) -> Option<WorkerId> {
    let mut eligible: Vec<&WorkerRecord> = candidates
        .iter()
        .filter_map(|id| workers.get(id))
        .filter(|w| w.has_capacity())
        .collect();

    match mode {
        WorkerSelectMode::Load => {
            eligible.sort_by_key(|w| w.rids.len());
            eligible.first().map(|w| w.worker_id.clone())
        }
        WorkerSelectMode::Rand => {
            if eligible.is_empty() {
                None
            } else {
                let idx = fastrand::usize(..eligible.len());
                Some(eligible[idx].worker_id.clone())
            }
        }
    }
}

/// `spec.md` §4.4 "Request validation" outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateOutcome {
    /// `+1`: proceed to assignment.
    Assign,
    /// `-1`: request timed out; drop and delete from persistence.
    Expired,
    /// `-2`: this worker already rejected it and attempts are exhausted;
    /// requeue with mode forced to `rand`.
    RejectExceeded,
}

/// `spec.md` §4.4 `validate(worker, req)`.
pub fn validate(
    req: &RequestRecord,
    worker_id: &WorkerId,
    rattempts: u32,
    now_ms: i64,
) -> ValidateOutcome {
    if req.is_expired(now_ms) {
        return ValidateOutcome::Expired;
    }
    if req.rejects.contains(worker_id) && req.attempts >= rattempts {
        return ValidateOutcome::RejectExceeded;
    }
    ValidateOutcome::Assign
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::worker::WorkerRecord;
    use std::collections::HashSet;

    fn make_worker(id: &str, service: &str, concurrency: i64, in_flight: usize) -> WorkerRecord {
        let mut w = WorkerRecord::new(WorkerId::new(id.as_bytes().to_vec()), ServiceName::new(service));
        w.concurrency = concurrency;
        for i in 0..in_flight {
            w.rids.push(broker_protocol::Rid::from(i.to_string().as_str()));
        }
        w
    }

    fn req(service: &str) -> RequestRecord {
        RequestRecord {
            rid: broker_protocol::Rid::from("r1"),
            service: ServiceName::new(service),
            client_id: b"c".to_vec(),
            attempts: 0,
            rejects: HashSet::new(),
            hash: None,
            timeout: -1,
            retry: 0,
            persist: false,
            ts: 0,
            worker_id: None,
            payload: vec![],
            opts_json: b"{}".to_vec(),
            seq: 0,
        }
    }

    #[test]
    fn selects_own_pool_worker_when_both_present() {
        let mut services = ServiceRegistry::new();
        let mut workers = WorkerRegistry::new();
        let worker = make_worker("w1", "echo", 1, 0);
        let wid = worker.worker_id.clone();
        workers.insert(worker);
        services.register_worker(&ServiceName::new("echo"), wid.clone());
        services.enqueue(req("echo"));

        let sel = select(&services, &workers, &ServiceName::new("echo"), WorkerSelectMode::Load).unwrap();
        assert_eq!(sel.worker_id, wid);
        assert_eq!(sel.service, ServiceName::new("echo"));
    }

    #[test]
    fn load_mode_prefers_least_loaded_worker() {
        let mut services = ServiceRegistry::new();
        let mut workers = WorkerRegistry::new();
        let busy = make_worker("busy", "echo", 5, 3);
        let idle = make_worker("idle", "echo", 5, 0);
        let idle_id = idle.worker_id.clone();
        let busy_id = busy.worker_id.clone();
        workers.insert(busy);
        workers.insert(idle);
        services.register_worker(&ServiceName::new("echo"), busy_id);
        services.register_worker(&ServiceName::new("echo"), idle_id.clone());
        services.enqueue(req("echo"));

        let sel = select(&services, &workers, &ServiceName::new("echo"), WorkerSelectMode::Load).unwrap();
        assert_eq!(sel.worker_id, idle_id);
    }

    #[test]
    fn worker_at_concurrency_limit_is_ineligible() {
        let mut workers = WorkerRegistry::new();
        let full = make_worker("full", "echo", 1, 1);
        let id = full.worker_id.clone();
        workers.insert(full);
        assert_eq!(pick_worker(&workers, &[id], WorkerSelectMode::Load), None);
    }

    #[test]
    fn wildcard_service_routes_to_matching_concrete_queue() {
        let mut services = ServiceRegistry::new();
        let mut workers = WorkerRegistry::new();
        let worker = make_worker("w1", "audio.*", -1, 0);
        let wid = worker.worker_id.clone();
        workers.insert(worker);
        services.register_worker(&ServiceName::new("audio.*"), wid.clone());
        services.enqueue(req("audio.transcode"));

        let sel = select(&services, &workers, &ServiceName::new("audio.*"), WorkerSelectMode::Load).unwrap();
        assert_eq!(sel.service, ServiceName::new("audio.transcode"));
        assert_eq!(sel.worker_id, wid);
    }

    #[test]
    fn concrete_service_routes_to_matching_wildcard_worker() {
        let mut services = ServiceRegistry::new();
        let mut workers = WorkerRegistry::new();
        let worker = make_worker("w1", "audio.*", -1, 0);
        let wid = worker.worker_id.clone();
        workers.insert(worker);
        services.register_worker(&ServiceName::new("audio.*"), wid.clone());
        services.enqueue(req("audio.transcode"));

        let sel = select(
            &services,
            &workers,
            &ServiceName::new("audio.transcode"),
            WorkerSelectMode::Load,
        )
        .unwrap();
        assert_eq!(sel.service, ServiceName::new("audio.transcode"));
        assert_eq!(sel.worker_id, wid);
    }

    #[test]
    fn expired_request_is_reported_expired() {
        let mut r = req("echo");
        r.timeout = 10;
        r.ts = 0;
        let worker_id = WorkerId::new(b"w1".to_vec());
        assert_eq!(validate(&r, &worker_id, 5, 1_000), ValidateOutcome::Expired);
    }

    #[test]
    fn exhausted_rejects_yield_reject_exceeded() {
        let mut r = req("echo");
        let worker_id = WorkerId::new(b"w1".to_vec());
        r.rejects.insert(worker_id.clone());
        r.attempts = 5;
        assert_eq!(
            validate(&r, &worker_id, 5, 0),
            ValidateOutcome::RejectExceeded
        );
    }

    #[test]
    fn fresh_request_validates_for_assignment() {
        let r = req("echo");
        let worker_id = WorkerId::new(b"w1".to_vec());
        assert_eq!(validate(&r, &worker_id, 5, 0), ValidateOutcome::Assign);
    }
}
