//! Service registry (`spec.md` §3 "Service record").

use std::collections::{HashMap, VecDeque};

use broker_protocol::{ServiceName, WorkerId};

use crate::request::RequestRecord;

/// A service: its registered workers and pending request queue.
#[derive(Default)]
pub struct ServiceRecord {
    /// Workers registered for this exact name, in registration order
    /// (`spec.md` §3).
    pub workers: Vec<WorkerId>,
    pub queue: VecDeque<RequestRecord>,
}

/// Tracks every service ever referenced. Lazily created, never destroyed
/// during a broker lifetime (`spec.md` §3).
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceName, ServiceRecord>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&mut self, name: &ServiceName) -> &mut ServiceRecord {
        self.services.entry(name.clone()).or_default()
    }

    pub fn get(&self, name: &ServiceName) -> Option<&ServiceRecord> {
        self.services.get(name)
    }

    pub fn get_mut(&mut self, name: &ServiceName) -> Option<&mut ServiceRecord> {
        self.services.get_mut(name)
    }

    /// Register a worker under its service's exact name.
    pub fn register_worker(&mut self, name: &ServiceName, worker_id: WorkerId) {
        self.get_or_create(name).workers.push(worker_id);
    }

    /// Remove a worker from its service's worker list.
    pub fn unregister_worker(&mut self, name: &ServiceName, worker_id: &WorkerId) {
        if let Some(service) = self.services.get_mut(name) {
            service.workers.retain(|id| id != worker_id);
        }
    }

    /// Append a request to the tail of its service's queue, lazily
    /// creating the service if needed.
    pub fn enqueue(&mut self, req: RequestRecord) {
        let name = req.service.clone();
        self.get_or_create(&name).queue.push_back(req);
    }

    /// Push a request back to the head of its service queue — used for
    /// losses where dispatch never completed, to preserve arrival order
    /// relative to requests that never left the queue.
    pub fn requeue_front(&mut self, req: RequestRecord) {
        let name = req.service.clone();
        self.get_or_create(&name).queue.push_front(req);
    }

    /// Push a request back to the tail of its service queue after a
    /// reject (`spec.md` §4.1 "re-enqueue at the tail").
    pub fn requeue_back(&mut self, req: RequestRecord) {
        let name = req.service.clone();
        self.get_or_create(&name).queue.push_back(req);
    }

    pub fn workers_of(&self, name: &ServiceName) -> &[WorkerId] {
        self.services
            .get(name)
            .map(|s| s.workers.as_slice())
            .unwrap_or(&[])
    }

    pub fn queue_len(&self, name: &ServiceName) -> usize {
        self.services.get(name).map(|s| s.queue.len()).unwrap_or(0)
    }

    /// Concrete (or other wildcard) services whose name matches `wildcard`'s
    /// prefix and have queued work.
    pub fn services_matching_with_queue<'a>(
        &'a self,
        wildcard: &'a ServiceName,
    ) -> impl Iterator<Item = &'a ServiceName> {
        self.services
            .iter()
            .filter(move |(name, svc)| {
                *name != wildcard && wildcard.matches(name) && !svc.queue.is_empty()
            })
            .map(|(name, _)| name)
    }

    /// Wildcard services whose prefix matches `concrete` and have workers.
    pub fn wildcard_services_matching_with_workers<'a>(
        &'a self,
        concrete: &'a ServiceName,
    ) -> impl Iterator<Item = &'a ServiceName> {
        self.services
            .iter()
            .filter(move |(name, svc)| {
                name.is_wildcard() && name.matches(concrete) && !svc.workers.is_empty()
            })
            .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestRecord;
    use broker_protocol::Rid;
    use std::collections::HashSet;

    fn req(service: &str, rid: &str) -> RequestRecord {
        RequestRecord {
            rid: Rid::from(rid),
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
    fn enqueue_creates_service_lazily() {
        let mut reg = ServiceRegistry::new();
        reg.enqueue(req("echo", "1"));
        assert_eq!(reg.queue_len(&ServiceName::new("echo")), 1);
    }

    #[test]
    fn wildcard_matches_concrete_with_queue() {
        let mut reg = ServiceRegistry::new();
        reg.enqueue(req("audio.transcode", "1"));
        reg.register_worker(&ServiceName::new("audio.*"), WorkerId::new(b"w".to_vec()));
        let wildcard = ServiceName::new("audio.*");
        let matches: Vec<_> = reg.services_matching_with_queue(&wildcard).collect();
        assert_eq!(matches, vec![&ServiceName::new("audio.transcode")]);
    }

    #[test]
    fn concrete_finds_matching_wildcard_with_workers() {
        let mut reg = ServiceRegistry::new();
        reg.register_worker(&ServiceName::new("audio.*"), WorkerId::new(b"w".to_vec()));
        let concrete = ServiceName::new("audio.transcode");
        let matches: Vec<_> = reg
            .wildcard_services_matching_with_workers(&concrete)
            .collect();
        assert_eq!(matches, vec![&ServiceName::new("audio.*")]);
    }
}
