//! Persistence controller (`spec.md` §4.6).
//!
//! All operations are synchronous here because the broker's event loop is
//! synchronous (`spec.md` §5) — an implementer backing this with an async
//! store is responsible for bridging it into that single-threaded loop
//! itself.

use std::collections::HashMap;
use std::sync::Mutex;

use broker_protocol::Rid;

use crate::request::RequestRecord;

/// Capability set `{rset, rdel, rget, rgetall}` (`spec.md` §9).
pub trait PersistenceController: Send {
    fn rset(&self, req: &RequestRecord);
    fn rdel(&self, rid: &Rid);
    fn rget(&self, rid: &Rid) -> Option<RequestRecord>;
    fn rgetall(&self) -> Vec<RequestRecord>;
}

/// Default process-local persistence (`spec.md` §4.6 "Default implementation
/// is a process-local mapping").
#[derive(Default)]
pub struct InMemoryPersistence {
    requests: Mutex<HashMap<Rid, RequestRecord>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceController for InMemoryPersistence {
    fn rset(&self, req: &RequestRecord) {
        self.requests
            .lock()
            .unwrap()
            .insert(req.rid.clone(), req.clone());
    }

    fn rdel(&self, rid: &Rid) {
        self.requests.lock().unwrap().remove(rid);
    }

    fn rget(&self, rid: &Rid) -> Option<RequestRecord> {
        self.requests.lock().unwrap().get(rid).cloned()
    }

    fn rgetall(&self) -> Vec<RequestRecord> {
        self.requests.lock().unwrap().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_protocol::ServiceName;
    use std::collections::HashSet;

    fn sample(rid: &str) -> RequestRecord {
        RequestRecord {
            rid: Rid::from(rid),
            service: ServiceName::new("echo"),
            client_id: b"client".to_vec(),
            attempts: 0,
            rejects: HashSet::new(),
            hash: None,
            timeout: 60_000,
            retry: 0,
            persist: true,
            ts: 0,
            worker_id: None,
            payload: b"hi".to_vec(),
            opts_json: b"{}".to_vec(),
            seq: 0,
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = InMemoryPersistence::new();
        store.rset(&sample("1"));
        let got = store.rget(&Rid::from("1")).unwrap();
        assert_eq!(got.payload, b"hi");
    }

    #[test]
    fn delete_removes_it() {
        let store = InMemoryPersistence::new();
        store.rset(&sample("1"));
        store.rdel(&Rid::from("1"));
        assert!(store.rget(&Rid::from("1")).is_none());
    }

    #[test]
    fn rgetall_returns_everything() {
        let store = InMemoryPersistence::new();
        store.rset(&sample("1"));
        store.rset(&sample("2"));
        assert_eq!(store.rgetall().len(), 2);
    }
}
