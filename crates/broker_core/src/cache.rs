//! Response cache: fingerprint -> reply bytes with TTL expiry (`spec.md` §3, §4.5).
//!
//! Pluggable cache is a capability set `{get, set}` (`spec.md` §9);
//! TTL semantics are expire-at-absolute-time. The default implementation
//! is process-local, matching the broker's default in-memory persistence.

use std::collections::HashMap;

use broker_protocol::Fingerprint;

use crate::clock::now_ms;

/// A cached reply, or absent.
pub trait ReplyCache: Send {
    fn get(&mut self, hash: &Fingerprint) -> Option<Vec<u8>>;
    fn set(&mut self, hash: Fingerprint, payload: Vec<u8>, ttl_ms: Option<u64>);
}

struct Entry {
    data: Vec<u8>,
    /// Absolute expiry in ms since epoch, or `None` for "never expires".
    expire_at_ms: Option<i64>,
}

/// Default in-memory cache. Expired entries are deleted lazily on lookup
/// (`spec.md` §3 "Cache entry").
#[derive(Default)]
pub struct InMemoryCache {
    entries: HashMap<Fingerprint, Entry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyCache for InMemoryCache {
    fn get(&mut self, hash: &Fingerprint) -> Option<Vec<u8>> {
        let expired = match self.entries.get(hash) {
            Some(entry) => matches!(entry.expire_at_ms, Some(deadline) if now_ms() >= deadline),
            None => return None,
        };
        if expired {
            self.entries.remove(hash);
            return None;
        }
        self.entries.get(hash).map(|entry| entry.data.clone())
    }

    fn set(&mut self, hash: Fingerprint, payload: Vec<u8>, ttl_ms: Option<u64>) {
        let expire_at_ms = ttl_ms.map(|ttl| now_ms() + ttl as i64);
        self.entries.insert(
            hash,
            Entry {
                data: payload,
                expire_at_ms,
            },
        );
    }
}
