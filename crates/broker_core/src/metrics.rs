//! In-memory metrics, lock-free atomics for counters.
//!
//! Plain data, single writer (the event loop), many readers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub requests_enqueued: AtomicU64,
    pub requests_dispatched: AtomicU64,
    pub requests_completed: AtomicU64,
    pub requests_rejected: AtomicU64,
    pub requests_expired: AtomicU64,
    pub requests_retried: AtomicU64,

    pub workers_registered: AtomicU64,
    pub workers_purged: AtomicU64,

    pub messages_received: AtomicU64,
    pub messages_sent: AtomicU64,

    pub protocol_errors: AtomicU64,

    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests_enqueued: AtomicU64::new(0),
            requests_dispatched: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            requests_expired: AtomicU64::new(0),
            requests_retried: AtomicU64::new(0),
            workers_registered: AtomicU64::new(0),
            workers_purged: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_requests_enqueued(&self) {
        self.requests_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_requests_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_requests_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_requests_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_requests_expired(&self) {
        self.requests_expired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_requests_retried(&self) {
        self.requests_retried.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_workers_registered(&self) {
        self.workers_registered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_workers_purged(&self) {
        self.workers_purged.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_messages_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_protocol_errors(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = Metrics::new();
        assert_eq!(m.requests_enqueued.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn increment_is_observable() {
        let m = Metrics::new();
        m.inc_requests_dispatched();
        m.inc_requests_dispatched();
        assert_eq!(m.requests_dispatched.load(Ordering::Relaxed), 2);
    }
}
