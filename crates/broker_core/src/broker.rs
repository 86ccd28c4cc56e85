//! Broker control plane: owns the registries, the dispatcher, the request
//! table, and the `zmq::ROUTER` event loop (`spec.md` §4, §5).

use std::collections::{HashMap, HashSet};
use std::sync::mpsc;

use tracing::{debug, info, warn};

use broker_protocol::{
    build_client_reply, build_worker_dispatch, build_worker_disconnect, build_worker_heartbeat,
    build_worker_heartbeat_relay, Fingerprint, Inbound, ProtocolError, Rid, ServiceName, Tag,
    WorkerHeartbeatOpts, WorkerId,
};

use crate::cache::{InMemoryCache, ReplyCache};
use crate::clock::now_ms;
use crate::config::BrokerConfig;
use crate::control::ControlSocket;
use crate::dispatcher::{self, ValidateOutcome, WorkerSelectMode};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::persistence::{InMemoryPersistence, PersistenceController};
use crate::registry::{ServiceRegistry, WorkerRecord, WorkerRegistry};
use crate::request::RequestRecord;

/// The broker: one `ROUTER` socket, an optional control `REP` socket, and
/// all in-memory state (`spec.md` §3 "Ownership").
pub struct Broker {
    socket: zmq::Socket,
    control: Option<ControlSocket>,
    services: ServiceRegistry,
    workers: WorkerRegistry,
    /// Global request table: only assigned requests live here
    /// (`spec.md` §3 invariant).
    requests: HashMap<Rid, RequestRecord>,
    cache: Option<Box<dyn ReplyCache>>,
    persistence: Box<dyn PersistenceController>,
    config: BrokerConfig,
    running: bool,
    last_heartbeat_tick_ms: i64,
    /// Single-slot deferred dispatcher re-entry (`spec.md` §4.3, §5).
    pending_reentry: Option<(ServiceName, WorkerSelectMode)>,
    seq_counter: u64,
}

impl Broker {
    /// Bind the `ROUTER` socket (and, if configured, the control socket),
    /// with the default in-memory persistence and cache.
    pub fn bind(config: BrokerConfig) -> Result<Self> {
        let persistence: Box<dyn PersistenceController> = Box::new(InMemoryPersistence::new());
        let cache: Option<Box<dyn ReplyCache>> = if config.cache_enabled {
            Some(Box::new(InMemoryCache::new()))
        } else {
            None
        };
        Self::bind_with(config, persistence, cache)
    }

    /// Bind with caller-supplied persistence and cache implementations
    /// (`spec.md` §4.6 "Implementers may substitute a durable store").
    pub fn bind_with(
        config: BrokerConfig,
        persistence: Box<dyn PersistenceController>,
        cache: Option<Box<dyn ReplyCache>>,
    ) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::ROUTER)?;
        socket.bind(&config.bind_addr)?;
        let rcvtimeo = config.heartbeat_ms.min(1_000) as i32;
        socket.set_rcvtimeo(rcvtimeo)?;
        info!("broker bound to {}", config.bind_addr);

        let control = match &config.control_addr {
            Some(addr) => {
                let ctrl = ControlSocket::bind(&context, addr)?;
                info!("control socket bound to {}", addr);
                Some(ctrl)
            }
            None => None,
        };

        let mut broker = Self {
            socket,
            control,
            services: ServiceRegistry::new(),
            workers: WorkerRegistry::new(),
            requests: HashMap::new(),
            cache,
            persistence,
            config,
            running: false,
            last_heartbeat_tick_ms: now_ms(),
            pending_reentry: None,
            seq_counter: 0,
        };
        broker.repopulate_from_persistence();
        Ok(broker)
    }

    /// `spec.md` §4.6: `rgetall` is replayed once at startup to repopulate
    /// queues. Requests that were already assigned lose their worker — the
    /// broker treats them as fresh, unassigned queue entries.
    fn repopulate_from_persistence(&mut self) {
        for mut req in self.persistence.rgetall() {
            req.worker_id = None;
            self.services.enqueue(req);
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq_counter += 1;
        self.seq_counter
    }

    /// Run until `stop_rx` fires or is dropped.
    pub fn run_with_shutdown(&mut self, stop_rx: mpsc::Receiver<()>) -> Result<()> {
        self.run_inner(Some(stop_rx))
    }

    /// Run forever (until the process is killed).
    pub fn run(&mut self) -> Result<()> {
        self.run_inner(None)
    }

    fn run_inner(&mut self, stop_rx: Option<mpsc::Receiver<()>>) -> Result<()> {
        self.running = true;
        info!("broker event loop started");

        while self.running {
            if let Some(rx) = stop_rx.as_ref() {
                match rx.try_recv() {
                    Ok(()) | Err(mpsc::TryRecvError::Disconnected) => {
                        info!("broker received stop signal");
                        break;
                    }
                    Err(mpsc::TryRecvError::Empty) => {}
                }
            }

            match self.socket.recv_multipart(0) {
                Ok(frames) => {
                    if let Some((identity, rest)) = frames.split_first() {
                        self.handle_inbound(identity.clone(), rest);
                    }
                }
                Err(zmq::Error::EAGAIN) => {}
                Err(e) => warn!("recv error: {e}"),
            }

            if let Some(control) = &self.control {
                while control.poll_once(&self.services, &self.workers) {}
            }

            self.drain_pending_reentry();
            self.heartbeat_tick_if_due();
        }

        self.running = false;
        info!("broker stopped");
        Ok(())
    }

    // ---- §4.1 Protocol handler ----------------------------------------

    fn handle_inbound(&mut self, identity: Vec<u8>, rest: &[Vec<u8>]) {
        METRICS.inc_messages_received();
        let peer = WorkerId::new(identity.clone());

        let tag = match Inbound::tag(rest) {
            Ok(t) => t,
            Err(_) => {
                METRICS.inc_protocol_errors();
                return;
            }
        };

        match Inbound::parse(rest) {
            Ok(Inbound::WorkerReady { service }) => {
                self.handle_worker_ready(peer, service);
            }
            Ok(inbound) => {
                if tag == Tag::Worker {
                    if !self.workers.contains(&peer) {
                        // §4.1: "Any worker frame from an unknown worker
                        // (except READY): send DISCONNECT and ignore."
                        self.delete_worker(&peer, true);
                        return;
                    }
                    self.workers.reset_liveness(&peer);
                }
                self.dispatch_inbound(peer, identity, inbound);
            }
            Err(ProtocolError::EmptyServiceOnReady) => {
                self.delete_worker(&peer, true);
            }
            Err(e) => {
                debug!("dropping malformed frame from {peer}: {e}");
                METRICS.inc_protocol_errors();
                // §4.1: a malformed frame doesn't change which tag it was
                // sent under — an unknown worker still gets disconnected,
                // parseable or not.
                if tag == Tag::Worker && !self.workers.contains(&peer) {
                    self.delete_worker(&peer, true);
                }
            }
        }
    }

    fn dispatch_inbound(&mut self, worker_id: WorkerId, client_identity: Vec<u8>, inbound: Inbound) {
        match inbound {
            Inbound::ClientRequest {
                service,
                rid,
                payload,
                opts,
            } => self.handle_client_request(client_identity, service, rid, payload, opts),
            Inbound::ClientHeartbeat { rid } => self.handle_client_heartbeat(rid),
            Inbound::WorkerReady { .. } => unreachable!("handled by caller"),
            Inbound::WorkerReply {
                client_id,
                rid,
                payload,
                opts,
                partial,
            } => self.handle_worker_reply(worker_id, client_id, rid, payload, opts, partial),
            Inbound::WorkerReject { client_id, rid } => {
                self.handle_worker_reject(worker_id, client_id, rid)
            }
            Inbound::WorkerHeartbeat { opts_json } => {
                self.handle_worker_heartbeat(worker_id, opts_json)
            }
            Inbound::WorkerDisconnect => self.delete_worker(&worker_id, false),
        }
    }

    fn handle_client_request(
        &mut self,
        client_id: Vec<u8>,
        service: ServiceName,
        rid: Rid,
        payload: Vec<u8>,
        opts: broker_protocol::RequestOpts,
    ) {
        let hash = if self.config.cache_enabled && opts.cache.is_some() {
            Some(Fingerprint::compute(&service, &payload))
        } else {
            None
        };
        let opts_json = serde_json::to_vec(&opts).unwrap_or_else(|_| b"{}".to_vec());
        let seq = self.next_seq();
        let req = RequestRecord {
            rid,
            service: service.clone(),
            client_id,
            attempts: 0,
            rejects: HashSet::new(),
            hash,
            timeout: opts.timeout,
            retry: opts.retry,
            persist: opts.persist,
            ts: now_ms(),
            worker_id: None,
            payload,
            opts_json,
            seq,
        };
        if req.persist {
            self.persistence.rset(&req);
        }
        debug!(rid = %req.rid, seq = req.seq, %service, "enqueued request");
        self.services.enqueue(req);
        METRICS.inc_requests_enqueued();
        self.dispatch(&service);
    }

    fn handle_client_heartbeat(&mut self, rid: Rid) {
        if let Some(req) = self.requests.get(&rid) {
            if let Some(worker_id) = req.worker_id.clone() {
                let frames = build_worker_heartbeat_relay(&req.client_id, &rid);
                self.send_worker(&worker_id, frames);
            }
        }
    }

    fn handle_worker_ready(&mut self, worker_id: WorkerId, service: ServiceName) {
        if self.workers.contains(&worker_id) {
            // Duplicate READY (`spec.md` §4.1).
            self.delete_worker(&worker_id, true);
            return;
        }
        let record = WorkerRecord::new(worker_id.clone(), service.clone());
        self.workers.insert(record);
        self.services.register_worker(&service, worker_id);
        METRICS.inc_workers_registered();
        self.dispatch(&service);
    }

    fn handle_worker_reply(
        &mut self,
        worker_id: WorkerId,
        _client_id: Vec<u8>,
        rid: Rid,
        payload: Vec<u8>,
        opts: broker_protocol::ReplyOpts,
        partial: bool,
    ) {
        let assigned_here = self
            .requests
            .get(&rid)
            .map(|r| r.worker_id.as_ref() == Some(&worker_id))
            .unwrap_or(false);
        if !assigned_here {
            self.protocol_violation(&worker_id);
            return;
        }
        let client_id = self.requests.get(&rid).map(|r| r.client_id.clone()).unwrap_or_default();
        self.send_client_reply(&client_id, &rid, &payload, partial);

        if partial {
            return;
        }

        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.rids.retain(|r| r != &rid);
        }
        let service = self.workers.get(&worker_id).map(|w| w.service.clone());

        if let Some(req) = self.requests.remove(&rid) {
            self.persistence.rdel(&rid);
            if self.config.cache_enabled {
                if let Some(hash) = req.hash {
                    if let Some(cache) = self.cache.as_mut() {
                        cache.set(hash, payload, opts.cache);
                    }
                }
            }
        }
        METRICS.inc_requests_completed();

        if let Some(service) = service {
            self.dispatch(&service);
        }
    }

    fn handle_worker_reject(&mut self, worker_id: WorkerId, _client_id: Vec<u8>, rid: Rid) {
        let Some(mut req) = self.requests.remove(&rid) else {
            return;
        };
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.rids.retain(|r| r != &rid);
        }
        req.rejects.insert(worker_id);
        req.worker_id = None;
        let service = req.service.clone();
        self.services.requeue_back(req);
        METRICS.inc_requests_rejected();
        // §4.1: dispatch "with policy temporarily set to rand" to avoid
        // immediate re-selection of the same worker under load-based
        // selection.
        self.dispatch_with_mode(&service, WorkerSelectMode::Rand);
    }

    fn handle_worker_heartbeat(&mut self, worker_id: WorkerId, opts_json: Vec<u8>) {
        let opts = WorkerHeartbeatOpts::parse(&opts_json);
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            if let Some(concurrency) = opts.concurrency {
                worker.concurrency = concurrency;
            }
        }
    }

    fn protocol_violation(&mut self, worker_id: &WorkerId) {
        warn!("protocol violation from worker {worker_id}, disconnecting");
        METRICS.inc_protocol_errors();
        self.delete_worker(worker_id, true);
    }

    // ---- §4.2 Reply path ------------------------------------------------

    fn send_client_reply(&mut self, client_id: &[u8], rid: &Rid, payload: &[u8], partial: bool) {
        let frames = build_client_reply(rid, payload, partial);
        self.send_frames(client_id, frames);
    }

    fn send_worker(&mut self, worker_id: &WorkerId, frames: Vec<Vec<u8>>) {
        self.send_frames(worker_id.as_bytes(), frames);
    }

    fn send_frames(&mut self, identity: &[u8], frames: Vec<Vec<u8>>) {
        let mut out = Vec::with_capacity(frames.len() + 1);
        out.push(identity.to_vec());
        out.extend(frames);
        match self.socket.send_multipart(&out, 0) {
            Ok(()) => METRICS.inc_messages_sent(),
            Err(e) => warn!("send failed: {e}"),
        }
    }

    // ---- §4.3 Dispatcher -------------------------------------------------

    fn dispatch(&mut self, service: &ServiceName) {
        self.dispatch_with_mode(service, self.config.dmode);
    }

    fn dispatch_with_mode(&mut self, service: &ServiceName, mode: WorkerSelectMode) {
        let mut needs_reentry = false;

        loop {
            let selection = match dispatcher::select(&self.services, &self.workers, service, mode) {
                Some(s) => s,
                None => break,
            };
            let popped = self
                .services
                .get_mut(&selection.service)
                .and_then(|s| s.queue.pop_front());
            let Some(mut req) = popped else {
                break;
            };
            req.attempts += 1;

            match dispatcher::validate(&req, &selection.worker_id, self.config.rattempts, now_ms()) {
                ValidateOutcome::Expired => {
                    METRICS.inc_requests_expired();
                    self.persistence.rdel(&req.rid);
                }
                ValidateOutcome::RejectExceeded => {
                    self.services.requeue_back(req);
                    needs_reentry = true;
                    // The same (service, worker) pair would be reselected
                    // immediately if we looped again — break now and let
                    // the deferred re-entry retry with `rand` instead of
                    // spinning synchronously on one rejecting worker.
                    break;
                }
                ValidateOutcome::Assign => {
                    self.assign(selection.service, selection.worker_id, req);
                }
            }
        }

        if needs_reentry {
            self.pending_reentry = Some((service.clone(), WorkerSelectMode::Rand));
        }
    }

    fn drain_pending_reentry(&mut self) {
        if let Some((service, mode)) = self.pending_reentry.take() {
            self.dispatch_with_mode(&service, mode);
        }
    }

    // ---- §4.5 Assignment & cache short-circuit ---------------------------

    fn assign(&mut self, service: ServiceName, worker_id: WorkerId, req: RequestRecord) {
        if self.config.cache_enabled {
            if let Some(hash) = req.hash.clone() {
                if let Some(cache) = self.cache.as_mut() {
                    if let Some(cached) = cache.get(&hash) {
                        METRICS.inc_cache_hits();
                        if req.persist {
                            self.persistence.rdel(&req.rid);
                        }
                        self.send_client_reply(&req.client_id, &req.rid, &cached, false);
                        return;
                    }
                    METRICS.inc_cache_misses();
                }
            }
        }

        let mut req = req;
        req.worker_id = Some(worker_id.clone());
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.rids.push(req.rid.clone());
        }
        if req.persist {
            self.persistence.rset(&req);
        }
        let frames = build_worker_dispatch(&req.client_id, &service, &req.payload, &req.opts_json);
        self.send_worker(&worker_id, frames);
        METRICS.inc_requests_dispatched();
        debug!(rid = %req.rid, seq = req.seq, worker_id = %worker_id, "dispatched request");
        self.requests.insert(req.rid.clone(), req);
    }

    // ---- §4.7 Heartbeat & liveness ---------------------------------------

    fn heartbeat_tick_if_due(&mut self) {
        let now = now_ms();
        if now - self.last_heartbeat_tick_ms < self.config.heartbeat_ms as i64 {
            return;
        }
        self.last_heartbeat_tick_ms = now;
        self.run_heartbeat_tick();
    }

    fn run_heartbeat_tick(&mut self) {
        let worker_ids: Vec<WorkerId> = self.workers.ids().cloned().collect();
        let mut to_purge = Vec::new();

        for id in &worker_ids {
            if let Some(worker) = self.workers.get_mut(id) {
                worker.liveness -= 1;
                if worker.liveness < 0 {
                    to_purge.push(id.clone());
                }
            }
        }

        for id in &to_purge {
            warn!("worker {id} exceeded liveness, purging");
            self.delete_worker(id, true);
        }

        for id in &worker_ids {
            if self.workers.contains(id) {
                self.send_worker(id, build_worker_heartbeat());
            }
        }
    }

    /// `spec.md` §4.7 "Worker deletion".
    fn delete_worker(&mut self, worker_id: &WorkerId, rude: bool) {
        if rude {
            self.send_worker(worker_id, build_worker_disconnect());
        }
        let Some(worker) = self.workers.remove(worker_id) else {
            return;
        };
        self.services.unregister_worker(&worker.service, worker_id);

        let mut to_redispatch: HashSet<ServiceName> = HashSet::new();
        for rid in worker.rids {
            let Some(mut req) = self.requests.remove(&rid) else {
                continue;
            };
            req.worker_id = None;
            if req.retry_on_worker_loss() {
                let service = req.service.clone();
                // Involuntary loss, not a reject: put it back ahead of
                // requests that never left the queue, preserving arrival
                // order (`spec.md` §4.7), rather than at the tail like a
                // rejected-by-worker requeue.
                self.services.requeue_front(req);
                METRICS.inc_requests_retried();
                to_redispatch.insert(service);
            } else {
                self.persistence.rdel(&rid);
            }
        }
        METRICS.inc_workers_purged();

        for service in to_redispatch {
            self.dispatch(&service);
        }
    }
}
