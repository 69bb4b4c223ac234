//! `ClusterCore`: the top-level orchestrator.
//!
//! Schedules probes and full-state sync, receives datagrams and streams,
//! dispatches typed messages into [`crate::membership::NodeManager`], and
//! piggy-backs pending gossip onto outgoing datagrams.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{oneshot, Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::broadcast::BroadcastQueue;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{ClusterEvent, EventBus, EventHandler};
use crate::membership::{select_random, Metadata, Node, NodeManager, NodeStatus, SuspicionTiming};
use crate::net::{self, TcpLayer, UdpLayer};
use crate::sequence::SequenceGenerator;
use crate::wire::{self, Message, SyncEntry};

/// Target UDP datagram size; gossip is packed up to this minus the primary
/// payload's length.
const UDP_BUDGET_BYTES: usize = 512;
/// Above this size a USER payload always goes over TCP.
const USER_TCP_THRESHOLD: usize = 65000;

/// The top-level, per-process cluster membership coordinator.
pub struct ClusterCore {
    config: Config,
    node_manager: Arc<AsyncRwLock<NodeManager>>,
    broadcast: Arc<BroadcastQueue>,
    events: Arc<EventBus>,
    probe_seq: SequenceGenerator,
    waiters: AsyncMutex<HashMap<u64, oneshot::Sender<bool>>>,
    udp: AsyncMutex<Option<Arc<UdpLayer>>>,
    tcp: AsyncMutex<Option<Arc<TcpLayer>>>,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    probe_cursor: AtomicUsize,
    local_addr: AsyncMutex<Option<(String, u16)>>,
}

impl ClusterCore {
    /// Construct a new core. Validates `config` but performs no I/O; call
    /// [`ClusterCore::start`] to bind sockets and begin scheduling.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        config.validate()?;
        let broadcast = Arc::new(BroadcastQueue::new());
        let events = Arc::new(EventBus::new());
        let timing = SuspicionTiming {
            probe_interval: config.probe_interval,
            suspicion_min_multi: config.suspicion_min_multi,
            suspicion_max_multi: config.suspicion_max_multi,
        };
        let node_manager = NodeManager::new_shared(
            broadcast.clone(),
            events.clone(),
            timing,
            config.encryption_key,
        );

        Ok(Arc::new(Self {
            config,
            node_manager,
            broadcast,
            events,
            probe_seq: SequenceGenerator::new(),
            waiters: AsyncMutex::new(HashMap::new()),
            udp: AsyncMutex::new(None),
            tcp: AsyncMutex::new(None),
            tasks: AsyncMutex::new(Vec::new()),
            running: AtomicBool::new(false),
            probe_cursor: AtomicUsize::new(0),
            local_addr: AsyncMutex::new(None),
        }))
    }

    /// `start()`: bind the UDP listener, bind the TCP listener, set the
    /// local node, then start the probe and sync schedulers, in that
    /// order. Idempotent.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let bind_addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.bind_port)
            .parse()
            .map_err(|err| Error::Config(format!("invalid bind address: {err}")))?;

        let udp = Arc::new(UdpLayer::bind(bind_addr).await?);
        let tcp_bind_addr = SocketAddr::new(bind_addr.ip(), udp.local_addr()?.port());
        let tcp = Arc::new(TcpLayer::bind(tcp_bind_addr).await?);

        let bound_addr = udp.local_addr()?;
        let (local_host, local_port) = self.resolve_local_address(bound_addr);
        *self.local_addr.lock().await = Some((local_host.clone(), local_port));

        *self.udp.lock().await = Some(udp.clone());
        *self.tcp.lock().await = Some(tcp.clone());

        {
            let mut manager = self.node_manager.write().await;
            manager
                .set_local_node(
                    self.config.node_name.clone(),
                    local_host,
                    local_port,
                    Metadata::new(),
                )
                .await;
        }

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_udp_recv_loop(udp));
        tasks.push(self.spawn_tcp_accept_loop(tcp));
        tasks.push(self.spawn_probe_scheduler());
        tasks.push(self.spawn_sync_scheduler());

        info!(node = %self.config.node_name, addr = %bound_addr, "cluster core started");
        Ok(())
    }

    /// `stop()`: reverses `start()`'s order, cancelling the schedulers and
    /// listener loops and closing the sockets. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..).rev() {
            task.abort();
        }
        self.waiters.lock().await.clear();
        *self.udp.lock().await = None;
        *self.tcp.lock().await = None;
        info!(node = %self.config.node_name, "cluster core stopped");
    }

    /// Resolve the advertised host/port: configured advertise address, else
    /// the configured bind address (with `0.0.0.0` triggering a best-effort
    /// interface lookup), else the bound socket's own address.
    fn resolve_local_address(&self, bound: SocketAddr) -> (String, u16) {
        if let Some(host) = &self.config.node_address {
            return (host.clone(), self.config.node_port.unwrap_or(self.config.bind_port));
        }
        if self.config.bind_address != "0.0.0.0" {
            return (self.config.bind_address.clone(), self.config.bind_port);
        }
        let host = net::default_local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| bound.ip().to_string());
        (host, bound.port())
    }

    /// Join the cluster by performing a full-state sync against each given
    /// address, fanned out concurrently; logs a success/failure summary
    /// rather than failing the whole call if some peers are unreachable.
    pub async fn join(&self, addrs: &[(String, u16)]) -> Result<usize> {
        let attempts = addrs
            .iter()
            .map(|(host, port)| self.sync_host(host, *port));
        let results = join_all(attempts).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        for (addr, result) in addrs.iter().zip(results.iter()) {
            if let Err(err) = result {
                warn!(host = %addr.0, port = addr.1, error = %err, "join sync failed");
            }
        }
        info!(succeeded, attempted = addrs.len(), "join complete");
        Ok(succeeded)
    }

    /// Current membership snapshot.
    pub async fn members(&self) -> Vec<Node> {
        self.node_manager.read().await.members()
    }

    /// Leave the cluster: broadcasts DEAD about the local node.
    pub async fn leave(&self) {
        self.node_manager.write().await.leave_local_node().await;
    }

    /// Register a handler for a lifecycle event (`"node.alive"`,
    /// `"node.suspect"`, `"node.dead"`, `"user"`).
    pub async fn subscribe(&self, event_name: &'static str, handler: Arc<dyn EventHandler>) {
        self.events.on(event_name, handler).await;
    }

    /// Deregister a previously-registered handler.
    pub async fn unsubscribe(&self, event_name: &'static str, handler: &Arc<dyn EventHandler>) {
        self.events.off(event_name, handler).await;
    }

    /// Send a USER payload to `target`. Falls back to TCP when
    /// `reliable` is set or the payload exceeds the UDP budget.
    pub async fn send(&self, target: &str, data: Vec<u8>, reliable: bool) -> Result<()> {
        let node = self
            .node_manager
            .read()
            .await
            .by_name(target)
            .cloned()
            .ok_or_else(|| Error::Membership(format!("unknown node {target}")))?;
        let local_name = self.local_name().await;
        let message = Message::User {
            data,
            sender: local_name,
        };

        let use_tcp = reliable
            || matches!(&message, Message::User { data, .. } if data.len() > USER_TCP_THRESHOLD);

        if use_tcp {
            let addr: SocketAddr = format!("{}:{}", node.host, node.port)
                .parse()
                .map_err(|err| Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
            let mut stream = TcpLayer::connect(addr).await?;
            let frame = wire::encode(&message, self.config.encryption_key.as_ref())?;
            net::write_frame(&mut stream, &frame).await?;
        } else {
            let addr: SocketAddr = format!("{}:{}", node.host, node.port)
                .parse()
                .map_err(|err| Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
            let datagram = self.build_datagram(&message).await?;
            if let Some(udp) = self.udp.lock().await.as_ref() {
                udp.send_to(&datagram, addr).await?;
            }
        }
        Ok(())
    }

    /// Probe `target`'s liveness, optionally via indirect probing if the
    /// direct probe fails. Returns whether the target was confirmed alive.
    pub async fn ping(&self, target: &str, indirect: bool) -> Result<bool> {
        let node = self
            .node_manager
            .read()
            .await
            .by_name(target)
            .cloned()
            .ok_or_else(|| Error::Membership(format!("unknown node {target}")))?;

        if self.probe_node(&node).await {
            return Ok(true);
        }
        if !indirect {
            return Ok(false);
        }
        Ok(self.probe_node_indirect(&node, self.config.probe_indirect_nodes).await)
    }

    async fn local_name(&self) -> String {
        self.node_manager
            .read()
            .await
            .local_name()
            .unwrap_or_default()
            .to_string()
    }

    async fn local_host_port(&self) -> (String, u16) {
        self.local_addr.lock().await.clone().unwrap_or_default()
    }

    /// Compute the gossip transmit limit: `ceil(log10(n+1)) * retransmitMulti`.
    async fn max_transmits(&self) -> u32 {
        let n = self.node_manager.read().await.len();
        let limit = ((n as f64 + 1.0).log10()).ceil() as u32;
        limit * self.config.retransmit_multi
    }

    /// Encode `primary` and append as much piggy-backed gossip as fits the
    /// 512-byte nominal UDP budget.
    async fn build_datagram(&self, primary: &Message) -> Result<Vec<u8>> {
        let mut buf = wire::encode(primary, self.config.encryption_key.as_ref())?;
        let max_transmits = self.max_transmits().await;
        let max_bytes = UDP_BUDGET_BYTES.saturating_sub(buf.len());
        for payload in self.broadcast.fetch(max_transmits, max_bytes) {
            buf.extend_from_slice(&payload);
        }
        Ok(buf)
    }

    // ---- Probe scheduling ----------------------------------------------

    fn spawn_probe_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.probe_interval);
            loop {
                interval.tick().await;
                if let Some(target) = this.next_probe_target().await {
                    let this = this.clone();
                    tokio::spawn(async move {
                        this.probe_node(&target).await;
                    });
                }
            }
        })
    }

    async fn next_probe_target(&self) -> Option<Node> {
        let manager = self.node_manager.read().await;
        let members = manager.members();
        if members.is_empty() {
            return None;
        }
        let local_name = manager.local_name().map(|s| s.to_string());
        drop(manager);

        let len = members.len();
        let start = self.probe_cursor.load(Ordering::SeqCst) % len;
        for step in 0..len {
            let idx = (start + step) % len;
            let candidate = &members[idx];
            if Some(candidate.name.as_str()) != local_name.as_deref()
                && candidate.status != NodeStatus::Dead
            {
                self.probe_cursor.store((idx + 1) % len, Ordering::SeqCst);
                return Some(candidate.clone());
            }
        }
        self.probe_cursor.store(0, Ordering::SeqCst);
        None
    }

    /// Direct probe: PING, wait `probeTimeout` for ACK; on timeout/NACK,
    /// suspect the target and kick off indirect probing.
    async fn probe_node(&self, target: &Node) -> bool {
        let seq = self.probe_seq.increment();
        let (local_host, local_port) = self.local_host_port().await;
        let local_name = self.local_name().await;

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(seq, tx);

        let message = Message::Ping {
            seq,
            target: target.name.clone(),
            sender: local_name,
            sender_addr: (local_host, local_port),
        };
        if let Err(err) = self.send_to_node(target, &message).await {
            warn!(target = %target.name, error = %err, "probe send failed");
        }

        let resolved = timeout(self.config.probe_timeout, rx).await;
        self.waiters.lock().await.remove(&seq);

        match resolved {
            Ok(Ok(true)) => {
                if target.status == NodeStatus::Suspect {
                    let mut manager = self.node_manager.write().await;
                    manager
                        .on_node_alive(
                            &target.name,
                            target.incarnation,
                            target.host.clone(),
                            target.port,
                            target.metadata.clone(),
                            false,
                        )
                        .await;
                }
                true
            }
            _ => {
                debug!(target = %target.name, "direct probe failed, suspecting and probing indirectly");
                self.node_manager
                    .write()
                    .await
                    .on_node_suspect(&target.name, target.incarnation, "self")
                    .await;
                self.probe_node_indirect(target, self.config.probe_indirect_nodes)
                    .await
            }
        }
    }

    /// Indirect probe: relay through up to `k` random ALIVE peers.
    async fn probe_node_indirect(&self, target: &Node, k: usize) -> bool {
        let relays: Vec<Node> = {
            let manager = self.node_manager.read().await;
            let members = manager.members();
            select_random(k, &members, |candidate| {
                candidate.status == NodeStatus::Alive
                    && candidate.name != target.name
                    && Some(candidate.name.as_str()) != manager.local_name()
            })
            .into_iter()
            .cloned()
            .collect()
        };

        if relays.is_empty() {
            return false;
        }

        let attempts = relays.iter().map(|relay| self.probe_via_relay(relay, target));
        let results = join_all(attempts).await;
        let confirmed = results.into_iter().any(|ok| ok);

        if confirmed {
            // An indirect ACK resolves the target's state the same way a
            // direct ACK does: if it was SUSPECT, restore it to ALIVE.
            if let Some(current) = self.node_manager.read().await.by_name(&target.name).cloned() {
                if current.status == NodeStatus::Suspect {
                    self.node_manager
                        .write()
                        .await
                        .on_node_alive(
                            &current.name,
                            current.incarnation,
                            current.host,
                            current.port,
                            current.metadata,
                            false,
                        )
                        .await;
                }
            }
        }

        confirmed
    }

    async fn probe_via_relay(&self, relay: &Node, target: &Node) -> bool {
        let seq = self.probe_seq.increment();
        let (local_host, local_port) = self.local_host_port().await;
        let local_name = self.local_name().await;

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(seq, tx);

        let message = Message::PingReq {
            seq,
            target: target.name.clone(),
            target_addr: (target.host.clone(), target.port),
            sender: local_name,
            sender_addr: (local_host, local_port),
        };
        if let Err(err) = self.send_to_node(relay, &message).await {
            warn!(relay = %relay.name, error = %err, "indirect probe send failed");
        }

        let resolved = timeout(self.config.probe_timeout, rx).await;
        self.waiters.lock().await.remove(&seq);
        matches!(resolved, Ok(Ok(true)))
    }

    async fn send_to_node(&self, node: &Node, message: &Message) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", node.host, node.port)
            .parse()
            .map_err(|err| Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
        let datagram = self.build_datagram(message).await?;
        let udp = self.udp.lock().await.clone();
        match udp {
            Some(udp) => udp.send_to(&datagram, addr).await,
            None => Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "UDP socket not bound",
            ))),
        }
    }

    async fn send_addr(&self, addr: (String, u16), message: &Message) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", addr.0, addr.1)
            .parse()
            .map_err(|err| Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
        let datagram = self.build_datagram(message).await?;
        let udp = self.udp.lock().await.clone();
        match udp {
            Some(udp) => udp.send_to(&datagram, addr).await,
            None => Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "UDP socket not bound",
            ))),
        }
    }

    // ---- UDP dispatch ----------------------------------------------------

    fn spawn_udp_recv_loop(self: &Arc<Self>, udp: Arc<UdpLayer>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; net::MAX_DATAGRAM_SIZE];
            loop {
                match udp.recv_from(&mut buf).await {
                    Ok((len, _from)) => {
                        this.handle_datagram(&buf[..len]).await;
                    }
                    Err(err) => {
                        error!(error = %err, "UDP recv failed");
                        break;
                    }
                }
            }
        })
    }

    async fn handle_datagram(&self, buf: &[u8]) {
        let messages = wire::decode_all(buf, self.config.encryption_key.as_ref());
        for message in messages {
            self.dispatch_message(message).await;
        }
    }

    async fn dispatch_message(&self, message: Message) {
        match message {
            Message::Alive {
                node,
                incarnation,
                host,
                port,
                metadata,
            } => {
                self.node_manager
                    .write()
                    .await
                    .on_node_alive(&node, incarnation, host, port, metadata, false)
                    .await;
            }
            Message::Suspect {
                node,
                incarnation,
                sender,
            } => {
                self.node_manager
                    .write()
                    .await
                    .on_node_suspect(&node, incarnation, &sender)
                    .await;
            }
            Message::Dead {
                node, incarnation, ..
            } => {
                self.node_manager
                    .write()
                    .await
                    .on_node_dead(&node, incarnation)
                    .await;
            }
            Message::Ping {
                seq,
                target,
                sender_addr,
                ..
            } => {
                let local_name = self.local_name().await;
                if target != local_name {
                    debug!(%target, "PING not addressed to us, dropping");
                    return;
                }
                let ack = Message::Ack {
                    seq,
                    sender: local_name,
                };
                if let Err(err) = self.send_addr(sender_addr, &ack).await {
                    warn!(error = %err, "failed to send ACK");
                }
            }
            Message::PingReq {
                seq,
                target,
                target_addr,
                sender_addr,
                ..
            } => {
                self.handle_ping_req(seq, &target, target_addr, sender_addr).await;
            }
            Message::Ack { seq, .. } => {
                if let Some(tx) = self.waiters.lock().await.remove(&seq) {
                    let _ = tx.send(true);
                }
            }
            Message::Nack { seq, .. } => {
                if let Some(tx) = self.waiters.lock().await.remove(&seq) {
                    let _ = tx.send(false);
                }
            }
            Message::User { data, sender } => {
                self.events.emit(ClusterEvent::User { sender, data }).await;
            }
            Message::Sync { .. } => {
                warn!("SYNC received over UDP, discarding (TCP only)");
            }
        }
    }

    /// Relay a PING-REQ: issue our own PING to the target with a fresh
    /// `seq`, then forward an ACK/NACK carrying the *original* PING-REQ
    /// `seq` back to the requester.
    async fn handle_ping_req(
        &self,
        orig_seq: u64,
        target: &str,
        target_addr: (String, u16),
        requester_addr: (String, u16),
    ) {
        let seq = self.probe_seq.increment();
        let local_name = self.local_name().await;
        let (local_host, local_port) = self.local_host_port().await;

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(seq, tx);

        let ping = Message::Ping {
            seq,
            target: target.to_string(),
            sender: local_name.clone(),
            sender_addr: (local_host, local_port),
        };
        if let Err(err) = self.send_addr(target_addr, &ping).await {
            warn!(error = %err, "relay PING send failed");
        }

        let resolved = timeout(self.config.probe_timeout, rx).await;
        self.waiters.lock().await.remove(&seq);

        let reply = match resolved {
            Ok(Ok(true)) => Message::Ack {
                seq: orig_seq,
                sender: local_name,
            },
            _ => Message::Nack {
                seq: orig_seq,
                sender: local_name,
            },
        };
        if let Err(err) = self.send_addr(requester_addr, &reply).await {
            warn!(error = %err, "failed to forward indirect-probe result");
        }
    }

    // ---- TCP sync ---------------------------------------------------------

    fn spawn_tcp_accept_loop(self: &Arc<Self>, tcp: Arc<TcpLayer>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match tcp.accept().await {
                    Ok((mut stream, _addr)) => {
                        let this = this.clone();
                        tokio::spawn(async move {
                            if let Err(err) = this.handle_inbound_sync(&mut stream).await {
                                debug!(error = %err, "inbound sync connection closed with error");
                            }
                        });
                    }
                    Err(err) => {
                        error!(error = %err, "TCP accept failed");
                        break;
                    }
                }
            }
        })
    }

    async fn handle_inbound_sync(&self, stream: &mut tokio::net::TcpStream) -> Result<()> {
        let frame = net::read_frame(stream).await?;
        let (message, _) = wire::decode_one(&frame, self.config.encryption_key.as_ref())?;
        match message {
            Message::Sync { nodes } => {
                self.merge_sync_entries(nodes).await;
                let reply = Message::Sync {
                    nodes: self.local_sync_snapshot().await,
                };
                let reply_frame = wire::encode(&reply, self.config.encryption_key.as_ref())?;
                net::write_frame(stream, &reply_frame).await?;
            }
            Message::User { data, sender } => {
                self.events.emit(ClusterEvent::User { sender, data }).await;
            }
            other => {
                warn!(?other, "unexpected message kind on inbound TCP connection");
            }
        }
        Ok(())
    }

    /// Open (or, in this implementation, freshly establish) a TCP stream
    /// to `host:port`, send the full local state, read one SYNC reply, and
    /// merge it. The client side of this exchange never replies.
    async fn sync_host(&self, host: &str, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|err| Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
        let mut stream = TcpLayer::connect(addr).await?;

        let outgoing = Message::Sync {
            nodes: self.local_sync_snapshot().await,
        };
        let frame = wire::encode(&outgoing, self.config.encryption_key.as_ref())?;
        net::write_frame(&mut stream, &frame).await?;

        let reply_frame = net::read_frame(&mut stream).await?;
        let (reply, _) = wire::decode_one(&reply_frame, self.config.encryption_key.as_ref())?;
        if let Message::Sync { nodes } = reply {
            self.merge_sync_entries(nodes).await;
        }
        Ok(())
    }

    /// Periodic sync: pick one random non-DEAD non-local node out of up to
    /// `syncNodes` candidates and perform a full-state exchange.
    fn spawn_sync_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.sync_interval);
            loop {
                interval.tick().await;
                let target = {
                    let manager = this.node_manager.read().await;
                    let members = manager.members();
                    select_random(this.config.sync_nodes, &members, |candidate| {
                        candidate.status != NodeStatus::Dead
                            && Some(candidate.name.as_str()) != manager.local_name()
                    })
                    .into_iter()
                    .next()
                    .cloned()
                };
                if let Some(target) = target {
                    if let Err(err) = this.sync_host(&target.host, target.port).await {
                        debug!(target = %target.name, error = %err, "periodic sync failed");
                    }
                }
            }
        })
    }

    async fn local_sync_snapshot(&self) -> Vec<SyncEntry> {
        self.node_manager
            .read()
            .await
            .members()
            .into_iter()
            .map(|node| SyncEntry {
                node: node.name,
                host: node.host,
                port: node.port,
                version: node.version,
                incarnation: node.incarnation,
                status: node.status,
                metadata: node.metadata,
            })
            .collect()
    }

    /// Merge each remote entry via the alive/suspect/dead pathway. A
    /// remote DEAD is deliberately downgraded to SUSPECT to force local
    /// re-verification rather than accepting an unverified kill.
    async fn merge_sync_entries(&self, entries: Vec<SyncEntry>) {
        let mut manager = self.node_manager.write().await;
        for entry in entries {
            match entry.status {
                NodeStatus::Alive => {
                    manager
                        .on_node_alive(
                            &entry.node,
                            entry.incarnation,
                            entry.host,
                            entry.port,
                            entry.metadata,
                            false,
                        )
                        .await;
                }
                NodeStatus::Suspect => {
                    manager
                        .on_node_suspect(&entry.node, entry.incarnation, "sync")
                        .await;
                }
                NodeStatus::Dead => {
                    manager
                        .on_node_suspect(&entry.node, entry.incarnation, "sync")
                        .await;
                }
            }
        }
    }
}
