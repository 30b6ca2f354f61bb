// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback transport.
//!
//! A [`LoopbackNetwork`] simulates a node-addressed, connection-oriented
//! network inside one process. Each node gets a [`LoopbackTransport`] view
//! via [`LoopbackNetwork::node`]; all views share the port table, so a
//! publisher on node 11 and a subscriber on node 1 can run on separate
//! threads and talk through real blocking calls.
//!
//! ```text
//!  node 1 (dialer)                                node 11 (listener)
//!  +----------------+   to_acceptor (unbounded)   +----------------+
//!  | LoopbackConn   | --------------------------> | LoopbackConn   |
//!  | local  1:32    | <-------------------------- | local  11:12   |
//!  | remote 11:12   |   to_dialer   (unbounded)   | remote 1:32    |
//!  +----------------+                             +----------------+
//!                           ^
//!          connect() queues | the acceptor side in the
//!                           | listener backlog (bounded)
//! ```
//!
//! Closing either side takes both senders, so blocked readers on both ends
//! wake up, drain what was queued, then see `ConnectionClosed`. Dropping the
//! last handle of either side closes the link the same way; this includes
//! connections still queued in the backlog of a dropped listener.
//!
//! A dialer holds its ephemeral port until its last handle is dropped. When
//! every ephemeral port of a node is held, `connect` fails with
//! `SocketUnavailable`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use super::{TransportError, TransportProvider, TransportResult};
use crate::address::{Address, NodeAddress, Port, MAX_PORT};
use crate::config::LoopbackConfig;

// ============================================================================
// Statistics
// ============================================================================

/// Network-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    /// Connections handed to a listener backlog
    pub connections: u64,

    /// Connection attempts refused (no listener or backlog full)
    pub refused: u64,

    /// Packets queued by `send`
    pub packets_sent: u64,

    /// Payload bytes queued by `send`
    pub bytes_sent: u64,

    /// Packets returned by `read`
    pub packets_received: u64,

    /// Bytes returned by `read` (after truncation)
    pub bytes_received: u64,
}

// ============================================================================
// Network
// ============================================================================

struct Binding {
    socket_id: u64,
    backlog: Option<Sender<LoopbackConn>>,
}

#[derive(Default)]
struct EphemeralPorts {
    cursor: HashMap<NodeAddress, u8>,
    leased: HashSet<Address>,
}

struct NetworkInner {
    config: LoopbackConfig,
    bindings: Mutex<HashMap<Address, Binding>>,
    ephemeral: Mutex<EphemeralPorts>,
    next_id: AtomicU64,
    stats: Mutex<LoopbackStats>,
}

impl NetworkInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Lease the next free ephemeral port of `node`, round-robin.
    fn lease_ephemeral(self: &Arc<Self>, node: NodeAddress) -> TransportResult<PortLease> {
        let first = Port::EPHEMERAL_START.value();
        let mut ephemeral = self.ephemeral.lock();
        let EphemeralPorts { cursor, leased } = &mut *ephemeral;
        let slot = cursor.entry(node).or_insert(first);

        for _ in first..=MAX_PORT {
            let address = Address::new(node, Port::new(*slot));
            *slot = if *slot >= MAX_PORT { first } else { *slot + 1 };
            if leased.insert(address) {
                return Ok(PortLease {
                    network: Arc::clone(self),
                    address,
                });
            }
        }
        Err(TransportError::SocketUnavailable)
    }
}

/// Ephemeral port held by a dialer, released on drop.
struct PortLease {
    network: Arc<NetworkInner>,
    address: Address,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.network.ephemeral.lock().leased.remove(&self.address);
    }
}

/// Shared in-process network.
#[derive(Clone)]
pub struct LoopbackNetwork {
    inner: Arc<NetworkInner>,
}

impl LoopbackNetwork {
    /// Create an empty network.
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                config,
                bindings: Mutex::new(HashMap::new()),
                ephemeral: Mutex::new(EphemeralPorts::default()),
                next_id: AtomicU64::new(1),
                stats: Mutex::new(LoopbackStats::default()),
            }),
        }
    }

    /// Transport view for one node.
    pub fn node(&self, address: NodeAddress) -> LoopbackTransport {
        LoopbackTransport {
            network: Arc::clone(&self.inner),
            node: address,
        }
    }

    /// Snapshot of the network counters.
    pub fn stats(&self) -> LoopbackStats {
        self.inner.stats.lock().clone()
    }

    /// Network configuration.
    pub fn config(&self) -> &LoopbackConfig {
        &self.inner.config
    }
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl fmt::Debug for LoopbackNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackNetwork")
            .field("config", &self.inner.config)
            .field("bindings", &self.inner.bindings.lock().len())
            .finish()
    }
}

// ============================================================================
// Socket
// ============================================================================

struct SocketInner {
    id: u64,
    node: NodeAddress,
    network: Arc<NetworkInner>,
    state: Mutex<SocketState>,
}

#[derive(Default)]
struct SocketState {
    port: Option<Port>,
    accept_rx: Option<Receiver<LoopbackConn>>,
}

impl Drop for SocketInner {
    fn drop(&mut self) {
        let port = self.state.get_mut().port;
        if let Some(port) = port {
            let address = Address::new(self.node, port);
            let mut bindings = self.network.bindings.lock();
            if bindings.get(&address).map(|b| b.socket_id) == Some(self.id) {
                bindings.remove(&address);
                log::debug!("[loopback] released {}", address);
            }
        }
    }
}

/// Socket handle of the loopback transport.
pub struct LoopbackSocket(Arc<SocketInner>);

impl LoopbackSocket {
    /// Bound address, if any.
    pub fn local(&self) -> Option<Address> {
        self.0.state.lock().port.map(|port| Address::new(self.0.node, port))
    }
}

impl fmt::Debug for LoopbackSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackSocket")
            .field("id", &self.0.id)
            .field("local", &self.local())
            .finish()
    }
}

// ============================================================================
// Connection
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Acceptor,
    Dialer,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Acceptor => write!(f, "acceptor"),
            Side::Dialer => write!(f, "dialer"),
        }
    }
}

struct Link {
    to_acceptor: Mutex<Option<Sender<Vec<u8>>>>,
    to_dialer: Mutex<Option<Sender<Vec<u8>>>>,
}

impl Link {
    fn outbox(&self, side: Side) -> &Mutex<Option<Sender<Vec<u8>>>> {
        match side {
            Side::Acceptor => &self.to_dialer,
            Side::Dialer => &self.to_acceptor,
        }
    }

    fn close(&self) {
        self.to_acceptor.lock().take();
        self.to_dialer.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.to_acceptor.lock().is_none() || self.to_dialer.lock().is_none()
    }
}

struct ConnInner {
    id: u64,
    side: Side,
    local: Address,
    remote: Address,
    inbox: Receiver<Vec<u8>>,
    link: Arc<Link>,
    // Dialer side only.
    _lease: Option<PortLease>,
}

impl Drop for ConnInner {
    fn drop(&mut self) {
        if !self.link.is_closed() {
            self.link.close();
            log::debug!(
                "[loopback] {} side of {} <-> {} dropped, link closed",
                self.side,
                self.local,
                self.remote
            );
        }
    }
}

/// Connection handle of the loopback transport.
///
/// Clones refer to the same connection.
#[derive(Clone)]
pub struct LoopbackConn(Arc<ConnInner>);

impl LoopbackConn {
    /// Address of this side.
    pub fn local(&self) -> Address {
        self.0.local
    }

    /// Address of the other side.
    pub fn remote(&self) -> Address {
        self.0.remote
    }

    /// Check if the connection was closed by either side.
    pub fn is_closed(&self) -> bool {
        self.0.link.is_closed()
    }
}

impl PartialEq for LoopbackConn {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for LoopbackConn {}

impl fmt::Debug for LoopbackConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackConn")
            .field("id", &self.0.id)
            .field("side", &self.0.side)
            .field("local", &self.0.local)
            .field("remote", &self.0.remote)
            .finish()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One node's view of a [`LoopbackNetwork`].
#[derive(Clone)]
pub struct LoopbackTransport {
    network: Arc<NetworkInner>,
    node: NodeAddress,
}

impl LoopbackTransport {
    /// Address of this node.
    pub fn node(&self) -> NodeAddress {
        self.node
    }

    /// Snapshot of the network counters.
    pub fn stats(&self) -> LoopbackStats {
        self.network.stats.lock().clone()
    }

    /// Tear the connection down for both sides.
    pub fn close(&self, conn: &LoopbackConn) {
        conn.0.link.close();
        log::debug!(
            "[loopback] closed {} <-> {}",
            conn.0.local,
            conn.0.remote
        );
    }
}

impl fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("node", &self.node)
            .finish()
    }
}

impl TransportProvider for LoopbackTransport {
    type Socket = LoopbackSocket;
    type Conn = LoopbackConn;

    fn create_socket(&self) -> TransportResult<LoopbackSocket> {
        Ok(LoopbackSocket(Arc::new(SocketInner {
            id: self.network.next_id(),
            node: self.node,
            network: Arc::clone(&self.network),
            state: Mutex::new(SocketState::default()),
        })))
    }

    fn bind(&self, socket: &LoopbackSocket, port: Port) -> TransportResult<()> {
        if !port.is_valid() {
            return Err(TransportError::Io(format!("port {} out of range", port)));
        }

        let mut state = socket.0.state.lock();
        if let Some(bound) = state.port {
            return Err(TransportError::Io(format!("socket already bound to {}", bound)));
        }

        let address = Address::new(socket.0.node, port);
        let mut bindings = self.network.bindings.lock();
        if bindings.contains_key(&address) {
            return Err(TransportError::PortInUse(port));
        }
        bindings.insert(
            address,
            Binding {
                socket_id: socket.0.id,
                backlog: None,
            },
        );
        state.port = Some(port);

        log::debug!("[loopback] bound {}", address);
        Ok(())
    }

    fn listen(&self, socket: &LoopbackSocket, backlog: usize) -> TransportResult<()> {
        let mut state = socket.0.state.lock();
        let port = state.port.ok_or(TransportError::NotBound)?;
        let address = Address::new(socket.0.node, port);

        let (tx, rx) = channel::bounded(backlog.max(1));
        let mut bindings = self.network.bindings.lock();
        match bindings.get_mut(&address) {
            Some(binding) if binding.socket_id == socket.0.id => binding.backlog = Some(tx),
            _ => return Err(TransportError::NotBound),
        }
        state.accept_rx = Some(rx);

        log::debug!("[loopback] listening on {} (backlog {})", address, backlog.max(1));
        Ok(())
    }

    fn accept(&self, socket: &LoopbackSocket) -> TransportResult<LoopbackConn> {
        let rx = {
            let state = socket.0.state.lock();
            if state.port.is_none() {
                return Err(TransportError::NotBound);
            }
            state.accept_rx.clone().ok_or(TransportError::NotListening)?
        };

        match self.network.config.accept_timeout() {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => TransportError::Timeout,
                RecvTimeoutError::Disconnected => TransportError::NotListening,
            }),
            None => rx.recv().map_err(|_| TransportError::NotListening),
        }
    }

    fn connect(&self, node: NodeAddress, port: Port) -> TransportResult<LoopbackConn> {
        let target = Address::new(node, port);
        let backlog = {
            let bindings = self.network.bindings.lock();
            bindings.get(&target).and_then(|b| b.backlog.clone())
        };
        let Some(backlog) = backlog else {
            self.network.stats.lock().refused += 1;
            return Err(TransportError::ConnectionRefused(target));
        };

        let lease = match self.network.lease_ephemeral(self.node) {
            Ok(lease) => lease,
            Err(e) => {
                log::debug!("[loopback] no ephemeral port left on node {}", self.node);
                return Err(e);
            }
        };
        let local = lease.address;
        let (to_acceptor, acceptor_inbox) = channel::unbounded();
        let (to_dialer, dialer_inbox) = channel::unbounded();
        let link = Arc::new(Link {
            to_acceptor: Mutex::new(Some(to_acceptor)),
            to_dialer: Mutex::new(Some(to_dialer)),
        });

        let dialer = LoopbackConn(Arc::new(ConnInner {
            id: self.network.next_id(),
            side: Side::Dialer,
            local,
            remote: target,
            inbox: dialer_inbox,
            link: Arc::clone(&link),
            _lease: Some(lease),
        }));
        let acceptor = LoopbackConn(Arc::new(ConnInner {
            id: self.network.next_id(),
            side: Side::Acceptor,
            local: target,
            remote: local,
            inbox: acceptor_inbox,
            link,
            _lease: None,
        }));

        match backlog.try_send(acceptor) {
            Ok(()) => {
                self.network.stats.lock().connections += 1;
                log::debug!("[loopback] {} -> {} queued", local, target);
                Ok(dialer)
            }
            Err(TrySendError::Full(_)) => {
                self.network.stats.lock().refused += 1;
                Err(TransportError::BacklogFull(target))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.network.stats.lock().refused += 1;
                Err(TransportError::ConnectionRefused(target))
            }
        }
    }

    fn send(&self, conn: &LoopbackConn, data: &[u8]) -> TransportResult<()> {
        let mtu = self.network.config.mtu;
        if data.len() > mtu {
            return Err(TransportError::MessageTooLarge {
                size: data.len(),
                mtu,
            });
        }

        let outbox = conn.0.link.outbox(conn.0.side).lock();
        let tx = outbox.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed)?;
        drop(outbox);

        let mut stats = self.network.stats.lock();
        stats.packets_sent += 1;
        stats.bytes_sent += data.len() as u64;
        Ok(())
    }

    fn read(&self, conn: &LoopbackConn, max_len: usize) -> TransportResult<Vec<u8>> {
        let mut packet = match self.network.config.read_timeout() {
            Some(timeout) => conn.0.inbox.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => TransportError::Timeout,
                RecvTimeoutError::Disconnected => TransportError::ConnectionClosed,
            })?,
            None => conn
                .0
                .inbox
                .recv()
                .map_err(|_| TransportError::ConnectionClosed)?,
        };
        packet.truncate(max_len);

        let mut stats = self.network.stats.lock();
        stats.packets_received += 1;
        stats.bytes_received += packet.len() as u64;
        Ok(packet)
    }

    fn destination_port(&self, conn: &LoopbackConn) -> Port {
        conn.0.local.port
    }

    fn source_port(&self, conn: &LoopbackConn) -> Port {
        conn.0.remote.port
    }
}
