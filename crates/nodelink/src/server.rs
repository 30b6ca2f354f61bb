// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher side: listening endpoints and subscriber fan-out.
//!
//! ```text
//! server_setup(port, backlog)
//!     create_socket -> bind(port) -> listen(backlog)
//!          |
//!          v
//! ListeningEndpoint --server_accept--> Connection (Accepted)   one per subscriber
//!                   --server_accept--> Connection (Accepted)
//!                   ...
//! ```
//!
//! [`Publisher`] wraps the sequence above and keeps the accepted connections
//! so it can broadcast to all of them.

use crate::address::Port;
use crate::config::PublisherConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::io;
use crate::transport::TransportProvider;

// ============================================================================
// Listening endpoint
// ============================================================================

/// A bound, listening transport socket.
///
/// Only [`server_setup`] creates one, so an endpoint always refers to a
/// socket that was created, bound and put into listening state. Dropping it
/// drops the handle; closing the socket is the transport's business.
#[derive(Debug)]
pub struct ListeningEndpoint<S> {
    socket: S,
    port: Port,
    backlog: usize,
}

impl<S> ListeningEndpoint<S> {
    /// Transport socket handle.
    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Port the endpoint is bound to.
    pub fn port(&self) -> Port {
        self.port
    }

    /// Backlog requested at setup.
    pub fn backlog(&self) -> usize {
        self.backlog
    }
}

/// Create a socket, bind it to `port` and listen with `backlog`.
///
/// Any failing step aborts the sequence; the half-built socket is dropped
/// and never handed to the caller.
pub fn server_setup<T>(
    transport: &T,
    port: Port,
    backlog: usize,
) -> Result<ListeningEndpoint<T::Socket>>
where
    T: TransportProvider + ?Sized,
{
    if !port.is_bindable() {
        return Err(Error::InvalidPort(port));
    }

    let socket = transport.create_socket()?;
    transport.bind(&socket, port).map_err(|e| {
        log::debug!("[server] bind to port {} failed: {}", port, e);
        Error::from(e)
    })?;
    transport.listen(&socket, backlog).map_err(|e| {
        log::debug!("[server] listen on port {} failed: {}", port, e);
        Error::from(e)
    })?;

    log::debug!("[server] listening on port {} (backlog {})", port, backlog);
    Ok(ListeningEndpoint {
        socket,
        port,
        backlog,
    })
}

/// Wait for one subscriber to connect to `endpoint`.
///
/// Call repeatedly, once per subscriber to serve.
pub fn server_accept<T>(
    transport: &T,
    endpoint: &ListeningEndpoint<T::Socket>,
) -> Result<Connection<T::Conn>>
where
    T: TransportProvider + ?Sized,
{
    let handle = transport.accept(&endpoint.socket).map_err(|e| {
        log::debug!("[server] accept on port {} failed: {}", endpoint.port, e);
        Error::from(e)
    })?;
    log::debug!("[server] accepted subscriber on port {}", endpoint.port);

    Ok(Connection::accepted(handle))
}

// ============================================================================
// Publisher
// ============================================================================

/// Outcome of [`Publisher::broadcast`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that took the message
    pub delivered: usize,

    /// `(index, error)` for each failed subscriber, indices as before the call
    pub failed: Vec<(usize, Error)>,

    /// Subscribers forgotten because their send failed
    pub dropped: usize,
}

impl BroadcastReport {
    /// Check if every subscriber took the message.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A publisher serving any number of subscribers from one endpoint.
pub struct Publisher<T: TransportProvider> {
    transport: T,
    config: PublisherConfig,
    endpoint: ListeningEndpoint<T::Socket>,
    subscribers: Vec<Connection<T::Conn>>,
}

impl<T: TransportProvider> Publisher<T> {
    /// Set up the listening endpoint described by `config`.
    pub fn bind(transport: T, config: PublisherConfig) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfig)?;
        let endpoint = server_setup(&transport, config.port, config.backlog)?;
        Ok(Self {
            transport,
            config,
            endpoint,
            subscribers: Vec::new(),
        })
    }

    /// Block until the next subscriber connects; returns its index.
    pub fn accept_subscriber(&mut self) -> Result<usize> {
        if let Some(max) = self.config.max_subscribers {
            if self.subscribers.len() >= max {
                return Err(Error::SubscriberLimit(max));
            }
        }

        let conn = server_accept(&self.transport, &self.endpoint)?;
        self.subscribers.push(conn);
        Ok(self.subscribers.len() - 1)
    }

    /// Send `data` to every accepted subscriber.
    ///
    /// An empty payload is rejected up front. Per-subscriber failures are
    /// collected in the report rather than aborting the fan-out.
    pub fn broadcast(&mut self, data: &[u8]) -> Result<BroadcastReport> {
        if data.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let mut report = BroadcastReport::default();
        for (index, conn) in self.subscribers.iter().enumerate() {
            match io::send(&self.transport, conn, data) {
                Ok(()) => report.delivered += 1,
                Err(e) => report.failed.push((index, e)),
            }
        }

        if self.config.drop_failed_subscribers && !report.failed.is_empty() {
            // Remove from the back so earlier indices stay valid.
            for (index, e) in report.failed.iter().rev() {
                log::warn!(
                    "[server] dropping subscriber {} on port {}: {}",
                    index,
                    self.endpoint.port,
                    e
                );
                self.subscribers.remove(*index);
                report.dropped += 1;
            }
        }

        Ok(report)
    }

    /// Send `data` to one subscriber.
    pub fn send_to(&self, index: usize, data: &[u8]) -> Result<()> {
        let conn = self.subscriber(index)?;
        io::send(&self.transport, conn, data)
    }

    /// Read the next packet a subscriber sent to the publisher's port.
    pub fn read_from(&self, index: usize, buf: &mut [u8]) -> Result<usize> {
        let conn = self.subscriber(index)?;
        io::publisher_read(&self.transport, conn, buf, self.endpoint.port)
    }

    /// Forget a subscriber and hand back its connection.
    ///
    /// What dropping the returned connection does is up to the transport;
    /// the loopback transport closes the link.
    pub fn remove_subscriber(&mut self, index: usize) -> Result<Connection<T::Conn>> {
        if index >= self.subscribers.len() {
            return Err(Error::UnknownSubscriber(index));
        }
        Ok(self.subscribers.remove(index))
    }

    /// Number of accepted subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Accepted subscriber connections, in accept order.
    pub fn subscribers(&self) -> &[Connection<T::Conn>] {
        &self.subscribers
    }

    /// Listening endpoint.
    pub fn endpoint(&self) -> &ListeningEndpoint<T::Socket> {
        &self.endpoint
    }

    /// Publisher configuration.
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Transport used by this publisher.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn subscriber(&self, index: usize) -> Result<&Connection<T::Conn>> {
        self.subscribers
            .get(index)
            .ok_or(Error::UnknownSubscriber(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NodeAddress;
    use crate::connection::ConnectionState;
    use crate::subscriber::subscriber_connect;
    use crate::transport::{LoopbackNetwork, TransportError};

    const OBC: NodeAddress = NodeAddress::new(11);
    const GROUND: NodeAddress = NodeAddress::new(1);

    #[test]
    fn test_setup_rejects_ephemeral_port() {
        let network = LoopbackNetwork::default();
        let node = network.node(OBC);

        let err = server_setup(&node, Port::new(33), 1).unwrap_err();
        assert_eq!(err, Error::InvalidPort(Port::new(33)));
    }

    #[test]
    fn test_setup_port_in_use() {
        let network = LoopbackNetwork::default();
        let node = network.node(OBC);

        let endpoint = server_setup(&node, Port::new(12), 1).expect("setup");
        assert_eq!(endpoint.port(), Port::new(12));
        assert_eq!(endpoint.backlog(), 1);

        let err = server_setup(&node, Port::new(12), 1).unwrap_err();
        assert_eq!(err, Error::Transport(TransportError::PortInUse(Port::new(12))));

        // Same port on another node is fine.
        assert!(server_setup(&network.node(GROUND), Port::new(12), 1).is_ok());
    }

    #[test]
    fn test_accept_tags_connection() {
        let network = LoopbackNetwork::default();
        let obc = network.node(OBC);
        let ground = network.node(GROUND);

        let endpoint = server_setup(&obc, Port::new(12), 2).expect("setup");
        let _dialed = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");
        let accepted = server_accept(&obc, &endpoint).expect("accept");

        assert_eq!(accepted.state(), ConnectionState::Accepted);
        assert!(accepted.is_established());
    }

    #[test]
    fn test_publisher_subscriber_limit() {
        let network = LoopbackNetwork::default();
        let config = PublisherConfig {
            port: Port::new(12),
            backlog: 4,
            max_subscribers: Some(1),
            ..Default::default()
        };
        let mut publisher = Publisher::bind(network.node(OBC), config).expect("bind");

        let ground = network.node(GROUND);
        let _a = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");
        let _b = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");

        assert_eq!(publisher.accept_subscriber().expect("accept"), 0);
        assert_eq!(publisher.accept_subscriber(), Err(Error::SubscriberLimit(1)));
        assert_eq!(publisher.subscriber_count(), 1);
    }

    #[test]
    fn test_broadcast_drops_closed_subscriber() {
        let network = LoopbackNetwork::default();
        let config = PublisherConfig {
            port: Port::new(12),
            backlog: 4,
            ..Default::default()
        };
        let mut publisher = Publisher::bind(network.node(OBC), config).expect("bind");

        let ground = network.node(GROUND);
        let first = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");
        let _second = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");
        publisher.accept_subscriber().expect("accept");
        publisher.accept_subscriber().expect("accept");

        ground.close(first.handle().expect("handle"));

        let report = publisher.broadcast(b"beacon").expect("broadcast");
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 0);
        assert!(!report.is_complete());
        assert_eq!(publisher.subscriber_count(), 1);

        assert_eq!(publisher.broadcast(&[]), Err(Error::EmptyPayload));
    }

    #[test]
    fn test_broadcast_keeps_failed_subscriber() {
        let network = LoopbackNetwork::default();
        let config = PublisherConfig {
            port: Port::new(12),
            backlog: 4,
            drop_failed_subscribers: false,
            ..Default::default()
        };
        let mut publisher = Publisher::bind(network.node(OBC), config).expect("bind");

        let ground = network.node(GROUND);
        let first = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");
        let second = subscriber_connect(&ground, OBC, Port::new(12)).expect("connect");
        publisher.accept_subscriber().expect("accept");
        publisher.accept_subscriber().expect("accept");

        ground.close(second.handle().expect("handle"));

        let report = publisher.broadcast(b"beacon").expect("broadcast");
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 0);
        assert_eq!(
            report.failed,
            vec![(1, Error::Transport(TransportError::ConnectionClosed))]
        );
        assert_eq!(publisher.subscriber_count(), 2);

        // Still listed, still failing.
        let report = publisher.broadcast(b"beacon").expect("broadcast");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(publisher.subscriber_count(), 2);

        let mut buf = [0u8; 16];
        let n = crate::io::subscriber_read(&ground, &first, &mut buf, Port::new(12))
            .expect("read");
        assert_eq!(&buf[..n], b"beacon");
    }

    #[test]
    fn test_unknown_subscriber() {
        let network = LoopbackNetwork::default();
        let mut publisher =
            Publisher::bind(network.node(OBC), PublisherConfig::default()).expect("bind");

        let mut buf = [0u8; 4];
        assert_eq!(publisher.read_from(3, &mut buf), Err(Error::UnknownSubscriber(3)));
        assert_eq!(publisher.send_to(0, b"x"), Err(Error::UnknownSubscriber(0)));
        assert!(publisher.remove_subscriber(0).is_err());
    }

    #[test]
    fn test_bind_rejects_invalid_config() {
        let network = LoopbackNetwork::default();
        let config = PublisherConfig {
            port: Port::new(50),
            ..Default::default()
        };
        assert!(matches!(
            Publisher::bind(network.node(OBC), config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
