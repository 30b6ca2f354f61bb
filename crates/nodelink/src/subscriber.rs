// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber side: dial a publisher and read its channel.

use crate::address::{Address, NodeAddress, Port};
use crate::config::SubscriberConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::io;
use crate::transport::TransportProvider;

/// Dial the publisher at `(node, port)`.
///
/// The node must fit the node field and the port must be a bindable service
/// port; both are checked before the transport is called.
pub fn subscriber_connect<T>(
    transport: &T,
    node: NodeAddress,
    port: Port,
) -> Result<Connection<T::Conn>>
where
    T: TransportProvider + ?Sized,
{
    if !node.is_valid() {
        return Err(Error::InvalidNode(node));
    }
    if !port.is_bindable() {
        return Err(Error::InvalidPort(port));
    }

    let handle = transport.connect(node, port).map_err(|e| {
        log::debug!("[subscriber] connect to {}:{} failed: {}", node, port, e);
        Error::from(e)
    })?;
    log::debug!("[subscriber] connected to {}:{}", node, port);

    Ok(Connection::connected(handle))
}

/// A subscriber holding one dialed connection to a publisher.
///
/// Reads are filtered on the publisher's port.
pub struct Subscriber<T: TransportProvider> {
    transport: T,
    publisher: Address,
    conn: Connection<T::Conn>,
}

impl<T: TransportProvider> Subscriber<T> {
    /// Dial the publisher named in `config`.
    pub fn connect(transport: T, config: &SubscriberConfig) -> Result<Self> {
        config.validate().map_err(Error::InvalidConfig)?;
        let publisher = config.publisher;
        let conn = subscriber_connect(&transport, publisher.node, publisher.port)?;
        Ok(Self {
            transport,
            publisher,
            conn,
        })
    }

    /// Wait for the next packet from the publisher's channel.
    ///
    /// Returns the number of bytes copied into `buf`.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        io::subscriber_read(&self.transport, &self.conn, buf, self.publisher.port)
    }

    /// Send `data` back to the publisher.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        io::send(&self.transport, &self.conn, data)
    }

    /// Address this subscriber dialed.
    pub fn publisher(&self) -> Address {
        self.publisher
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Connection<T::Conn> {
        &self.conn
    }

    /// Transport used by this subscriber.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::transport::{LoopbackNetwork, TransportError};

    #[test]
    fn test_connect_rejects_bad_address() {
        let network = LoopbackNetwork::default();
        let node = network.node(NodeAddress::new(1));

        assert_eq!(
            subscriber_connect(&node, NodeAddress::new(40), Port::new(12)).unwrap_err(),
            Error::InvalidNode(NodeAddress::new(40))
        );
        assert_eq!(
            subscriber_connect(&node, NodeAddress::new(11), Port::new(45)).unwrap_err(),
            Error::InvalidPort(Port::new(45))
        );
        assert_eq!(network.stats().connections, 0);
    }

    #[test]
    fn test_connect_refused_without_listener() {
        let network = LoopbackNetwork::default();
        let node = network.node(NodeAddress::new(1));

        let err = subscriber_connect(&node, NodeAddress::new(11), Port::new(12)).unwrap_err();
        assert_eq!(
            err,
            Error::Transport(TransportError::ConnectionRefused(Address::new(
                NodeAddress::new(11),
                Port::new(12)
            )))
        );
    }

    #[test]
    fn test_subscriber_connects() {
        let network = LoopbackNetwork::default();
        let obc = network.node(NodeAddress::new(11));
        let _endpoint = crate::server::server_setup(&obc, Port::new(12), 1).expect("setup");

        let config = SubscriberConfig::new(NodeAddress::new(11), Port::new(12));
        let sub = Subscriber::connect(network.node(NodeAddress::new(1)), &config).expect("connect");
        assert_eq!(sub.connection().state(), ConnectionState::Connected);
        assert!(sub.connection().is_established());
        assert_eq!(sub.publisher().to_string(), "11:12");
    }
}
