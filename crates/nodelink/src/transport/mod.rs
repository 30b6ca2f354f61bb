// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction for nodelink
//!
//! Defines the connection-oriented primitives the pub/sub layer is built on.
//! Implementations can sit on top of:
//! - A radio link stack (UHF/S-band, CAN, I2C)
//! - A serial line (KISS framing)
//! - The in-process [`loopback`] network
//!
//! ## Design Principles
//!
//! - **Blocking I/O** - `accept`, `connect` and `read` block the caller
//! - **Transport-owned lifetimes** - sockets and connections are handles;
//!   allocation and teardown stay with the implementation
//! - **No retries** - every failure is reported once, verbatim

use std::fmt;
use std::sync::Arc;

use crate::address::{Address, NodeAddress, Port};

pub mod loopback;

pub use loopback::{LoopbackConn, LoopbackNetwork, LoopbackSocket, LoopbackStats, LoopbackTransport};

/// Result type for transport primitives
pub type TransportResult<T> = core::result::Result<T, TransportError>;

/// Failure reported by a transport primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No socket could be allocated
    SocketUnavailable,

    /// Another endpoint already holds this port on the node
    PortInUse(Port),

    /// Socket used before `bind`
    NotBound,

    /// Socket used for `accept` before `listen`
    NotListening,

    /// Nothing listens at the address
    ConnectionRefused(Address),

    /// Listener queue is full
    BacklogFull(Address),

    /// Connection was torn down
    ConnectionClosed,

    /// Payload exceeds the transport MTU
    MessageTooLarge {
        /// Payload size in bytes
        size: usize,
        /// Transport MTU in bytes
        mtu: usize,
    },

    /// Blocking call expired
    Timeout,

    /// Driver-level failure
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketUnavailable => write!(f, "no socket available"),
            Self::PortInUse(port) => write!(f, "port {} already in use", port),
            Self::NotBound => write!(f, "socket not bound"),
            Self::NotListening => write!(f, "socket not listening"),
            Self::ConnectionRefused(addr) => write!(f, "connection refused by {}", addr),
            Self::BacklogFull(addr) => write!(f, "backlog full at {}", addr),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::MessageTooLarge { size, mtu } => {
                write!(f, "message of {} bytes exceeds MTU {}", size, mtu)
            }
            Self::Timeout => write!(f, "operation timed out"),
            Self::Io(s) => write!(f, "I/O error: {}", s),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Connection-oriented, node-addressed transport.
///
/// Port queries follow the incoming-packet view of a connection: on an
/// accepted connection `destination_port` is the listening port, on a
/// dialed connection `source_port` is the remote service port.
pub trait TransportProvider {
    /// Listening endpoint handle
    type Socket;

    /// Connection handle; clones refer to the same transport connection
    type Conn: Clone;

    /// Allocate an unbound socket.
    fn create_socket(&self) -> TransportResult<Self::Socket>;

    /// Bind the socket to a local port.
    fn bind(&self, socket: &Self::Socket, port: Port) -> TransportResult<()>;

    /// Start accepting, queueing at most `backlog` pending connections.
    fn listen(&self, socket: &Self::Socket, backlog: usize) -> TransportResult<()>;

    /// Wait for one inbound connection (blocking).
    fn accept(&self, socket: &Self::Socket) -> TransportResult<Self::Conn>;

    /// Dial `(node, port)` (blocking).
    fn connect(&self, node: NodeAddress, port: Port) -> TransportResult<Self::Conn>;

    /// Transmit one packet on the connection.
    fn send(&self, conn: &Self::Conn, data: &[u8]) -> TransportResult<()>;

    /// Wait for one packet, truncated to `max_len` bytes (blocking).
    fn read(&self, conn: &Self::Conn, max_len: usize) -> TransportResult<Vec<u8>>;

    /// Destination port of packets arriving on the connection.
    fn destination_port(&self, conn: &Self::Conn) -> Port;

    /// Source port of packets arriving on the connection.
    fn source_port(&self, conn: &Self::Conn) -> Port;
}

impl<T: TransportProvider + ?Sized> TransportProvider for &T {
    type Socket = T::Socket;
    type Conn = T::Conn;

    fn create_socket(&self) -> TransportResult<Self::Socket> {
        (**self).create_socket()
    }

    fn bind(&self, socket: &Self::Socket, port: Port) -> TransportResult<()> {
        (**self).bind(socket, port)
    }

    fn listen(&self, socket: &Self::Socket, backlog: usize) -> TransportResult<()> {
        (**self).listen(socket, backlog)
    }

    fn accept(&self, socket: &Self::Socket) -> TransportResult<Self::Conn> {
        (**self).accept(socket)
    }

    fn connect(&self, node: NodeAddress, port: Port) -> TransportResult<Self::Conn> {
        (**self).connect(node, port)
    }

    fn send(&self, conn: &Self::Conn, data: &[u8]) -> TransportResult<()> {
        (**self).send(conn, data)
    }

    fn read(&self, conn: &Self::Conn, max_len: usize) -> TransportResult<Vec<u8>> {
        (**self).read(conn, max_len)
    }

    fn destination_port(&self, conn: &Self::Conn) -> Port {
        (**self).destination_port(conn)
    }

    fn source_port(&self, conn: &Self::Conn) -> Port {
        (**self).source_port(conn)
    }
}

impl<T: TransportProvider + ?Sized> TransportProvider for Arc<T> {
    type Socket = T::Socket;
    type Conn = T::Conn;

    fn create_socket(&self) -> TransportResult<Self::Socket> {
        (**self).create_socket()
    }

    fn bind(&self, socket: &Self::Socket, port: Port) -> TransportResult<()> {
        (**self).bind(socket, port)
    }

    fn listen(&self, socket: &Self::Socket, backlog: usize) -> TransportResult<()> {
        (**self).listen(socket, backlog)
    }

    fn accept(&self, socket: &Self::Socket) -> TransportResult<Self::Conn> {
        (**self).accept(socket)
    }

    fn connect(&self, node: NodeAddress, port: Port) -> TransportResult<Self::Conn> {
        (**self).connect(node, port)
    }

    fn send(&self, conn: &Self::Conn, data: &[u8]) -> TransportResult<()> {
        (**self).send(conn, data)
    }

    fn read(&self, conn: &Self::Conn, max_len: usize) -> TransportResult<Vec<u8>> {
        (**self).read(conn, max_len)
    }

    fn destination_port(&self, conn: &Self::Conn) -> Port {
        (**self).destination_port(conn)
    }

    fn source_port(&self, conn: &Self::Conn) -> Port {
        (**self).source_port(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "radio silent");
        assert_eq!(TransportError::from(timeout), TransportError::Timeout);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "i2c nack");
        assert_eq!(
            TransportError::from(other),
            TransportError::Io("i2c nack".to_string())
        );
    }

    #[test]
    fn test_display() {
        let addr = Address::new(NodeAddress::new(3), Port::new(7));
        assert_eq!(
            TransportError::ConnectionRefused(addr).to_string(),
            "connection refused by 3:7"
        );
        assert_eq!(
            TransportError::MessageTooLarge { size: 300, mtu: 256 }.to_string(),
            "message of 300 bytes exceeds MTU 256"
        );
    }
}
