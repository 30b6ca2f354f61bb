// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network addressing.
//!
//! Every participant is a numbered node, every service a numbered port.
//! The ranges follow the 5-bit node / 6-bit port fields of a CubeSat-style
//! network header:
//!
//! ```text
//! node:  0 ..= 31
//! port:  0 ..= 31   service ports (bindable)
//!       32 ..= 63   ephemeral ports (outgoing side of dialed connections)
//! ```
//!
//! Constructors do not validate; [`crate::server::server_setup`] and
//! [`crate::subscriber::subscriber_connect`] reject out-of-range values
//! before touching the transport.

use std::fmt;

/// Highest valid node address.
pub const MAX_NODE_ADDRESS: u8 = 31;

/// Highest port a listening endpoint may bind.
pub const MAX_BIND_PORT: u8 = 31;

/// Highest valid port (top of the ephemeral range).
pub const MAX_PORT: u8 = 63;

// ============================================================================
// NodeAddress
// ============================================================================

/// Identifier of a network participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(transparent))]
pub struct NodeAddress(u8);

impl NodeAddress {
    /// Wrap a raw node number.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw node number.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether the address fits the node field.
    pub const fn is_valid(self) -> bool {
        self.0 <= MAX_NODE_ADDRESS
    }
}

impl From<u8> for NodeAddress {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Port
// ============================================================================

/// Logical channel identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(transparent))]
pub struct Port(u8);

impl Port {
    /// First port of the ephemeral range.
    pub const EPHEMERAL_START: Port = Port(MAX_BIND_PORT + 1);

    /// Wrap a raw port number.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw port number.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether the port fits the port field.
    pub const fn is_valid(self) -> bool {
        self.0 <= MAX_PORT
    }

    /// Whether a listening endpoint may bind this port.
    pub const fn is_bindable(self) -> bool {
        self.0 <= MAX_BIND_PORT
    }

    /// Whether the port belongs to the ephemeral range.
    pub const fn is_ephemeral(self) -> bool {
        self.0 > MAX_BIND_PORT && self.0 <= MAX_PORT
    }
}

impl From<u8> for Port {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Address
// ============================================================================

/// Full endpoint address: `(node, port)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Node hosting the endpoint
    pub node: NodeAddress,
    /// Port on that node
    pub port: Port,
}

impl Address {
    /// Build an address from its parts.
    pub const fn new(node: NodeAddress, port: Port) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}
