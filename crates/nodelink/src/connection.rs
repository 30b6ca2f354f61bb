// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection handle wrapper.
//!
//! A [`Connection`] holds a transport connection handle plus how it came to
//! exist. The handle is a reference into the transport; dropping a
//! `Connection` never closes anything.
//!
//! # State Machine
//!
//! ```text
//!      +---------------+
//!      | Uninitialized |   Connection::default(), no handle
//!      +-------+-------+
//!              | server_accept()  /  subscriber_connect()
//!              v
//!      +---------------+
//!      |   Accepted    |   or   Connected
//!      +---------------+
//!              | send / read, any number of times
//! ```
//!
//! There is no closed state here; teardown belongs to the transport.

use std::fmt;

/// How a connection was established.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No handle yet
    #[default]
    Uninitialized,

    /// Produced by a publisher accepting an inbound subscriber
    Accepted,

    /// Produced by a subscriber dialing a publisher
    Connected,
}

impl ConnectionState {
    /// Check if the connection carries a handle.
    pub fn is_established(&self) -> bool {
        matches!(self, ConnectionState::Accepted | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Uninitialized => "Uninitialized",
            ConnectionState::Accepted => "Accepted",
            ConnectionState::Connected => "Connected",
        };
        write!(f, "{}", s)
    }
}

/// A transport connection seen from one side.
///
/// `H` is the transport's connection handle type
/// ([`crate::TransportProvider::Conn`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection<H> {
    handle: Option<H>,
    state: ConnectionState,
}

impl<H> Default for Connection<H> {
    fn default() -> Self {
        Self {
            handle: None,
            state: ConnectionState::Uninitialized,
        }
    }
}

impl<H> Connection<H> {
    /// Wrap a handle produced by `accept`.
    pub(crate) fn accepted(handle: H) -> Self {
        Self {
            handle: Some(handle),
            state: ConnectionState::Accepted,
        }
    }

    /// Wrap a handle produced by `connect`.
    pub(crate) fn connected(handle: H) -> Self {
        Self {
            handle: Some(handle),
            state: ConnectionState::Connected,
        }
    }

    /// Transport handle, `None` while uninitialized.
    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    /// How the connection was established.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if a handle is present.
    pub fn is_established(&self) -> bool {
        self.handle.is_some()
    }
}
