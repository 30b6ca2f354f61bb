// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for nodelink.
//!
//! Three classes of failure:
//!
//! - **invalid argument** -- detected locally, the transport is never called
//! - **transport** -- a transport primitive failed, propagated as-is
//! - **channel mismatch** -- the read succeeded but the port did not match
//!
//! None of them is fatal; callers retry or abandon the connection.

use std::fmt;

use crate::address::{NodeAddress, Port};
use crate::transport::TransportError;

/// Result type for nodelink operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for nodelink operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Connection has no transport handle (never established)
    NullConnection,

    /// Payload to send is empty
    EmptyPayload,

    /// Read buffer has zero capacity
    EmptyBuffer,

    /// Port outside the range allowed for the operation
    InvalidPort(Port),

    /// Node address outside the node field
    InvalidNode(NodeAddress),

    /// Publisher already serves its configured maximum of subscribers
    SubscriberLimit(usize),

    /// Subscriber index does not name an accepted connection
    UnknownSubscriber(usize),

    /// Configuration rejected by `validate()`
    InvalidConfig(&'static str),

    /// Transport primitive failed
    Transport(TransportError),

    /// Data arrived on a different channel than expected
    ChannelMismatch {
        /// Port the caller filtered on
        expected: Port,
        /// Port the transport reported for the connection
        actual: Port,
    },
}

/// Failure class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected before any transport call
    InvalidArgument,
    /// Underlying transport failed
    Transport,
    /// Read succeeded on the wrong channel
    ChannelMismatch,
}

impl Error {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NullConnection
            | Error::EmptyPayload
            | Error::EmptyBuffer
            | Error::InvalidPort(_)
            | Error::InvalidNode(_)
            | Error::SubscriberLimit(_)
            | Error::UnknownSubscriber(_)
            | Error::InvalidConfig(_) => ErrorKind::InvalidArgument,
            Error::Transport(_) => ErrorKind::Transport,
            Error::ChannelMismatch { .. } => ErrorKind::ChannelMismatch,
        }
    }

    /// Whether the error was raised before reaching the transport.
    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    /// Whether the error came from the transport.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NullConnection => write!(f, "connection has no transport handle"),
            Error::EmptyPayload => write!(f, "payload is empty"),
            Error::EmptyBuffer => write!(f, "read buffer is empty"),
            Error::InvalidPort(port) => write!(f, "invalid port {}", port),
            Error::InvalidNode(node) => write!(f, "invalid node address {}", node),
            Error::SubscriberLimit(max) => write!(f, "subscriber limit reached ({})", max),
            Error::UnknownSubscriber(index) => write!(f, "no subscriber at index {}", index),
            Error::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::ChannelMismatch { expected, actual } => {
                write!(f, "channel mismatch: expected port {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
