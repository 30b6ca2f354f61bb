// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # nodelink - Publish/Subscribe over node-addressed connections
//!
//! A thin, blocking pub/sub layer for small embedded and satellite networks
//! where every participant is a numbered node and every service is a port.
//!
//! A *publisher* binds a listening endpoint on a port and accepts one
//! connection per subscriber. A *subscriber* dials the publisher's
//! `(node, port)` address. Reads on either side are filtered by port so a
//! single endpoint can carry several logical channels.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------+
//! |  Application (publisher / subscriber)   |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Publisher / Subscriber conveniences    |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  server_* / subscriber_* / io::*        |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  TransportProvider (loopback, radio...) |
//! +-----------------------------------------+
//! ```
//!
//! The layer keeps no global state, takes no locks and never retries. Socket
//! and connection lifetimes belong to the transport; this crate only holds
//! handles to them.
//!
//! ## Example
//!
//! ```
//! use nodelink::transport::loopback::LoopbackNetwork;
//! use nodelink::{io, server, subscriber, NodeAddress, Port};
//!
//! let network = LoopbackNetwork::default();
//! let ground = network.node(NodeAddress::new(1));
//! let obc = network.node(NodeAddress::new(11));
//!
//! let telemetry = Port::new(12);
//! let endpoint = server::server_setup(&obc, telemetry, 1)?;
//! let dialed = subscriber::subscriber_connect(&ground, NodeAddress::new(11), telemetry)?;
//! let accepted = server::server_accept(&obc, &endpoint)?;
//!
//! io::send(&obc, &accepted, b"hk")?;
//! let mut buf = [0u8; 8];
//! let n = io::subscriber_read(&ground, &dialed, &mut buf, telemetry)?;
//! assert_eq!(&buf[..n], b"hk");
//! # Ok::<(), nodelink::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `config-loaders` -- Load [`config::NodeLinkConfig`] from YAML

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Node addresses, ports and full addresses
pub mod address;

/// Publisher, subscriber and loopback configuration
pub mod config;

/// Connection handle wrapper and provenance state
pub mod connection;

/// Error types
pub mod error;

/// Send and port-filtered reads
pub mod io;

/// Listening endpoints and the publisher side
pub mod server;

/// Dialing publishers and the subscriber side
pub mod subscriber;

/// Transport contract and the in-process loopback transport
pub mod transport;

// Re-exports for convenience
pub use crate::address::{Address, NodeAddress, Port};
pub use crate::config::{LoopbackConfig, NodeLinkConfig, PublisherConfig, SubscriberConfig};
pub use crate::connection::{Connection, ConnectionState};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::server::{BroadcastReport, ListeningEndpoint, Publisher};
pub use crate::subscriber::Subscriber;
pub use crate::transport::{TransportError, TransportProvider};

/// Version of nodelink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
