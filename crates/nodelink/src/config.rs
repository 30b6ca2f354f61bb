// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! nodelink configuration.
//!
//! - [`PublisherConfig`] - listening port, backlog and fan-out policy
//! - [`SubscriberConfig`] - publisher address to dial
//! - [`LoopbackConfig`] - MTU and blocking timeouts of the in-process transport
//! - [`NodeLinkConfig`] - all of the above, loadable from YAML with the
//!   `config-loaders` feature
//!
//! # Example
//!
//! ```
//! use nodelink::{NodeAddress, Port, PublisherConfig};
//!
//! let config = PublisherConfig {
//!     port: Port::new(12),
//!     backlog: 4,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::address::{Address, NodeAddress, Port};

/// Default publisher port.
pub const DEFAULT_PUBLISHER_PORT: Port = Port::new(10);

/// Default listener backlog.
pub const DEFAULT_BACKLOG: usize = 10;

/// Default loopback MTU (bytes of payload per packet).
pub const DEFAULT_MTU: usize = 256;

// ============================================================================
// PublisherConfig
// ============================================================================

/// Publisher (server) side configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct PublisherConfig {
    /// Port the listening endpoint binds
    pub port: Port,

    /// Maximum queued, not yet accepted, connections
    pub backlog: usize,

    /// Refuse to accept more than this many subscribers (None = unlimited)
    pub max_subscribers: Option<usize>,

    /// Forget a subscriber as soon as a broadcast to it fails
    pub drop_failed_subscribers: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PUBLISHER_PORT,
            backlog: DEFAULT_BACKLOG,
            max_subscribers: None,
            drop_failed_subscribers: true,
        }
    }
}

impl PublisherConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.port.is_bindable() {
            return Err("port must be a bindable service port (0..=31)");
        }
        if self.max_subscribers == Some(0) {
            return Err("max_subscribers must be > 0 when set");
        }
        Ok(())
    }
}

// ============================================================================
// SubscriberConfig
// ============================================================================

/// Subscriber (client) side configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct SubscriberConfig {
    /// Publisher to dial; its port is also the channel reads filter on
    pub publisher: Address,
}

impl SubscriberConfig {
    /// Subscribe to `port` on `node`.
    pub fn new(node: NodeAddress, port: Port) -> Self {
        Self {
            publisher: Address::new(node, port),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.publisher.node.is_valid() {
            return Err("publisher node must be in 0..=31");
        }
        if !self.publisher.port.is_bindable() {
            return Err("publisher port must be a bindable service port (0..=31)");
        }
        Ok(())
    }
}

// ============================================================================
// LoopbackConfig
// ============================================================================

/// In-process transport configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct LoopbackConfig {
    /// Largest payload accepted by `send`
    pub mtu: usize,

    /// `accept` gives up after this many milliseconds (None = wait forever)
    pub accept_timeout_ms: Option<u64>,

    /// `read` gives up after this many milliseconds (None = wait forever)
    pub read_timeout_ms: Option<u64>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            accept_timeout_ms: None,
            read_timeout_ms: None,
        }
    }
}

impl LoopbackConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.mtu == 0 {
            return Err("mtu must be > 0");
        }
        if self.accept_timeout_ms == Some(0) {
            return Err("accept_timeout_ms must be > 0 when set");
        }
        if self.read_timeout_ms == Some(0) {
            return Err("read_timeout_ms must be > 0 when set");
        }
        Ok(())
    }

    /// Accept timeout as a [`Duration`].
    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout_ms.map(Duration::from_millis)
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

// ============================================================================
// NodeLinkConfig
// ============================================================================

/// Complete configuration of a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct NodeLinkConfig {
    /// Address of this node
    pub node: NodeAddress,

    /// Publisher side
    pub publisher: PublisherConfig,

    /// Subscriber side
    pub subscriber: SubscriberConfig,

    /// Loopback transport
    pub loopback: LoopbackConfig,
}

impl NodeLinkConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.node.is_valid() {
            return Err("node must be in 0..=31");
        }
        self.publisher.validate()?;
        self.subscriber.validate()?;
        self.loopback.validate()
    }

    /// Parse and validate YAML content.
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, String> {
        let config: Self = serde_yaml::from_str(yaml_content)
            .map_err(|e| format!("Failed to parse YAML: {}", e))?;
        config.validate().map_err(|e| format!("Invalid config: {}", e))?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    #[cfg(feature = "config-loaders")]
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, String> {
        let yaml_content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read YAML file: {}", e))?;
        Self::from_yaml_str(&yaml_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PublisherConfig::default().validate().is_ok());
        assert!(LoopbackConfig::default().validate().is_ok());
        assert!(NodeLinkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_publisher_rejects_ephemeral_port() {
        let config = PublisherConfig {
            port: Port::new(40),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PublisherConfig {
            max_subscribers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_subscriber_validation() {
        assert!(SubscriberConfig::new(NodeAddress::new(11), Port::new(12))
            .validate()
            .is_ok());
        assert!(SubscriberConfig::new(NodeAddress::new(32), Port::new(12))
            .validate()
            .is_err());
        assert!(SubscriberConfig::new(NodeAddress::new(11), Port::new(50))
            .validate()
            .is_err());
    }

    #[test]
    fn test_loopback_timeouts() {
        let config = LoopbackConfig {
            read_timeout_ms: Some(250),
            ..Default::default()
        };
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.accept_timeout(), None);

        let config = LoopbackConfig {
            mtu: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err("mtu must be > 0"));
    }
}
