//! Configuration for a [`crate::core::ClusterCore`] instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Construction-time configuration for a cluster node.
///
/// This is plain data: loading it from a file or environment is explicitly
/// out of scope here, callers build a `Config` however they like and pass
/// it to [`crate::core::ClusterCore::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster-unique identity of this process.
    pub node_name: String,

    /// Local UDP/TCP bind address. `"0.0.0.0"` triggers best-effort
    /// default-interface discovery when resolving the advertised address.
    pub bind_address: String,

    /// Local UDP/TCP bind port (both protocols share the port).
    pub bind_port: u16,

    /// Advertised address; defaults to the bind address (or the discovered
    /// interface address, if the bind address is `"0.0.0.0"`) when `None`.
    pub node_address: Option<String>,

    /// Advertised port; defaults to `bind_port` when `None`.
    pub node_port: Option<u16>,

    /// Interval between probe ticks.
    pub probe_interval: Duration,

    /// How long to wait for a direct-probe ACK before suspecting the target.
    pub probe_timeout: Duration,

    /// `k`, the number of peers used for indirect probing.
    pub probe_indirect_nodes: usize,

    /// Interval between periodic full-state sync ticks.
    pub sync_interval: Duration,

    /// Number of candidate peers considered per sync tick (one is chosen).
    pub sync_nodes: usize,

    /// Multiplier applied to the gossip transmit limit.
    pub retransmit_multi: u32,

    /// Multiplier for the lower bound of the suspicion timeout.
    pub suspicion_min_multi: u32,

    /// Multiplier applied to `suspicion_min_multi`'s timeout to get the
    /// upper bound.
    pub suspicion_max_multi: u32,

    /// Optional pre-shared symmetric key used to obfuscate wire payloads.
    /// See `wire` module docs: this is not authenticated encryption.
    pub encryption_key: Option<[u8; 32]>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            bind_address: "0.0.0.0".to_string(),
            bind_port: 7946,
            node_address: None,
            node_port: None,
            probe_interval: Duration::from_millis(200),
            probe_timeout: Duration::from_millis(500),
            probe_indirect_nodes: 3,
            sync_interval: Duration::from_secs(30),
            sync_nodes: 3,
            retransmit_multi: 4,
            suspicion_min_multi: 2,
            suspicion_max_multi: 6,
            encryption_key: None,
        }
    }
}

impl Config {
    /// Surface configuration errors before `start()` does any I/O.
    pub fn validate(&self) -> Result<()> {
        if self.node_name.is_empty() {
            return Err(Error::Config("node_name must not be empty".into()));
        }
        if self.bind_port == 0 {
            return Err(Error::Config("bind_port must be nonzero".into()));
        }
        if self.probe_indirect_nodes == 0 {
            return Err(Error::Config(
                "probe_indirect_nodes must be at least 1".into(),
            ));
        }
        if self.suspicion_min_multi == 0 {
            return Err(Error::Config(
                "suspicion_min_multi must be at least 1".into(),
            ));
        }
        if self.suspicion_max_multi < self.suspicion_min_multi {
            return Err(Error::Config(
                "suspicion_max_multi must be >= suspicion_min_multi".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_once_named() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        config.node_name = "a".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_suspicion_multis() {
        let mut config = Config {
            node_name: "a".to_string(),
            ..Config::default()
        };
        config.suspicion_min_multi = 6;
        config.suspicion_max_multi = 2;
        assert!(config.validate().is_err());
    }
}
