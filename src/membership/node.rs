//! The membership record for one process in the cluster.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// One of the three states a node can be in.
///
/// `Node`s are created DEAD on first observation and only ever move through
/// `onNodeAlive`/`onNodeSuspect`/`onNodeDead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Believed live and reachable.
    Alive,
    /// Possibly failed; under a suspicion timer.
    Suspect,
    /// Confirmed (or presumed) failed.
    Dead,
}

/// Mapping from string keys to opaque values, merged (union, last-writer-
/// wins per key) rather than replaced wholesale on updates.
pub type Metadata = HashMap<String, Vec<u8>>;

/// The membership record for one process.
///
/// Transient connection handles for the TCP sync stream are deliberately
/// *not* carried here; they live in `ClusterCore`'s own sync-connection
/// table, since NodeManager's job is pure membership-state reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable opaque string, cluster-unique.
    pub name: String,
    /// IPv4/IPv6 host.
    pub host: String,
    /// Shared UDP/TCP port.
    pub port: u16,
    /// Strictly increases for the owning node; arbitrates concurrent
    /// updates about this node.
    pub incarnation: u64,
    /// Reserved for future schema evolution.
    pub version: u32,
    /// Opaque metadata, merged on update.
    pub metadata: Metadata,
    /// Current status.
    pub status: NodeStatus,
    /// Wall-clock instant of the last status mutation.
    pub status_changed_at: SystemTime,
}

impl Node {
    /// Construct a freshly-discovered node: DEAD, as required on first
    /// observation, before any transition has been applied.
    pub fn discovered(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            incarnation: 0,
            version: 1,
            metadata: Metadata::new(),
            status: NodeStatus::Dead,
            status_changed_at: SystemTime::now(),
        }
    }

    pub(crate) fn merge_metadata(&mut self, other: &Metadata) {
        for (key, value) in other {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    pub(crate) fn set_status(&mut self, status: NodeStatus) -> bool {
        let changed = self.status != status;
        self.status = status;
        self.status_changed_at = SystemTime::now();
        changed
    }
}

/// Auxiliary state held only while a node is SUSPECT.
pub struct SuspectRecord {
    /// The suspicion timer; firing promotes SUSPECT to DEAD.
    pub timer: crate::timer::Timer,
    /// Expected confirmations before escalating the timeout.
    pub k: u32,
    pub(crate) min_timeout: std::time::Duration,
    pub(crate) max_timeout: std::time::Duration,
    /// Distinct peer names that have also reported this node suspect.
    pub confirmations: std::collections::HashSet<String>,
    pub(crate) started_at: std::time::Instant,
}
