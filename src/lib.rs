//! A SWIM-style decentralized cluster-membership and failure-detection
//! core.
//!
//! Each process ("node") maintains an eventually-consistent view of the
//! live membership of its cluster, disseminates state changes via
//! piggy-backed gossip on UDP datagrams, and exchanges full-state
//! snapshots over TCP to bootstrap and repair divergences. This crate is
//! the failure-detection and state-convergence core: the probe /
//! indirect-probe state machine, incarnation numbers and suspicion timers,
//! the piggy-backed broadcast queue, and concurrent dispatch of datagram
//! and stream messages.
//!
//! Out of scope: a CLI/daemon wrapper, a hardened wire codec, structured
//! configuration loading, a logging backend, user-payload semantics beyond
//! delivery, and address/interface discovery beyond a best-effort stub.
//!
//! ## Quick start
//!
//! ```no_run
//! use tattle_rs::{ClusterCore, Config};
//!
//! #[tokio::main]
//! async fn main() -> tattle_rs::Result<()> {
//!     let config = Config {
//!         node_name: "a".to_string(),
//!         bind_address: "127.0.0.1".to_string(),
//!         bind_port: 7946,
//!         ..Config::default()
//!     };
//!     let core = ClusterCore::new(config)?;
//!     core.start().await?;
//!     core.join(&[("127.0.0.1".to_string(), 7947)]).await?;
//!     core.stop().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![allow(clippy::type_complexity)]

pub mod broadcast;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod membership;
pub mod net;
pub mod sequence;
pub mod timer;
pub mod wire;

pub use config::Config;
pub use core::ClusterCore;
pub use error::{Error, Result};
pub use events::{ClusterEvent, EventBus, EventHandler};
pub use membership::{Metadata, Node, NodeManager, NodeStatus};
