//! Error types for the cluster-membership core.

use thiserror::Error;

/// Crate-wide error type.
///
/// Message-processing paths catch and log their own errors at the dispatch
/// boundary rather than propagating them out of a listener loop; this type
/// exists for call sites that need a typed `Result` (construction,
/// configuration validation, direct probe/sync calls made by an embedder).
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed frame or message body, or decryption with the wrong key.
    #[error("decode error: {0}")]
    Decode(String),

    /// Socket send/recv or stream I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A probe or sync operation did not resolve within its deadline.
    #[error("timeout waiting for {0}")]
    Timeout(String),

    /// Unexpected message kind or malformed field semantics.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid or missing configuration; fatal at `start()`.
    #[error("configuration error: {0}")]
    Config(String),

    /// NodeManager-level misuse, e.g. calling an operation before
    /// `set_local_node`, or acting on a name that isn't known.
    #[error("membership error: {0}")]
    Membership(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
