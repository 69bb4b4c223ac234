//! Thin tokio-based UDP/TCP listener wrappers driven by `ClusterCore`.
//!
//! This is the "networking glue" the core consumes; it owns no membership
//! logic of its own, only socket lifecycle and raw byte shuttling.

mod tcp;
mod udp;

pub use tcp::{read_frame, write_frame, TcpLayer};
pub use udp::{UdpLayer, MAX_DATAGRAM_SIZE};

/// Best-effort discovery of this host's non-loopback local IP address, used
/// to resolve an advertised address when the bind address is `"0.0.0.0"`.
/// This is explicitly a stand-in for real interface enumeration (out of
/// scope per the crate's purpose): it opens a UDP socket "connected" to a
/// well-known public address purely to let the OS routing table pick a
/// local source address, without sending any traffic.
pub fn default_local_ip() -> Option<std::net::IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

