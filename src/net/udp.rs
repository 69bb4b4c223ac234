//! UDP datagram socket wrapper.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::Result;

/// Owns the UDP socket used for probes, gossip, and acks.
///
/// A single datagram may carry up to this many bytes; the nominal MTU
/// budget used when piggy-backing gossip is enforced by the caller
/// (`ClusterCore`), not here.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// A bound UDP socket, shareable across the tasks that read and write it.
pub struct UdpLayer {
    socket: Arc<UdpSocket>,
}

impl UdpLayer {
    /// Bind a new UDP socket at `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// The address the socket is actually bound to (resolves `:0` ports).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// A cheaply-cloneable handle for concurrent senders.
    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    /// Send one datagram. Best-effort: callers log and drop on error per
    /// the failure semantics for UDP sends.
    pub async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(buf, addr).await?;
        Ok(())
    }

    /// Receive one datagram.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive_round_trip() {
        let a = UdpLayer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpLayer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"hello", b_addr).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, _from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }
}
