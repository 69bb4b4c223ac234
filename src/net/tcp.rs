//! TCP listener/connection wrapper used for full-state sync exchanges.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};

/// Maximum single-frame size accepted on a sync stream; guards against a
/// malformed length prefix causing an unbounded allocation.
const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Owns the TCP listener used to accept inbound sync connections.
pub struct TcpLayer {
    listener: TcpListener,
}

impl TcpLayer {
    /// Bind a new TCP listener at `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the next inbound connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        Ok(self.listener.accept().await?)
    }

    /// Open an outbound connection to a peer.
    pub async fn connect(addr: SocketAddr) -> Result<TcpStream> {
        Ok(TcpStream::connect(addr).await?)
    }
}

/// Read exactly one length-prefixed frame from a stream (the same 8-byte
/// header shape used on UDP, see `wire`), returning the raw frame bytes
/// (header included, so the caller can hand it straight to
/// `wire::decode_one`).
pub async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await?;
    let total_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    if total_len < 8 || total_len > MAX_FRAME_SIZE {
        return Err(Error::Decode(format!("invalid TCP frame length {total_len}")));
    }
    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&header);
    frame.resize(total_len, 0);
    stream.read_exact(&mut frame[8..]).await?;
    Ok(frame)
}

/// Write a pre-encoded frame (as produced by `wire::encode`) to a stream.
pub async fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> Result<()> {
    stream.write_all(frame).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{self, Message};

    #[tokio::test]
    async fn writes_and_reads_one_frame() {
        let layer = TcpLayer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = layer.local_addr().unwrap();

        let accept_task = tokio::spawn(async move {
            let (mut stream, _) = layer.accept().await.unwrap();
            read_frame(&mut stream).await.unwrap()
        });

        let mut client = TcpLayer::connect(addr).await.unwrap();
        let message = Message::Ack {
            seq: 9,
            sender: "a".to_string(),
        };
        let frame = wire::encode(&message, None).unwrap();
        write_frame(&mut client, &frame).await.unwrap();

        let received = accept_task.await.unwrap();
        assert_eq!(received, frame);
    }
}
