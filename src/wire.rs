//! Wire message kinds and the length-prefixed frame codec.
//!
//! Encoding uses `bincode` as the closest analog, in this corpus, to the
//! original implementation's hand-rolled struct packing. Encryption is
//! represented by [`EncryptionKey`] and a keystream XOR applied to the body
//! bytes; this is **not** authenticated encryption, it exists only so the
//! interface shape (a pre-shared symmetric key that makes decoding with the
//! wrong key fail) is present without claiming cryptographic soundness real
//! AEAD wiring is explicitly out of scope.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::membership::Metadata;

/// Fixed 8-byte frame header: 4-byte little-endian total length (including
/// the header itself), a 1-byte message-kind tag, a 1-byte format/version,
/// and 2 reserved bytes.
const HEADER_LEN: usize = 8;
const FORMAT_VERSION: u8 = 1;

/// A pre-shared symmetric key used to obfuscate wire payloads.
pub type EncryptionKey = [u8; 32];

/// One message as carried in a frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Announces a node is alive, or refutes a suspicion/death report.
    Alive {
        node: String,
        incarnation: u64,
        host: String,
        port: u16,
        metadata: Metadata,
    },
    /// Reports a node as suspected of having failed.
    Suspect {
        node: String,
        incarnation: u64,
        sender: String,
    },
    /// Reports a node as confirmed (or presumed) dead.
    Dead {
        node: String,
        incarnation: u64,
        sender: String,
    },
    /// A direct liveness probe.
    Ping {
        seq: u64,
        target: String,
        sender: String,
        sender_addr: (String, u16),
    },
    /// An indirect liveness probe relayed through a third node.
    PingReq {
        seq: u64,
        target: String,
        target_addr: (String, u16),
        sender: String,
        sender_addr: (String, u16),
    },
    /// A positive probe response, correlated by `seq`.
    Ack { seq: u64, sender: String },
    /// A negative probe response, correlated by `seq`.
    Nack { seq: u64, sender: String },
    /// An opaque user payload.
    User { data: Vec<u8>, sender: String },
    /// Full membership snapshot, exchanged over TCP only.
    Sync { nodes: Vec<SyncEntry> },
}

/// One node's state as carried in a [`Message::Sync`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub node: String,
    pub host: String,
    pub port: u16,
    pub version: u32,
    pub incarnation: u64,
    pub status: crate::membership::NodeStatus,
    pub metadata: Metadata,
}

fn kind_tag(message: &Message) -> u8 {
    match message {
        Message::Alive { .. } => 0,
        Message::Suspect { .. } => 1,
        Message::Dead { .. } => 2,
        Message::Ping { .. } => 3,
        Message::PingReq { .. } => 4,
        Message::Ack { .. } => 5,
        Message::Nack { .. } => 6,
        Message::User { .. } => 7,
        Message::Sync { .. } => 8,
    }
}

fn keystream_xor(buf: &mut [u8], key: &EncryptionKey) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }
}

/// Encode one message into a self-contained frame (header + body).
pub fn encode(message: &Message, key: Option<&EncryptionKey>) -> Result<Vec<u8>> {
    let mut body =
        bincode::serialize(message).map_err(|err| Error::Decode(format!("encode: {err}")))?;
    if let Some(key) = key {
        keystream_xor(&mut body, key);
    }

    let total_len = HEADER_LEN + body.len();
    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&(total_len as u32).to_le_bytes());
    frame.push(kind_tag(message));
    frame.push(FORMAT_VERSION);
    frame.extend_from_slice(&[0u8; 2]);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode exactly one frame from the front of `buf`, returning the message
/// and the number of bytes consumed.
pub fn decode_one(buf: &[u8], key: Option<&EncryptionKey>) -> Result<(Message, usize)> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Decode("frame shorter than header".into()));
    }
    let total_len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if total_len < HEADER_LEN || total_len > buf.len() {
        return Err(Error::Decode(format!(
            "invalid frame length {total_len} (buffer has {})",
            buf.len()
        )));
    }
    let version = buf[5];
    if version != FORMAT_VERSION {
        return Err(Error::Decode(format!("unsupported format version {version}")));
    }

    let mut body = buf[HEADER_LEN..total_len].to_vec();
    if let Some(key) = key {
        keystream_xor(&mut body, key);
    }
    let message: Message =
        bincode::deserialize(&body).map_err(|err| Error::Decode(format!("decode: {err}")))?;
    Ok((message, total_len))
}

/// Decode every frame packed into `buf` (a UDP datagram may carry several).
///
/// Stops at the first undecodable frame rather than attempting to
/// resynchronize past an unknown length prefix: a corrupt length field
/// makes the start of the next frame unknowable.
pub fn decode_all(buf: &[u8], key: Option<&EncryptionKey>) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        match decode_one(&buf[offset..], key) {
            Ok((message, consumed)) => {
                messages.push(message);
                offset += consumed;
            }
            Err(_) => break,
        }
    }
    messages
}
