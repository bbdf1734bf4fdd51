//! Fixed-size wire packet used in both directions.
//!
//! Layout, little-endian:
//!
//! ```text
//! offset  size            field
//! 0       4               client_count      i32
//! 4       4               recipient_slot    i32
//! 8       4 * MAX         phases            u32 tag per slot
//! 48      8 * MAX         positions         (i32, i32) per slot, x100
//! 128     4 * MAX         scores            i32 per slot
//! 168     1 * MAX         jetpack           bool per slot
//! 178     MAP_PAYLOAD     map_payload       text, zero-filled
//! ```
//!
//! The header is produced by bincode's fixed-int encoding; the payload is
//! appended as raw bytes. A buffer of any other length than [`PACKET_SIZE`]
//! is a protocol violation.

use crate::{MAP_PAYLOAD_SIZE, MAX_CLIENTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded size of everything before the map payload.
pub const HEADER_SIZE: usize = 4 + 4 + MAX_CLIENTS * (4 + 8 + 4 + 1);

/// Exact size of every packet on the wire.
pub const PACKET_SIZE: usize = HEADER_SIZE + MAP_PAYLOAD_SIZE;

/// Per-slot lifecycle stage as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotPhase {
    Playing,
    Waiting,
    Ended,
    Winner,
    Loser,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet is {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },
    #[error("undecodable packet: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i32 },
    #[error("map payload is {0} bytes, capacity is {}", MAP_PAYLOAD_SIZE)]
    PayloadTooLarge(usize),
    #[error("map payload is not NUL-free UTF-8 text")]
    PayloadEncoding,
}

/// Map text carried by the welcome packet. Empty in every other packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapPayload(String);

impl MapPayload {
    pub fn new(text: impl Into<String>) -> Result<Self, ProtocolError> {
        let text = text.into();
        if text.len() > MAP_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(text.len()));
        }
        if text.contains('\0') {
            return Err(ProtocolError::PayloadEncoding);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        if bytes[end..].iter().any(|&b| b != 0) {
            return Err(ProtocolError::PayloadEncoding);
        }
        let text = std::str::from_utf8(&bytes[..end]).map_err(|_| ProtocolError::PayloadEncoding)?;
        Ok(Self(text.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Header {
    client_count: i32,
    recipient_slot: i32,
    phases: [SlotPhase; MAX_CLIENTS],
    positions: [(i32, i32); MAX_CLIENTS],
    scores: [i32; MAX_CLIENTS],
    jetpack: [bool; MAX_CLIENTS],
}

/// One full packet. Always handled by value; every send encodes its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub client_count: i32,
    pub recipient_slot: i32,
    pub phases: [SlotPhase; MAX_CLIENTS],
    /// Tile coordinates scaled by [`crate::POSITION_SCALE`].
    pub positions: [(i32, i32); MAX_CLIENTS],
    pub scores: [i32; MAX_CLIENTS],
    pub jetpack: [bool; MAX_CLIENTS],
    pub map_payload: MapPayload,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            client_count: 0,
            recipient_slot: 0,
            phases: [SlotPhase::Waiting; MAX_CLIENTS],
            positions: [(0, 0); MAX_CLIENTS],
            scores: [0; MAX_CLIENTS],
            jetpack: [false; MAX_CLIENTS],
            map_payload: MapPayload::default(),
        }
    }
}

impl Packet {
    /// Client-to-server packet carrying the sender's jetpack intent.
    pub fn input(slot: usize, jetpack_active: bool) -> Self {
        assert!(slot < MAX_CLIENTS, "slot {} out of range", slot);
        let mut packet = Self {
            recipient_slot: slot as i32,
            ..Self::default()
        };
        packet.jetpack[slot] = jetpack_active;
        packet
    }

    /// Jetpack intent a client declared for its own slot.
    pub fn jetpack_intent(&self, slot: usize) -> bool {
        self.jetpack[slot]
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let header = Header {
            client_count: self.client_count,
            recipient_slot: self.recipient_slot,
            phases: self.phases,
            positions: self.positions,
            scores: self.scores,
            jetpack: self.jetpack,
        };

        let mut bytes = bincode::serialize(&header)?;
        debug_assert_eq!(bytes.len(), HEADER_SIZE);

        let payload = self.map_payload.as_str().as_bytes();
        bytes.extend_from_slice(payload);
        bytes.resize(PACKET_SIZE, 0);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != PACKET_SIZE {
            return Err(ProtocolError::WrongSize {
                expected: PACKET_SIZE,
                actual: bytes.len(),
            });
        }

        let header: Header = bincode::deserialize(&bytes[..HEADER_SIZE])?;

        if !(0..=MAX_CLIENTS as i32).contains(&header.client_count) {
            return Err(ProtocolError::OutOfRange {
                field: "client_count",
                value: header.client_count,
            });
        }
        if !(0..MAX_CLIENTS as i32).contains(&header.recipient_slot) {
            return Err(ProtocolError::OutOfRange {
                field: "recipient_slot",
                value: header.recipient_slot,
            });
        }

        Ok(Self {
            client_count: header.client_count,
            recipient_slot: header.recipient_slot,
            phases: header.phases,
            positions: header.positions,
            scores: header.scores,
            jetpack: header.jetpack,
            map_payload: MapPayload::from_bytes(&bytes[HEADER_SIZE..])?,
        })
    }

    /// The recipient's own slot index.
    pub fn slot(&self) -> usize {
        self.recipient_slot as usize
    }
}
