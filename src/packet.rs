//! Fixed-layout codec for the session's single datagram type.
//!
//! A packet is either a data/control-flow packet (`is_file = true`, used for
//! streaming file bytes and for acknowledgements) or a message packet
//! (`is_file = false`, used for the CHECK/HASH/RESULT/LOG/FINISHED dialogue).
//! Both variants share one on-wire layout so the receiver can dispatch on a
//! single leading byte.

use thiserror::Error;

/// Largest payload a packet may carry. Framed size is `HEADER_LEN + MAX_DATA_SIZE`.
pub const MAX_DATA_SIZE: usize = 498;

/// 1 (is_file) + 4 (seq) + 2 (total) + 2 (data_size).
pub const HEADER_LEN: usize = 9;

/// Largest possible framed datagram.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DATA_SIZE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short: {0} bytes, need at least {HEADER_LEN}")]
    TooShort(usize),
    #[error("declared dataSize {0} exceeds maximum {MAX_DATA_SIZE}")]
    DataSizeTooLarge(u16),
    #[error("packet declares dataSize {declared} but only {available} bytes are readable")]
    Truncated { declared: u16, available: usize },
    #[error("payload of {0} bytes exceeds maximum {MAX_DATA_SIZE}")]
    OversizedPayload(usize),
}

/// A fully parsed packet. `total` is meaningful only for the filename packet
/// of a group (where it carries the group's packet count) and is otherwise 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub is_file: bool,
    pub seq: u32,
    pub total: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a data-stream packet (filename packet, file-body packet, or ACK).
    pub fn data(seq: u32, total: u16, payload: &[u8]) -> Result<Self, PacketError> {
        if payload.len() > MAX_DATA_SIZE {
            return Err(PacketError::OversizedPayload(payload.len()));
        }
        Ok(Packet {
            is_file: true,
            seq,
            total,
            payload: payload.to_vec(),
        })
    }

    /// Build an ACK for `seq`: a data packet with no payload and `total = 0`.
    pub fn ack(seq: u32) -> Self {
        Packet {
            is_file: true,
            seq,
            total: 0,
            payload: Vec::new(),
        }
    }

    /// Build a control-message packet. `seq` and `total` are always 0 for messages.
    pub fn message(text: &str) -> Result<Self, PacketError> {
        let payload = text.as_bytes();
        if payload.len() > MAX_DATA_SIZE {
            return Err(PacketError::OversizedPayload(payload.len()));
        }
        Ok(Packet {
            is_file: false,
            seq: 0,
            total: 0,
            payload: payload.to_vec(),
        })
    }

    /// Interpret the payload as the ASCII control string of a message packet.
    pub fn as_message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Encode to wire bytes: 1B is_file | 4B seq BE | 2B total BE | 2B dataSize BE | payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.is_file as u8);
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.total.to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode wire bytes into a `Packet`, validating lengths in the order the
    /// spec prescribes: readable length, declared dataSize, then full frame.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::TooShort(buf.len()));
        }

        let is_file = buf[0] != 0;
        let seq = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let total = u16::from_be_bytes([buf[5], buf[6]]);
        let data_size = u16::from_be_bytes([buf[7], buf[8]]);

        if data_size as usize > MAX_DATA_SIZE {
            return Err(PacketError::DataSizeTooLarge(data_size));
        }

        let end = HEADER_LEN + data_size as usize;
        if buf.len() < end {
            return Err(PacketError::Truncated {
                declared: data_size,
                available: buf.len() - HEADER_LEN,
            });
        }

        Ok(Packet {
            is_file,
            seq,
            total,
            payload: buf[HEADER_LEN..end].to_vec(),
        })
    }
}

/// Parse a `CMD:<name>,<rest>` control message into its three parts.
/// Returns `None` if the message lacks the mandatory `:` separator.
pub fn parse_control_message(msg: &str) -> Option<(&str, &str, &str)> {
    let (command, rest) = msg.split_once(':')?;
    match rest.split_once(',') {
        Some((name, tail)) => Some((command, name, tail)),
        None => Some((command, rest, "")),
    }
}
