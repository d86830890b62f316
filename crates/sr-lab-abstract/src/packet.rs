use serde::{Deserialize, Serialize};

/// Number of payload bytes carried by every packet. Application messages
/// are exactly this size; pure ACKs carry filler instead.
pub const PAYLOAD_SIZE: usize = 20;

/// Sentinel for header fields that carry no information (the `acknum` of a
/// data packet).
pub const NOT_IN_USE: i32 = -1;

/// Filler byte for the payload of pure acknowledgment packets.
pub const ACK_FILLER: u8 = b'0';

/// The wire unit exchanged between sender and receiver. Data packets carry
/// an application payload and `acknum == NOT_IN_USE`; acknowledgments echo
/// the acknowledged sequence number in `acknum` and fill the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub seqnum: i32,
    pub acknum: i32,
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl Packet {
    /// Build a data packet. The checksum is left at zero; the protocol layer
    /// fills it in once the header is final.
    pub fn data(seqnum: i32, payload: [u8; PAYLOAD_SIZE]) -> Self {
        Self {
            seqnum,
            acknum: NOT_IN_USE,
            checksum: 0,
            payload,
        }
    }

    /// Build a pure acknowledgment with filler payload. Checksum left at
    /// zero, same as [`Packet::data`].
    pub fn ack(seqnum: i32, acknum: i32) -> Self {
        Self {
            seqnum,
            acknum,
            checksum: 0,
            payload: [ACK_FILLER; PAYLOAD_SIZE],
        }
    }

    pub fn is_ack(&self) -> bool {
        self.acknum != NOT_IN_USE
    }

    /// Copy application bytes into a fixed-size payload block, zero-padding
    /// short messages and truncating long ones.
    pub fn pad_payload(data: &[u8]) -> [u8; PAYLOAD_SIZE] {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let n = data.len().min(PAYLOAD_SIZE);
        payload[..n].copy_from_slice(&data[..n]);
        payload
    }
}
