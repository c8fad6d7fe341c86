//! Y-sync protocol framing for the live channel boundary.
//!
//! The transport itself is the host's concern; this module only frames and
//! unframes the binary messages a replica exchanges. Malformed frames (probe
//! traffic, truncated payloads, non-sync message types) are absorbed here:
//! decode returns `Ok(None)` and the engine never sees them.
//!
//! # Wire Format (y-protocols compatible)
//!
//! Messages use varUint encoding (variable-length unsigned integers):
//! - `varUint(0)`: Sync message type
//!   - `varUint(0)`: SyncStep1 - contains state vector
//!   - `varUint(1)`: SyncStep2 - contains missing updates
//!   - `varUint(2)`: Update - contains incremental update
//! - `varUint(1)`: Awareness message
//! - `varUint(2)`: Auth message
//!
//! Byte arrays are encoded as: `varUint(length) + raw bytes`

use crate::error::{EngineError, Result};

// ===========================================================================
// VarUint encoding/decoding (y-protocols compatible)
// ===========================================================================

/// Write a variable-length unsigned integer to a buffer.
/// Uses 7 bits per byte, with MSB indicating continuation.
fn write_var_uint(buf: &mut Vec<u8>, mut num: u64) {
    loop {
        let mut byte = (num & 0x7F) as u8;
        num >>= 7;
        if num > 0 {
            byte |= 0x80; // Set continuation bit
        }
        buf.push(byte);
        if num == 0 {
            break;
        }
    }
}

/// Read a variable-length unsigned integer from a buffer.
/// Returns (value, bytes_consumed) or None if buffer is too short.
fn read_var_uint(data: &[u8]) -> Option<(u64, usize)> {
    let mut num: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        num |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((num, i + 1));
        }
        shift += 7;
        if shift > 63 {
            return None; // Overflow
        }
    }
    None // Incomplete
}

/// Write a byte array with length prefix (varUint encoding).
fn write_var_byte_array(buf: &mut Vec<u8>, data: &[u8]) {
    write_var_uint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Read a byte array with length prefix.
/// Returns (data, bytes_consumed) or None if buffer is too short.
fn read_var_byte_array(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    let (len, len_bytes) = read_var_uint(data)?;
    let len = len as usize;
    let total = len_bytes.checked_add(len)?;
    if data.len() < total {
        return None;
    }
    Some((data[len_bytes..total].to_vec(), total))
}

/// Message type bytes for the Y-sync protocol.
mod msg_type {
    /// Sync message (SyncStep1, SyncStep2, Update)
    pub const SYNC: u8 = 0;
}

/// Sync sub-message types.
mod sync_type {
    /// SyncStep1: Initial state vector exchange
    pub const STEP1: u8 = 0;
    /// SyncStep2: Missing updates response
    pub const STEP2: u8 = 1;
    /// Update: Incremental update
    pub const UPDATE: u8 = 2;
}

/// Y-sync message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// SyncStep1 contains a state vector
    SyncStep1(Vec<u8>),
    /// SyncStep2 contains missing updates
    SyncStep2(Vec<u8>),
    /// Update contains an incremental update
    Update(Vec<u8>),
}

impl SyncMessage {
    /// Encode the message to bytes using y-protocols compatible format.
    /// Format: varUint(msgType) + varUint(syncType) + varByteArray(payload)
    pub fn encode(&self) -> Vec<u8> {
        let (sync_type, payload) = match self {
            SyncMessage::SyncStep1(sv) => (sync_type::STEP1, sv),
            SyncMessage::SyncStep2(update) => (sync_type::STEP2, update),
            SyncMessage::Update(update) => (sync_type::UPDATE, update),
        };
        let mut buf = Vec::with_capacity(2 + payload.len() + 5);
        write_var_uint(&mut buf, msg_type::SYNC as u64);
        write_var_uint(&mut buf, sync_type as u64);
        write_var_byte_array(&mut buf, payload);
        buf
    }

    /// Decode a message from bytes.
    ///
    /// Returns `Ok(None)` for empty, incomplete, or non-sync frames; that
    /// traffic is discarded at this boundary, never propagated.
    pub fn decode(data: &[u8]) -> Result<Option<Self>> {
        if data.is_empty() {
            return Ok(None);
        }

        let Some((msg_type_val, msg_type_bytes)) = read_var_uint(data) else {
            log::debug!("[y-sync] Incomplete message type, discarding frame");
            return Ok(None);
        };

        if msg_type_val != msg_type::SYNC as u64 {
            // Awareness, auth, or probe traffic; not ours to handle.
            log::debug!("[y-sync] Non-sync message type {}, discarding", msg_type_val);
            return Ok(None);
        }

        let remaining = &data[msg_type_bytes..];
        let Some((sync_type_val, sync_type_bytes)) = read_var_uint(remaining) else {
            log::debug!("[y-sync] Incomplete sync type, discarding frame");
            return Ok(None);
        };

        let Some((payload, _)) = read_var_byte_array(&remaining[sync_type_bytes..]) else {
            log::debug!("[y-sync] Incomplete payload, discarding frame");
            return Ok(None);
        };

        match sync_type_val as u8 {
            sync_type::STEP1 => Ok(Some(SyncMessage::SyncStep1(payload))),
            sync_type::STEP2 => Ok(Some(SyncMessage::SyncStep2(payload))),
            sync_type::UPDATE => Ok(Some(SyncMessage::Update(payload))),
            other => Err(EngineError::Crdt(format!("Unknown sync type: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_uint_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64] {
            let mut buf = Vec::new();
            write_var_uint(&mut buf, value);
            let (decoded, consumed) = read_var_uint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_message_round_trip() {
        for msg in [
            SyncMessage::SyncStep1(vec![1, 2, 3]),
            SyncMessage::SyncStep2(vec![4, 5]),
            SyncMessage::Update(vec![6; 300]),
        ] {
            let encoded = msg.encode();
            let decoded = SyncMessage::decode(&encoded).unwrap().unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_empty_frame_absorbed() {
        assert_eq!(SyncMessage::decode(&[]).unwrap(), None);
    }

    #[test]
    fn test_non_sync_frame_absorbed() {
        // Awareness message type
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 1);
        write_var_byte_array(&mut buf, &[1, 2, 3]);
        assert_eq!(SyncMessage::decode(&buf).unwrap(), None);
    }

    #[test]
    fn test_truncated_payload_absorbed() {
        let encoded = SyncMessage::Update(vec![9; 64]).encode();
        // Drop the tail so the declared length exceeds the frame.
        assert_eq!(SyncMessage::decode(&encoded[..10]).unwrap(), None);
    }

    #[test]
    fn test_probe_garbage_absorbed() {
        // Continuation bits forever: incomplete varuint.
        assert_eq!(SyncMessage::decode(&[0x80; 16]).unwrap(), None);
    }

    #[test]
    fn test_unknown_sync_subtype_is_error() {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 0); // sync
        write_var_uint(&mut buf, 7); // bogus sub-type
        write_var_byte_array(&mut buf, &[]);
        assert!(SyncMessage::decode(&buf).is_err());
    }
}
