//! Frame layout shared by every peer:
//!
//! ```text
//! [Tag(1)] [SenderTick(8)] [Payload(N)]
//! ```
//!
//! The tag selects the event kind through the registry; the sender tick is
//! relative to the sender's game-start epoch.

use crate::config::FRAME_HEADER_LEN;
use crate::core::codec::{Deserializer, Serializer};
use crate::error::{constants, Result, SyncError};
use bytes::Bytes;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    pub sender_tick: u64,
}

/// Builds a frame around an already serialized payload
pub fn wrap(tag: u8, sender_tick: u64, payload: &[u8]) -> Bytes {
    let mut ser = Serializer::with_capacity(FRAME_HEADER_LEN + payload.len());
    ser.write_u8(tag);
    ser.write_u64(sender_tick);
    ser.write_bytes(payload);
    ser.freeze()
}

/// Splits a frame into header and payload.
///
/// Only the length is checked here; whether the tag is registered is the
/// registry's call.
pub fn unwrap_header(frame: &[u8]) -> Result<(FrameHeader, &[u8])> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(SyncError::MalformedFrame(constants::ERR_FRAME_TOO_SHORT));
    }

    let mut de = Deserializer::from_bytes(Bytes::copy_from_slice(&frame[..FRAME_HEADER_LEN]));
    let header = FrameHeader {
        tag: de.read_u8(),
        sender_tick: de.read_u64(),
    };
    Ok((header, &frame[FRAME_HEADER_LEN..]))
}

/// Total on-wire size of a frame carrying `payload_len` bytes
#[inline]
pub fn framed_len(payload_len: usize) -> usize {
    FRAME_HEADER_LEN + payload_len
}
