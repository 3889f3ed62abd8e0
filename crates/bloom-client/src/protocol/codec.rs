//! Frame codec
//!
//! Wire format: `[len: u32 big-endian][bincode body; len bytes]`.
//!
//! Decoding works on a growable buffer so a reader can be interrupted
//! between reads without losing partial frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Largest accepted frame body (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Serialize a message into one length-prefixed frame
pub fn encode_frame<M: Serialize>(message: &M) -> Result<Bytes, CodecError> {
    let body = bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut buf = BytesMut::with_capacity(LEN_PREFIX + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);
    Ok(buf.freeze())
}

/// Take one complete frame off the front of `buf`
///
/// Returns `Ok(None)` and leaves `buf` untouched when the frame is not
/// complete yet.
pub fn decode_frame<M: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<M>, CodecError> {
    if buf.len() < LEN_PREFIX {
        return Ok(None);
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    if buf.len() < LEN_PREFIX + len {
        buf.reserve(LEN_PREFIX + len - buf.len());
        return Ok(None);
    }

    buf.advance(LEN_PREFIX);
    let body = buf.split_to(len);
    bincode::deserialize(&body)
        .map(Some)
        .map_err(|e| CodecError::Decode(e.to_string()))
}
