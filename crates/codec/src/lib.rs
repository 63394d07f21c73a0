//! ## Wire protocol for the coordination service client
//!
//! The wire layer is a stream of length-prefixed frames. Each frame is a
//! 4-byte big-endian length followed by that many payload bytes. Three
//! distinguished shapes are built on top of frames: the connect handshake,
//! the per-request envelope, and the per-response envelope. None of the
//! shapes carry any cryptographic material; optional SASL authentication is
//! an injected capability that rides inside ordinary auth-info envelopes.

pub mod connect;
pub mod envelope;
pub mod error_code;
pub mod methods;

use std::array::TryFromSliceError;

use bytes::{Buf, BufMut, BytesMut};

/// Frames larger than this are rejected outright; a well-behaved server
/// never sends one, so seeing it means the stream is corrupt or hostile.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub enum Error {
    InvalidInput,
    FrameTooLarge(usize),
    NegativeFrameLen(i32),
    UnknownOpCode(i32),
    UnknownErrorCode(i32),
    TryFromSliceError(TryFromSliceError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

/// Writes `payload` to `out` as a length-prefixed frame.
///
/// # Test
///
/// ```
/// use bytes::BytesMut;
/// use coord_client_codec::write_frame;
///
/// let mut buf = BytesMut::new();
/// write_frame(b"hi", &mut buf);
///
/// assert_eq!(&buf[..], &[0, 0, 0, 2, b'h', b'i']);
/// ```
pub fn write_frame(payload: &[u8], out: &mut BytesMut) {
    out.put_u32(payload.len() as u32);
    out.put(payload);
}

/// Attempts to pull one complete frame out of `buf`, leaving any trailing
/// partial frame in place for the next read. `max_len` rejects a frame
/// outright rather than allocating for it; callers typically pass a
/// configured ceiling, falling back to [`MAX_FRAME_LEN`].
///
/// # Test
///
/// ```
/// use bytes::BytesMut;
/// use coord_client_codec::{decode_frame, write_frame, MAX_FRAME_LEN};
///
/// let mut wire = BytesMut::new();
/// write_frame(b"hello", &mut wire);
/// wire.extend_from_slice(&[0, 0]);
///
/// let frame = decode_frame(&mut wire, MAX_FRAME_LEN).unwrap().unwrap();
/// assert_eq!(&frame[..], b"hello");
/// assert!(decode_frame(&mut wire, MAX_FRAME_LEN).unwrap().is_none());
/// ```
pub fn decode_frame(buf: &mut BytesMut, max_len: usize) -> Result<Option<BytesMut>, Error> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let len = i32::from_be_bytes(buf[..4].try_into()?);
    if len < 0 {
        return Err(Error::NegativeFrameLen(len));
    }

    let len = len as usize;
    if len > max_len {
        return Err(Error::FrameTooLarge(len));
    }

    if buf.len() < 4 + len {
        return Ok(None);
    }

    buf.advance(4);
    Ok(Some(buf.split_to(len)))
}
