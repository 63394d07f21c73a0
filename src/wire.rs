//! Length-prefixed primitives for the per-operation request/response bodies
//! the façade builds on top of the core's opaque envelope body. These
//! shapes are facade-internal — the core (and `coord-client-codec`) never
//! interprets them.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ClientError;

pub fn put_bytes(out: &mut BytesMut, data: &[u8]) {
    out.put_i32(data.len() as i32);
    out.put(data);
}

pub fn put_str(out: &mut BytesMut, s: &str) {
    put_bytes(out, s.as_bytes());
}

pub fn get_bytes(buf: &mut BytesMut) -> Result<Vec<u8>, ClientError> {
    if buf.len() < 4 {
        return Err(ClientError::Protocol("truncated length prefix".into()));
    }

    let len = buf.get_i32();
    if len < 0 || buf.len() < len as usize {
        return Err(ClientError::Protocol("truncated body".into()));
    }

    Ok(buf.split_to(len as usize).to_vec())
}

pub fn get_str(buf: &mut BytesMut) -> Result<String, ClientError> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes).map_err(|_| ClientError::Protocol("non-utf8 string".into()))
}
