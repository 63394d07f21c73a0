//! The connect handshake: the first frame exchanged after a TCP connect.

use bytes::{Buf, BufMut, BytesMut};

use crate::Error;

/// Opaque session password. The server never sends more than 16 bytes, but
/// a caller-supplied password from a previous session is trusted verbatim.
pub type Password = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub protocol_version: i32,
    pub last_zxid_seen: i64,
    pub timeout_ms: i32,
    pub session_id: i64,
    pub password: Password,
}

impl ConnectRequest {
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coord_client_codec::connect::ConnectRequest;
    ///
    /// let req = ConnectRequest {
    ///     protocol_version: 0,
    ///     last_zxid_seen: 0,
    ///     timeout_ms: 30_000,
    ///     session_id: 0,
    ///     password: vec![],
    /// };
    ///
    /// let mut buf = BytesMut::new();
    /// req.encode(&mut buf);
    ///
    /// let decoded = ConnectRequest::decode(&mut buf).unwrap();
    /// assert_eq!(decoded, req);
    /// ```
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_i32(self.protocol_version);
        out.put_i64(self.last_zxid_seen);
        out.put_i32(self.timeout_ms);
        out.put_i64(self.session_id);
        out.put_i32(self.password.len() as i32);
        out.put(self.password.as_slice());
    }

    pub fn decode(buf: &mut BytesMut) -> Result<Self, Error> {
        if buf.len() < 4 + 8 + 4 + 8 + 4 {
            return Err(Error::InvalidInput);
        }

        let protocol_version = buf.get_i32();
        let last_zxid_seen = buf.get_i64();
        let timeout_ms = buf.get_i32();
        let session_id = buf.get_i64();
        let password = read_length_prefixed(buf)?;

        Ok(Self {
            protocol_version,
            last_zxid_seen,
            timeout_ms,
            session_id,
            password,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResponse {
    pub protocol_version: i32,
    pub negotiated_timeout_ms: i32,
    pub session_id: i64,
    pub password: Password,
}

impl ConnectResponse {
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_i32(self.protocol_version);
        out.put_i32(self.negotiated_timeout_ms);
        out.put_i64(self.session_id);
        out.put_i32(self.password.len() as i32);
        out.put(self.password.as_slice());
    }

    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coord_client_codec::connect::ConnectResponse;
    ///
    /// let resp = ConnectResponse {
    ///     protocol_version: 0,
    ///     negotiated_timeout_ms: 4000,
    ///     session_id: 0x1122_3344,
    ///     password: vec![1, 2, 3, 4],
    /// };
    ///
    /// let mut buf = BytesMut::new();
    /// resp.encode(&mut buf);
    ///
    /// let decoded = ConnectResponse::decode(&mut buf).unwrap();
    /// assert_eq!(decoded, resp);
    /// ```
    pub fn decode(buf: &mut BytesMut) -> Result<Self, Error> {
        if buf.len() < 4 + 4 + 8 + 4 {
            return Err(Error::InvalidInput);
        }

        let protocol_version = buf.get_i32();
        let negotiated_timeout_ms = buf.get_i32();
        let session_id = buf.get_i64();
        let password = read_length_prefixed(buf)?;

        Ok(Self {
            protocol_version,
            negotiated_timeout_ms,
            session_id,
            password,
        })
    }

    /// A response with `session_id == 0` means the server refused the
    /// session presented in the request.
    #[inline(always)]
    pub fn is_refused(&self) -> bool {
        self.session_id == 0
    }
}

fn read_length_prefixed(buf: &mut BytesMut) -> Result<Vec<u8>, Error> {
    if buf.len() < 4 {
        return Err(Error::InvalidInput);
    }

    let len = buf.get_i32();
    if len < 0 {
        return Err(Error::NegativeFrameLen(len));
    }

    let len = len as usize;
    if buf.len() < len {
        return Err(Error::InvalidInput);
    }

    Ok(buf.split_to(len).to_vec())
}
