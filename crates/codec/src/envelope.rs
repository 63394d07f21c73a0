//! Per-request and per-response envelopes that ride inside frames once a
//! session is established.

use bytes::{Buf, BufMut, BytesMut};

use crate::Error;

/// Reserved xids. User-request xids are strictly positive.
pub const XID_NOTIFICATION: i32 = -1;
pub const XID_PING: i32 = -2;
pub const XID_AUTH: i32 = -4;
pub const XID_CLOSE_SESSION: i32 = -11;

/// `xid:i32 ++ type:i32 ++ body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub xid: i32,
    pub op_code: i32,
}

impl RequestHeader {
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_i32(self.xid);
        out.put_i32(self.op_code);
    }

    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coord_client_codec::envelope::RequestHeader;
    ///
    /// let header = RequestHeader { xid: 7, op_code: 1 };
    /// let mut buf = BytesMut::new();
    /// header.encode(&mut buf);
    ///
    /// assert_eq!(RequestHeader::decode(&mut buf).unwrap(), header);
    /// ```
    pub fn decode(buf: &mut BytesMut) -> Result<Self, Error> {
        if buf.len() < 8 {
            return Err(Error::InvalidInput);
        }

        Ok(Self {
            xid: buf.get_i32(),
            op_code: buf.get_i32(),
        })
    }
}

/// `xid:i32 ++ zxid:i64 ++ err:i32 ++ body_if_err==0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: i32,
    pub zxid: i64,
    pub err: i32,
}

impl ReplyHeader {
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_i32(self.xid);
        out.put_i64(self.zxid);
        out.put_i32(self.err);
    }

    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use coord_client_codec::envelope::ReplyHeader;
    ///
    /// let header = ReplyHeader { xid: 7, zxid: 42, err: 0 };
    /// let mut buf = BytesMut::new();
    /// header.encode(&mut buf);
    ///
    /// assert_eq!(ReplyHeader::decode(&mut buf).unwrap(), header);
    /// ```
    pub fn decode(buf: &mut BytesMut) -> Result<Self, Error> {
        if buf.len() < 16 {
            return Err(Error::InvalidInput);
        }

        Ok(Self {
            xid: buf.get_i32(),
            zxid: buf.get_i64(),
            err: buf.get_i32(),
        })
    }
}
