//! Node metadata returned alongside data/ACL reads, and the create-mode
//! flags that pick ephemeral/sequential behavior.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub czxid: i64,
    pub mzxid: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    pub pzxid: i64,
}

impl Stat {
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_i64(self.czxid);
        out.put_i64(self.mzxid);
        out.put_i64(self.ctime);
        out.put_i64(self.mtime);
        out.put_i32(self.version);
        out.put_i32(self.cversion);
        out.put_i32(self.aversion);
        out.put_i64(self.ephemeral_owner);
        out.put_i32(self.data_length);
        out.put_i32(self.num_children);
        out.put_i64(self.pzxid);
    }

    pub fn decode(buf: &mut BytesMut) -> Result<Self, ClientError> {
        if buf.len() < 8 * 6 + 4 * 5 {
            return Err(ClientError::Protocol("truncated stat".into()));
        }

        Ok(Self {
            czxid: buf.get_i64(),
            mzxid: buf.get_i64(),
            ctime: buf.get_i64(),
            mtime: buf.get_i64(),
            version: buf.get_i32(),
            cversion: buf.get_i32(),
            aversion: buf.get_i32(),
            ephemeral_owner: buf.get_i64(),
            data_length: buf.get_i32(),
            num_children: buf.get_i32(),
            pzxid: buf.get_i64(),
        })
    }
}

/// Bit 0: ephemeral. Bit 1: sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }

    pub fn to_flag(self) -> i32 {
        (self.is_ephemeral() as i32) | ((self.is_sequential() as i32) << 1)
    }

    pub fn from_flag(flag: i32) -> Self {
        match (flag & 0b01 != 0, flag & 0b10 != 0) {
            (false, false) => CreateMode::Persistent,
            (true, false) => CreateMode::Ephemeral,
            (false, true) => CreateMode::PersistentSequential,
            (true, true) => CreateMode::EphemeralSequential,
        }
    }
}
