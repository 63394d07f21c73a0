//! ACL model: permission bits, the `(scheme, id)` identity pair, and the
//! three canonical ACL lists every façade construction test exercises.

use bytes::BytesMut;

use crate::{error::ClientError, wire::{get_str, put_str}};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission(pub i32);

impl Permission {
    pub const READ: Permission = Permission(1 << 0);
    pub const WRITE: Permission = Permission(1 << 1);
    pub const CREATE: Permission = Permission(1 << 2);
    pub const DELETE: Permission = Permission(1 << 3);
    pub const ADMIN: Permission = Permission(1 << 4);
    pub const ALL: Permission =
        Permission(Self::READ.0 | Self::WRITE.0 | Self::CREATE.0 | Self::DELETE.0 | Self::ADMIN.0);
}

impl std::ops::BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permission(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id {
    pub scheme: String,
    pub id: String,
}

impl Id {
    pub fn anyone_unsafe() -> Self {
        Self {
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }
    }

    pub fn auth_ids() -> Self {
        Self {
            scheme: "auth".to_string(),
            id: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub perms: Permission,
    pub id: Id,
}

pub fn open_acl_unsafe() -> Vec<Acl> {
    vec![Acl {
        perms: Permission::ALL,
        id: Id::anyone_unsafe(),
    }]
}

pub fn read_acl_unsafe() -> Vec<Acl> {
    vec![Acl {
        perms: Permission::READ,
        id: Id::anyone_unsafe(),
    }]
}

pub fn creator_all_acl() -> Vec<Acl> {
    vec![Acl {
        perms: Permission::ALL,
        id: Id::auth_ids(),
    }]
}

pub fn encode_acl_list(acls: &[Acl], out: &mut BytesMut) {
    use bytes::BufMut;

    out.put_i32(acls.len() as i32);
    for acl in acls {
        out.put_i32(acl.perms.0);
        put_str(out, &acl.id.scheme);
        put_str(out, &acl.id.id);
    }
}

pub fn decode_acl_list(buf: &mut BytesMut) -> Result<Vec<Acl>, ClientError> {
    use bytes::Buf;

    if buf.len() < 4 {
        return Err(ClientError::Protocol("truncated ACL list length".into()));
    }

    let count = buf.get_i32();
    if count < 0 {
        return Err(ClientError::Protocol("negative ACL list length".into()));
    }

    let mut acls = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if buf.len() < 4 {
            return Err(ClientError::Protocol("truncated ACL entry".into()));
        }
        let perms = Permission(buf.get_i32());
        let scheme = get_str(buf)?;
        let id = get_str(buf)?;
        acls.push(Acl {
            perms,
            id: Id { scheme, id },
        });
    }

    Ok(acls)
}
