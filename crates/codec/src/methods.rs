//! Request types used by the facade. The wire value is a plain `i32`.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// # Test
///
/// ```
/// use coord_client_codec::methods::OpCode;
/// use std::convert::TryFrom;
///
/// let raw: i32 = OpCode::Create.into();
/// assert_eq!(raw, 1);
/// assert_eq!(OpCode::try_from(1).unwrap(), OpCode::Create);
/// assert!(OpCode::try_from(999).is_err());
/// ```
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum OpCode {
    Create = 1,
    Delete = 2,
    Exists = 3,
    GetData = 4,
    SetData = 5,
    GetACL = 6,
    SetACL = 7,
    GetChildren2 = 12,
    Sync = 9,
    Ping = 11,
    Auth = 100,
    CloseSession = -11,
}
