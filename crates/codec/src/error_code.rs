//! Server-reported error codes, carried in the `err` field of a reply
//! envelope. Negative on the wire; this module gives the negative space
//! symbolic names.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Error;

/// # Test
///
/// ```
/// use coord_client_codec::error_code::ErrorCode;
/// use std::convert::TryFrom;
///
/// assert_eq!(ErrorCode::try_from(0).unwrap(), ErrorCode::Ok);
/// assert_eq!(ErrorCode::try_from(-101).unwrap(), ErrorCode::NoNode);
/// assert!(ErrorCode::try_from(-9999).is_err());
/// ```
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    SystemError = -1,
    RuntimeInconsistency = -2,
    DataInconsistency = -3,
    ConnectionLoss = -4,
    MarshallingError = -5,
    Unimplemented = -6,
    OperationTimeout = -7,
    BadArguments = -8,
    APIError = -100,
    NoNode = -101,
    NoAuth = -102,
    BadVersion = -103,
    NoChildrenForEphemerals = -108,
    NodeExists = -110,
    NotEmpty = -111,
    SessionExpired = -112,
    InvalidCallback = -113,
    InvalidACL = -114,
    AuthFailed = -115,
}

impl ErrorCode {
    #[inline(always)]
    pub fn is_ok(self) -> bool {
        matches!(self, ErrorCode::Ok)
    }

    /// Wraps a raw wire value, mapping anything unrecognized to
    /// [`Error::UnknownErrorCode`] rather than panicking — a future server
    /// extending the error table must not be able to crash old clients.
    pub fn from_wire(raw: i32) -> Result<Self, Error> {
        ErrorCode::try_from(raw).map_err(|_| Error::UnknownErrorCode(raw))
    }
}
