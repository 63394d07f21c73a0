//! Flat, hand-rolled error type for the engine crate, matching the style of
//! `coord_client_codec::Error` rather than a `thiserror` derive.

use std::{fmt, io};

use codec::error_code::ErrorCode;

#[derive(Debug)]
pub enum Error {
    /// The connect string is empty or cannot be parsed.
    Config(String),
    /// A socket-level failure while a session was established.
    Io(io::Error),
    /// A frame or envelope violated the wire format.
    Protocol(codec::Error),
    /// The reply's xid did not match the head of the outbound queue.
    XidMismatch { expected: i32, got: i32 },
    /// The connection died while this request was in flight; outcome
    /// unknown to the caller.
    ConnectionLoss,
    /// The server reported a non-OK error code for this request.
    Server(ErrorCode),
    /// The session is gone; no further operations are accepted.
    SessionExpired,
    /// The SASL handshake failed.
    AuthFailed,
    /// The request was cancelled by the caller before it completed.
    Cancelled,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<codec::Error> for Error {
    fn from(value: codec::Error) -> Self {
        Self::Protocol(value)
    }
}
