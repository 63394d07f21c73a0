//! Public error type. Matches `coord_client_engine::error::Error`'s
//! hand-rolled shape rather than a `thiserror` derive.

use std::fmt;

use codec::error_code::ErrorCode;

#[derive(Debug)]
pub enum ClientError {
    /// A path failed local validation; never reaches the wire.
    InvalidPath(String),
    /// `Create`/`SetACL` was called with an empty ACL list.
    EmptyAcl,
    /// The server reported a non-OK error code for this request.
    Server(ErrorCode),
    /// The connection died while this request was in flight; outcome
    /// unknown to the caller.
    ConnectionLoss,
    /// The session is gone; no further operations are accepted.
    SessionExpired,
    /// The SASL handshake failed.
    AuthFailed,
    /// The request was cancelled before it completed.
    Cancelled,
    /// A facade-level body was malformed.
    Protocol(String),
    /// The connect string or other client configuration was invalid.
    Config(String),
}

impl std::error::Error for ClientError {}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::InvalidPath(path) => write!(f, "invalid path: {path}"),
            ClientError::EmptyAcl => write!(f, "ACL list must not be empty"),
            ClientError::Server(code) => write!(f, "server error: {code:?}"),
            ClientError::ConnectionLoss => write!(f, "connection loss"),
            ClientError::SessionExpired => write!(f, "session expired"),
            ClientError::AuthFailed => write!(f, "authentication failed"),
            ClientError::Cancelled => write!(f, "request cancelled"),
            ClientError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ClientError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl From<engine::Error> for ClientError {
    fn from(value: engine::Error) -> Self {
        match value {
            engine::Error::Config(msg) => ClientError::Config(msg),
            engine::Error::Io(err) => ClientError::Protocol(err.to_string()),
            engine::Error::Protocol(err) => ClientError::Protocol(err.to_string()),
            engine::Error::XidMismatch { expected, got } => {
                ClientError::Protocol(format!("xid mismatch: expected {expected}, got {got}"))
            }
            engine::Error::ConnectionLoss => ClientError::ConnectionLoss,
            engine::Error::Server(code) => ClientError::Server(code),
            engine::Error::SessionExpired => ClientError::SessionExpired,
            engine::Error::AuthFailed => ClientError::AuthFailed,
            engine::Error::Cancelled => ClientError::Cancelled,
        }
    }
}
