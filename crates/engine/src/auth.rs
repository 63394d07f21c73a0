//! SASL authentication seam: an injected capability the engine invokes at
//! a defined point in the connection lifecycle but does not implement.
//! The concrete implementation is supplied by the crate that assembles
//! the client.

use async_trait::async_trait;

/// Runs one SASL exchange once the session reaches `CONNECTED`. Returning
/// `None` means "nothing to send" (no authentication configured);
/// `Some(bytes)` is the auth-info payload to send with xid `-4`. The
/// server's reply decides success: an error reply drives the engine to
/// `AUTH_FAILED`, handled by the reader task rather than by this trait.
#[async_trait]
pub trait SaslAuthenticator: Send + Sync {
    async fn auth_info(&self) -> Option<Vec<u8>>;
}

/// The default when no authentication is configured.
pub struct NoAuth;

#[async_trait]
impl SaslAuthenticator for NoAuth {
    async fn auth_info(&self) -> Option<Vec<u8>> {
        None
    }
}
