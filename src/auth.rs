//! A concrete SASL authenticator: packages a `(scheme, credentials)` pair
//! into the auth-info payload the core sends at xid `-4`, supplied once at
//! construction rather than threaded through every call.

use async_trait::async_trait;

pub use engine::auth::{NoAuth, SaslAuthenticator};

use crate::wire::put_str;

/// Authenticates with a fixed scheme (e.g. `"digest"`) and credential
/// bytes, supplied once at construction.
pub struct StaticAuthenticator {
    scheme: String,
    credentials: Vec<u8>,
}

impl StaticAuthenticator {
    pub fn new(scheme: impl Into<String>, credentials: Vec<u8>) -> Self {
        Self {
            scheme: scheme.into(),
            credentials,
        }
    }
}

#[async_trait]
impl SaslAuthenticator for StaticAuthenticator {
    async fn auth_info(&self) -> Option<Vec<u8>> {
        let mut body = bytes::BytesMut::new();
        put_str(&mut body, &self.scheme);
        body.extend_from_slice(&self.credentials);
        Some(body.to_vec())
    }
}
