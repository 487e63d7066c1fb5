// Connection credentials: a token source plus the service instance ID the
// session first synced against.
//
// The instance ID is appended to the bearer credential so a restarted
// synchronization service (new instance) rejects stale sessions instead of
// merging their pre-restart state. It is captured at most once per session.

use std::fmt;
use std::sync::{Arc, OnceLock};

use coreport_common::types::SessionCredential;

type TokenFn = dyn Fn() -> String + Send + Sync;

/// Shared, cloneable credential source for one session.
#[derive(Clone)]
pub struct CredentialSource {
    token: Arc<TokenFn>,
    instance_id: Arc<OnceLock<String>>,
}

impl CredentialSource {
    /// Token re-read from `token` on every connection attempt.
    pub fn new<F>(token: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self { token: Arc::new(token), instance_id: Arc::new(OnceLock::new()) }
    }

    /// Constant token.
    pub fn fixed(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::new(move || token.clone())
    }

    /// Credential for the next connection attempt.
    pub fn current(&self) -> SessionCredential {
        SessionCredential { token: (self.token)(), instance_id: self.instance_id.get().cloned() }
    }

    /// `Authorization` header value for the next connection attempt.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.current())
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.get().map(String::as_str)
    }

    pub fn has_instance_id(&self) -> bool {
        self.instance_id.get().is_some()
    }

    /// Record the instance ID. Returns `false` if one was already captured.
    pub fn capture_instance_id(&self, instance_id: impl Into<String>) -> bool {
        self.instance_id.set(instance_id.into()).is_ok()
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSource")
            .field("token", &"<redacted>")
            .field("instance_id", &self.instance_id.get())
            .finish()
    }
}
