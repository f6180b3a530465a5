//! Credential handling with secure memory.
//!
//! Uses the `secrecy` crate to prevent accidental logging of tokens. The
//! client never stores a token itself: it asks the [`CredentialStore`] on
//! every request, so a store backed by a refreshing session sees fresh values.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value for use.
    ///
    /// Only call this when building request headers.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Source of the tokens attached to every outgoing request.
///
/// Read-only from the client's point of view; refresh and expiry belong to
/// the implementation.
pub trait CredentialStore: Send + Sync {
    /// Bearer token for the `Authorization` header.
    fn bearer_token(&self) -> Option<SecretString>;

    /// Identity token for the `X-Identity-Token` header, if the session has one.
    fn identity_token(&self) -> Option<SecretString> {
        None
    }
}

impl<C: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<C> {
    fn bearer_token(&self) -> Option<SecretString> {
        (**self).bearer_token()
    }

    fn identity_token(&self) -> Option<SecretString> {
        (**self).identity_token()
    }
}

/// Fixed tokens held in memory.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    bearer: SecretString,
    identity: Option<SecretString>,
}

impl StaticCredentials {
    pub fn new(bearer: impl Into<String>) -> Self {
        Self {
            bearer: SecretString::new(bearer),
            identity: None,
        }
    }

    pub fn with_identity_token(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(SecretString::new(identity));
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn bearer_token(&self) -> Option<SecretString> {
        Some(self.bearer.clone())
    }

    fn identity_token(&self) -> Option<SecretString> {
        self.identity.clone()
    }
}

/// Tokens resolved for a single request.
#[derive(Clone, Debug)]
pub struct AuthHeaders {
    pub bearer: SecretString,
    pub identity: Option<SecretString>,
}

impl AuthHeaders {
    /// Snapshot the store. `None` when it has no bearer token.
    pub fn from_store(store: &dyn CredentialStore) -> Option<Self> {
        Some(Self {
            bearer: store.bearer_token()?,
            identity: store.identity_token(),
        })
    }
}
