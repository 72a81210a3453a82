use crate::backend::TrustStore;
use crate::bridge::Owned;
use crate::errors::SecError;
use crate::Result;

/// Authentication to request when a key needs user presence.
///
/// A fresh native context is created for each signing session and attached
/// to the key lookup, so one prompt covers both the lookup and the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    reason: String,
}

impl AuthContext {
    /// `reason` is shown to the user in the authentication prompt.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub(crate) fn open<'s>(&self, store: &'s dyn TrustStore) -> Result<Owned<'s>> {
        store
            .create_auth_context(&self.reason)
            .map_err(SecError::from)
    }
}
