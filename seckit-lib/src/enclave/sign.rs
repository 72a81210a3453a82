//! Signing with a hardware-held private key.

use super::{EnclaveKey, EnclaveKeys};
use crate::bridge::{Bridge, NativeType, Symbol};
use crate::errors::SecError;
use crate::query::Lookup;
use crate::Result;

impl EnclaveKeys<'_> {
    /// Sign `digest` with the private half of `key`.
    ///
    /// The private key is located by its application label, which the store
    /// assigns and never changes. When the key carries an [`AuthContext`]
    /// the context is created once and attached to the lookup, so it also
    /// authorizes the signature. Returns a DER-encoded ECDSA signature.
    ///
    /// [`AuthContext`]: super::AuthContext
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            skip_all,
            fields(
                application_label = %hex::encode(&key.application_label),
                digest_len = digest.len(),
            )
        )
    )]
    pub fn sign(&self, key: &EnclaveKey, digest: &[u8]) -> Result<Vec<u8>> {
        if digest.is_empty() {
            return Err(SecError::invalid_input("digest was empty"));
        }

        let store = self.store;
        let bridge = Bridge::new(store.runtime());
        let context = key
            .auth_context
            .as_ref()
            .map(|auth| auth.open(store))
            .transpose()?;

        let mut lookup = Lookup::keys()
            .application_label(&key.application_label)
            .scoped(self.config);
        if let Some(context) = &context {
            lookup = lookup.authenticated_by(context.borrow());
        }
        let private = lookup.fetch_one(store)?;
        if bridge.type_of(private.borrow()) != NativeType::Key {
            return Err(SecError::malformed(bridge.describe(private.borrow())));
        }

        let digest = bridge.wrap_bytes(digest)?;
        let signature = store
            .create_signature(
                private.borrow(),
                Symbol::EcdsaSignatureDigestX962Sha256,
                &digest,
            )
            .map_err(SecError::from)?;
        let signature = bridge.read_bytes(signature.borrow())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(signature_len = signature.len(), "signed digest");
        Ok(signature)
    }
}
