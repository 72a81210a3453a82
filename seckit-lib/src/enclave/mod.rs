//! Secure Enclave key store.
//!
//! Keys are P-256 and generated inside the secure element. Only the public
//! half and the identity attributes ever leave it: [`EnclaveKey`] is a
//! snapshot of those, and signing goes back to the store by application
//! label.

mod auth;
mod sign;

pub use auth::AuthContext;

use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;

use crate::backend::{AccessControlFlags, TrustStore};
use crate::bridge::{AttrKey, Borrowed, Bridge, NativeType, Symbol};
use crate::config::StoreConfig;
use crate::errors::SecError;
use crate::query::{delete_all_matching, DeleteError, Lookup, Predicate, ReturnFlags};
use crate::Result;

/// Reduce a digest to the 32 bytes ECDSA over P-256 signs.
///
/// Longer digests keep their leftmost bytes. Shorter ones are left-padded
/// with zeros, which preserves their integer value.
pub(crate) fn digest_to_field(digest: &[u8]) -> [u8; 32] {
    let mut field = [0u8; 32];
    if digest.len() >= field.len() {
        field.copy_from_slice(&digest[..32]);
    } else {
        field[32 - digest.len()..].copy_from_slice(digest);
    }
    field
}

/// Public half and identity of a hardware-backed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclaveKey {
    pub tag: String,
    pub label: String,
    /// Store-assigned identifier, a hash of the public key.
    pub application_label: Vec<u8>,
    pub public_key: PublicKey,
    /// Authentication to request when signing with this key.
    pub auth_context: Option<AuthContext>,
}

impl EnclaveKey {
    pub fn with_auth_context(mut self, context: AuthContext) -> Self {
        self.auth_context = Some(context);
        self
    }

    /// Uncompressed SEC1 encoding of the public point.
    pub fn public_point(&self) -> Vec<u8> {
        self.public_key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Check a DER signature over `digest` against this key's public point.
    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_der(signature) else {
            return false;
        };
        VerifyingKey::from(&self.public_key)
            .verify_prehash(&digest_to_field(digest), &signature)
            .is_ok()
    }
}

/// Parameters for [`EnclaveKeys::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKey {
    /// Application tag, reverse DNS by convention (`com.example.keys.mykey`).
    pub tag: String,
    pub label: String,
    /// Require biometry or the device passcode for every signature.
    pub require_user_presence: bool,
}

impl NewKey {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            label: String::new(),
            require_user_presence: false,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn require_user_presence(mut self, required: bool) -> Self {
        self.require_user_presence = required;
        self
    }
}

/// Key operations against one trust store and scope.
#[derive(Clone, Copy)]
pub struct EnclaveKeys<'a> {
    store: &'a dyn TrustStore,
    config: &'a StoreConfig,
}

impl<'a> EnclaveKeys<'a> {
    pub fn new(store: &'a dyn TrustStore, config: &'a StoreConfig) -> Self {
        Self { store, config }
    }

    /// Generate a permanent key in the secure element.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(tag = %input.tag, user_presence = input.require_user_presence))
    )]
    pub fn create(&self, input: &NewKey) -> Result<EnclaveKey> {
        let store = self.store;
        let bridge = Bridge::new(store.runtime());

        let mut flags = AccessControlFlags::PRIVATE_KEY_USAGE;
        if input.require_user_presence {
            flags = flags | AccessControlFlags::USER_PRESENCE;
        }
        let access = store
            .create_access_control(Symbol::AccessibleWhenUnlockedThisDeviceOnly, flags)
            .map_err(SecError::from)?;

        let private_attrs = Predicate::new()
            .with(AttrKey::AccessControl, access.borrow())
            .with(AttrKey::ApplicationTag, input.tag.as_bytes())
            .with(AttrKey::IsPermanent, true);
        let mut parameters = Predicate::new()
            .with(AttrKey::TokenId, Symbol::TokenIdSecureEnclave)
            .with(AttrKey::KeyType, Symbol::KeyTypeEc)
            .with(AttrKey::PrivateKeyAttrs, private_attrs);
        if !input.label.is_empty() {
            parameters.insert(AttrKey::Label, input.label.as_str());
        }
        parameters.apply_scope(self.config);
        let parameters = parameters.render(&bridge)?;

        let private = store
            .create_random_key(&parameters)
            .map_err(SecError::from)?;
        let attributes = store
            .copy_key_attributes(private.borrow())
            .ok_or_else(|| SecError::malformed("private key without attributes"))?;
        let key = self.snapshot(&bridge, attributes.borrow(), private.borrow())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(application_label = %hex::encode(&key.application_label), "created key");
        Ok(key)
    }

    /// The one key under `tag` (and `label`, when non-empty).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn get(&self, tag: &str, label: &str) -> Result<EnclaveKey> {
        let record = self
            .lookup(tag, label)
            .returning(ReturnFlags::NONE.reference().attributes())
            .fetch_one(self.store)?;
        let bridge = Bridge::new(self.store.runtime());
        self.key_from_record(&bridge, record.borrow())
    }

    /// Every key under `tag` (and `label`, when non-empty).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn list(&self, tag: &str, label: &str) -> Result<Vec<EnclaveKey>> {
        let records = self
            .lookup(tag, label)
            .returning(ReturnFlags::NONE.reference().attributes())
            .fetch_all(self.store)?;
        let bridge = records.bridge();
        records
            .entries()?
            .into_iter()
            .map(|record| self.key_from_record(&bridge, record))
            .collect()
    }

    /// Remove every key under `tag` (and `label`, when non-empty).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn delete(&self, tag: &str, label: &str) -> std::result::Result<usize, DeleteError> {
        delete_all_matching(self.store, &self.lookup(tag, label).mutation_predicate())
    }

    fn lookup<'h>(&'h self, tag: &'h str, label: &'h str) -> Lookup<'h> {
        Lookup::keys().tag(tag).label(label).scoped(self.config)
    }

    fn key_from_record(&self, bridge: &Bridge<'_>, record: Borrowed<'_, '_>) -> Result<EnclaveKey> {
        let private = bridge
            .predicate_value(record, AttrKey::ValueRef)?
            .ok_or_else(|| SecError::malformed("record without key reference"))?;
        self.snapshot(bridge, record, private)
    }

    /// Snapshot a private key from its attribute map and reference.
    fn snapshot(
        &self,
        bridge: &Bridge<'_>,
        attributes: Borrowed<'_, '_>,
        private: Borrowed<'_, '_>,
    ) -> Result<EnclaveKey> {
        if bridge.type_of(private) != NativeType::Key {
            return Err(SecError::malformed(bridge.describe(private)));
        }
        let application_label = bridge.bytes_attr(attributes, AttrKey::ApplicationLabel)?;
        if application_label.is_empty() {
            return Err(SecError::malformed("key without application label"));
        }
        let tag = bridge.bytes_attr(attributes, AttrKey::ApplicationTag)?;

        Ok(EnclaveKey {
            tag: String::from_utf8_lossy(&tag).into_owned(),
            label: bridge.text_attr(attributes, AttrKey::Label)?,
            application_label,
            public_key: self.public_key(bridge, private)?,
            auth_context: None,
        })
    }

    fn public_key(&self, bridge: &Bridge<'_>, private: Borrowed<'_, '_>) -> Result<PublicKey> {
        let public = self
            .store
            .copy_public_key(private)
            .ok_or_else(|| SecError::malformed("public key unavailable"))?;
        let attributes = self
            .store
            .copy_key_attributes(public.borrow())
            .ok_or_else(|| SecError::malformed("public key without attributes"))?;
        let point = bridge
            .predicate_value(attributes.borrow(), AttrKey::ValueData)?
            .ok_or_else(|| SecError::malformed("public key without point data"))?;
        let point = bridge.read_bytes(point)?;
        PublicKey::from_sec1_bytes(&point)
            .map_err(|_| SecError::malformed("public key is not a P-256 point"))
    }
}
