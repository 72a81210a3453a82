//! Trust store backends.
//!
//! [`TrustStore`] is the external service: item add / copy-matching / update
//! / delete, access control and key generation, signing, and creation of
//! authentication contexts. Everything above this trait is platform neutral.
//!
//! # Implementations
//!
//! - [`InMemoryTrustStore`] - simulator over [`SimRuntime`](crate::bridge::SimRuntime)
//! - `KeychainTrustStore` - the macOS data protection keychain (macOS only)

use std::ops::BitOr;

use crate::bridge::{Borrowed, NativeRuntime, Owned, Symbol};

mod memory;

#[cfg(target_os = "macos")]
mod keychain;

pub use memory::{Authenticator, InMemoryTrustStore};

#[cfg(target_os = "macos")]
pub use keychain::KeychainTrustStore;

/// A native error object: a status code and an optional description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub description: Option<String>,
}

impl NativeError {
    pub fn new(code: i32) -> Self {
        Self {
            code,
            description: None,
        }
    }

    pub fn with_description(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: Some(description.into()),
        }
    }
}

/// Access control flags attached to a key at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessControlFlags(u64);

impl AccessControlFlags {
    pub const NONE: Self = Self(0);
    /// Require biometry or the device passcode.
    pub const USER_PRESENCE: Self = Self(1 << 0);
    /// Allow private key operations inside the secure element.
    pub const PRIVATE_KEY_USAGE: Self = Self(1 << 30);

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessControlFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The platform trust store.
///
/// Handles passed in must come from [`TrustStore::runtime`]. Handles returned
/// follow the create rule and are owned by the caller.
pub trait TrustStore: Send + Sync {
    /// The object model this store speaks.
    fn runtime(&self) -> &dyn NativeRuntime;

    /// Add an item described by `attributes`. Returns a status code.
    fn item_add(&self, attributes: &Owned<'_>) -> i32;

    /// Find items matching `query`. The result shape follows the query's
    /// return flags and match limit.
    fn item_copy_matching(&self, query: &Owned<'_>) -> (i32, Option<Owned<'_>>);

    /// Apply `changes` to every item matching `query`.
    fn item_update(&self, query: &Owned<'_>, changes: &Owned<'_>) -> i32;

    /// Remove one item matching `query`; reports a duplicate status when more
    /// than one matched.
    fn item_delete(&self, query: &Owned<'_>) -> i32;

    fn create_access_control(
        &self,
        protection: Symbol,
        flags: AccessControlFlags,
    ) -> Result<Owned<'_>, NativeError>;

    fn create_random_key(&self, parameters: &Owned<'_>) -> Result<Owned<'_>, NativeError>;

    fn copy_public_key(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>>;

    fn copy_key_attributes(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>>;

    fn create_signature(
        &self,
        key: Borrowed<'_, '_>,
        algorithm: Symbol,
        digest: &Owned<'_>,
    ) -> Result<Owned<'_>, NativeError>;

    /// Create an authentication context carrying the prompt reason.
    fn create_auth_context(&self, reason: &str) -> Result<Owned<'_>, NativeError>;
}

impl<T: TrustStore + ?Sized> TrustStore for Box<T> {
    fn runtime(&self) -> &dyn NativeRuntime {
        (**self).runtime()
    }

    fn item_add(&self, attributes: &Owned<'_>) -> i32 {
        (**self).item_add(attributes)
    }

    fn item_copy_matching(&self, query: &Owned<'_>) -> (i32, Option<Owned<'_>>) {
        (**self).item_copy_matching(query)
    }

    fn item_update(&self, query: &Owned<'_>, changes: &Owned<'_>) -> i32 {
        (**self).item_update(query, changes)
    }

    fn item_delete(&self, query: &Owned<'_>) -> i32 {
        (**self).item_delete(query)
    }

    fn create_access_control(
        &self,
        protection: Symbol,
        flags: AccessControlFlags,
    ) -> Result<Owned<'_>, NativeError> {
        (**self).create_access_control(protection, flags)
    }

    fn create_random_key(&self, parameters: &Owned<'_>) -> Result<Owned<'_>, NativeError> {
        (**self).create_random_key(parameters)
    }

    fn copy_public_key(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
        (**self).copy_public_key(key)
    }

    fn copy_key_attributes(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
        (**self).copy_key_attributes(key)
    }

    fn create_signature(
        &self,
        key: Borrowed<'_, '_>,
        algorithm: Symbol,
        digest: &Owned<'_>,
    ) -> Result<Owned<'_>, NativeError> {
        (**self).create_signature(key, algorithm, digest)
    }

    fn create_auth_context(&self, reason: &str) -> Result<Owned<'_>, NativeError> {
        (**self).create_auth_context(reason)
    }
}
