//! Keychain secrets and Secure Enclave signing keys.
//!
//! This crate is a thin, synchronous layer over the platform trust store.
//! It owns no persistent state: every operation builds a predicate, hands it
//! to a [`TrustStore`] and converts what comes back.
//!
//! # Features
//!
//! - **Generic secrets**: add, update, get, list and delete password items
//!   keyed by account and service
//! - **Enclave keys**: create P-256 keys inside the secure element, look them
//!   up by tag and label, and sign digests with optional user presence
//! - **Ownership-typed bridge**: every native handle is released exactly once,
//!   on every path
//! - **Simulator**: [`InMemoryTrustStore`] runs everything without a keychain
//!
//! # Example
//!
//! ```
//! use seckit_lib::{Keychain, NewKey};
//!
//! let keychain = Keychain::in_memory();
//! keychain.secrets().add("alice", "com.example.app", b"hunter2")?;
//! let secret = keychain.secrets().get("alice", "com.example.app")?;
//! assert_eq!(secret.data_str(), Some("hunter2"));
//!
//! let keys = keychain.keys();
//! let key = keys.create(&NewKey::new("com.example.keys.signing"))?;
//! let signature = keys.sign(&key, &[0x42; 32])?;
//! assert!(key.verify(&[0x42; 32], &signature));
//! # Ok::<(), seckit_lib::SecError>(())
//! ```

pub mod backend;
pub mod bridge;
pub mod config;
pub mod enclave;
pub mod errors;
pub mod prelude;
pub mod query;
pub mod secrets;

pub use backend::{Authenticator, InMemoryTrustStore, NativeError, TrustStore};
pub use config::StoreConfig;
pub use enclave::{AuthContext, EnclaveKey, EnclaveKeys, NewKey};
pub use errors::{check_status, SecError, Status};
pub use query::DeleteError;
pub use secrets::{Secret, Secrets};

#[cfg(target_os = "macos")]
pub use backend::KeychainTrustStore;

/// Common result alias for trust store operations.
pub type Result<T> = std::result::Result<T, SecError>;

/// A trust store together with the scope every operation runs in.
pub struct Keychain<S: TrustStore> {
    store: S,
    config: StoreConfig,
}

impl<S: TrustStore> Keychain<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, StoreConfig::default())
    }

    pub fn with_config(store: S, config: StoreConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Generic password items.
    pub fn secrets(&self) -> Secrets<'_> {
        Secrets::new(&self.store, &self.config)
    }

    /// Secure Enclave keys.
    pub fn keys(&self) -> EnclaveKeys<'_> {
        EnclaveKeys::new(&self.store, &self.config)
    }
}

impl Keychain<InMemoryTrustStore> {
    /// A keychain over a fresh simulator.
    pub fn in_memory() -> Self {
        Self::new(InMemoryTrustStore::new())
    }
}

#[cfg(target_os = "macos")]
impl Keychain<KeychainTrustStore> {
    /// The data protection keychain of the current user.
    pub fn native(config: StoreConfig) -> Self {
        Self::with_config(KeychainTrustStore::new(), config)
    }
}
