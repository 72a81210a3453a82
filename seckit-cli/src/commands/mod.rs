//! CLI command implementations

pub mod doctor;
pub mod key;
pub mod secret;

use seckit_lib::{InMemoryTrustStore, Keychain, SecError, StoreConfig, TrustStore};

use crate::config::Backend;
use crate::ui;

pub type CliKeychain = Keychain<Box<dyn TrustStore>>;

/// Open the trust store selected by `backend`.
pub fn open_keychain(backend: Backend, config: StoreConfig) -> CliKeychain {
    match backend {
        Backend::Memory => memory(config),
        Backend::Auto => native(config),
    }
}

fn memory(config: StoreConfig) -> CliKeychain {
    tracing::debug!("using in-memory trust store");
    let store: Box<dyn TrustStore> = Box::new(InMemoryTrustStore::new());
    Keychain::with_config(store, config)
}

#[cfg(target_os = "macos")]
fn native(config: StoreConfig) -> CliKeychain {
    tracing::debug!("using macOS keychain");
    let store: Box<dyn TrustStore> = Box::new(seckit_lib::KeychainTrustStore::new());
    Keychain::with_config(store, config)
}

#[cfg(not(target_os = "macos"))]
fn native(config: StoreConfig) -> CliKeychain {
    ui::warning("No keychain on this platform; using the in-memory simulator (nothing is saved)");
    memory(config)
}

/// Print a trust store error. The message carries any remediation.
pub fn report(err: &SecError) {
    ui::error(&err.to_string());
    if err.is_missing_entitlement() {
        ui::info("Run 'seckit doctor' to check the keychain setup");
    }
}
