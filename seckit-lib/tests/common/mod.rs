//! Common test utilities for seckit-lib integration tests

use seckit_lib::{InMemoryTrustStore, Keychain, StoreConfig};

/// A keychain over a fresh simulator.
#[allow(dead_code)]
pub struct TestContext {
    pub keychain: Keychain<InMemoryTrustStore>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        Self {
            keychain: Keychain::in_memory(),
        }
    }

    /// A keychain that behaves like a binary signed with `groups`.
    pub fn entitled(groups: &[&str], config: StoreConfig) -> Self {
        let store = InMemoryTrustStore::new().with_entitlements(groups.iter().copied());
        Self {
            keychain: Keychain::with_config(store, config),
        }
    }

    pub fn store(&self) -> &InMemoryTrustStore {
        self.keychain.store()
    }

    /// Every native object created so far has been released, and nothing
    /// was released twice.
    pub fn assert_no_leaks(&self) {
        let sim = self.store().sim();
        assert_eq!(sim.live_objects(), 0, "native objects leaked");
        assert_eq!(sim.violations(), 0, "ownership contract violated");
    }
}
