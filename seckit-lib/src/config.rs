//! Configuration for the keychain scope every predicate is rendered into.

use serde::{Deserialize, Serialize};

/// Which keychain and access group operations target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Target the data protection keychain (the iOS-style keychain on macOS).
    #[serde(default = "default_data_protection_keychain")]
    pub data_protection_keychain: bool,

    /// Keychain access group; must be listed in the binary's
    /// `keychain-access-groups` entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_group: Option<String>,
}

fn default_data_protection_keychain() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_protection_keychain: default_data_protection_keychain(),
            access_group: None,
        }
    }
}

impl StoreConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope every item to an access group.
    pub fn with_access_group(mut self, group: impl Into<String>) -> Self {
        self.access_group = Some(group.into());
        self
    }

    /// Choose between the data protection and the legacy file keychain.
    pub fn with_data_protection_keychain(mut self, enabled: bool) -> Self {
        self.data_protection_keychain = enabled;
        self
    }
}
