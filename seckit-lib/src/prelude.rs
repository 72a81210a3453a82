//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use seckit_lib::prelude::*;
//! ```

// Facade and configuration
pub use crate::{Keychain, StoreConfig};

// Error handling
pub use crate::errors::{SecError, Status};
pub use crate::query::DeleteError;
pub use crate::Result;

// Stores
pub use crate::enclave::{AuthContext, EnclaveKey, EnclaveKeys, NewKey};
pub use crate::secrets::{Secret, Secrets};

// Backends
pub use crate::backend::{Authenticator, InMemoryTrustStore, TrustStore};
