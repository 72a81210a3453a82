//! Generic secret store.
//!
//! Secrets are generic password items identified by `(account, service)`.
//! Adding an existing identity fails with a duplicate error; use
//! [`Secrets::update`] to replace the data of an existing item.

use std::fmt;

use zeroize::Zeroizing;

use crate::backend::TrustStore;
use crate::bridge::{AttrKey, Borrowed, Bridge};
use crate::config::StoreConfig;
use crate::errors::{check_status, SecError};
use crate::query::{delete_all_matching, DeleteError, Lookup, Predicate};
use crate::Result;

/// A generic password item.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub account: String,
    pub service: String,
    /// Secret payload, wiped on drop.
    pub data: Zeroizing<Vec<u8>>,
}

impl Secret {
    pub fn new(account: impl Into<String>, service: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            account: account.into(),
            service: service.into(),
            data: Zeroizing::new(data.into()),
        }
    }

    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    fn from_record(bridge: &Bridge<'_>, record: Borrowed<'_, '_>) -> Result<Self> {
        let data = bridge
            .predicate_value(record, AttrKey::ValueData)?
            .ok_or_else(|| SecError::malformed("record without secret data"))?;
        Ok(Self {
            account: bridge.text_attr(record, AttrKey::Account)?,
            service: bridge.text_attr(record, AttrKey::Service)?,
            data: Zeroizing::new(bridge.read_bytes(data)?),
        })
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("account", &self.account)
            .field("service", &self.service)
            .field("data", &format_args!("<{} bytes redacted>", self.data.len()))
            .finish()
    }
}

/// Secret operations against one trust store and scope.
#[derive(Clone, Copy)]
pub struct Secrets<'a> {
    store: &'a dyn TrustStore,
    config: &'a StoreConfig,
}

impl<'a> Secrets<'a> {
    pub fn new(store: &'a dyn TrustStore, config: &'a StoreConfig) -> Self {
        Self { store, config }
    }

    fn identity<'h>(&'h self, account: &'h str, service: &'h str) -> Lookup<'h> {
        Lookup::secrets()
            .account(account)
            .service(service)
            .scoped(self.config)
    }

    /// Store a new secret. Fails with a duplicate error if the identity exists.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, data), fields(data_len = data.len()))
    )]
    pub fn add(&self, account: &str, service: &str, data: &[u8]) -> Result<()> {
        let bridge = Bridge::new(self.store.runtime());
        let mut attributes = self.identity(account, service).mutation_predicate();
        attributes.insert(AttrKey::ValueData, data);
        let attributes = attributes.render(&bridge)?;
        check_status(self.store.item_add(&attributes))
    }

    /// Replace the data of an existing secret.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, data), fields(data_len = data.len()))
    )]
    pub fn update(&self, account: &str, service: &str, data: &[u8]) -> Result<()> {
        let bridge = Bridge::new(self.store.runtime());
        let query = self
            .identity(account, service)
            .mutation_predicate()
            .render(&bridge)?;
        let changes = Predicate::new()
            .with(AttrKey::ValueData, data)
            .render(&bridge)?;
        check_status(self.store.item_update(&query, &changes))
    }

    /// Exactly one secret, or a not found error.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn get(&self, account: &str, service: &str) -> Result<Secret> {
        let record = self.identity(account, service).fetch_one(self.store)?;
        let bridge = Bridge::new(self.store.runtime());
        Secret::from_record(&bridge, record.borrow())
    }

    /// Every secret stored for `service`. Empty when none match.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn list(&self, service: &str) -> Result<Vec<Secret>> {
        let records = Lookup::secrets()
            .service(service)
            .scoped(self.config)
            .fetch_all(self.store)?;
        let bridge = records.bridge();
        records
            .entries()?
            .into_iter()
            .map(|record| Secret::from_record(&bridge, record))
            .collect()
    }

    /// Remove every secret for `service`, or only `account`'s when given.
    /// An empty account matches every account. Returns how many were removed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn delete(&self, account: Option<&str>, service: &str) -> std::result::Result<usize, DeleteError> {
        let mut lookup = Lookup::secrets().service(service).scoped(self.config);
        if let Some(account) = account.filter(|account| !account.is_empty()) {
            lookup = lookup.account(account);
        }
        delete_all_matching(self.store, &lookup.mutation_predicate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryTrustStore;

    fn fixture() -> (InMemoryTrustStore, StoreConfig) {
        (InMemoryTrustStore::new(), StoreConfig::default())
    }

    #[test]
    fn test_add_get() {
        let (store, config) = fixture();
        let secrets = Secrets::new(&store, &config);
        secrets.add("foo", "bar", b"hello").unwrap();

        let secret = secrets.get("foo", "bar").unwrap();
        assert_eq!(secret, Secret::new("foo", "bar", b"hello".to_vec()));
        assert_eq!(secret.data_str(), Some("hello"));
    }

    #[test]
    fn test_add_duplicate_leaves_original() {
        let (store, config) = fixture();
        let secrets = Secrets::new(&store, &config);
        secrets.add("foo", "bar", b"hello").unwrap();

        let err = secrets.add("foo", "bar", b"other").unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(&*secrets.get("foo", "bar").unwrap().data, b"hello");
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let (store, config) = fixture();
        let secrets = Secrets::new(&store, &config);
        assert!(secrets.update("foo", "bar", b"x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_by_account_keeps_others() {
        let (store, config) = fixture();
        let secrets = Secrets::new(&store, &config);
        secrets.add("a", "svc", b"1").unwrap();
        secrets.add("b", "svc", b"2").unwrap();

        assert_eq!(secrets.delete(Some("a"), "svc").unwrap(), 1);
        let remaining = secrets.list("svc").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].account, "b");
    }

    #[test]
    fn test_delete_empty_account_matches_all() {
        let (store, config) = fixture();
        let secrets = Secrets::new(&store, &config);
        secrets.add("a", "svc", b"1").unwrap();
        secrets.add("b", "svc", b"2").unwrap();

        assert_eq!(secrets.delete(Some(""), "svc").unwrap(), 2);
        assert!(secrets.list("svc").unwrap().is_empty());
        assert_eq!(store.sim().live_objects(), 0);
    }

    #[test]
    fn test_debug_redacts_data() {
        let secret = Secret::new("foo", "bar", b"hunter2".to_vec());
        let debug = format!("{:?}", secret);
        assert!(debug.contains("foo"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_list_rejects_malformed_collection() {
        let (store, config) = fixture();
        let secrets = Secrets::new(&store, &config);
        secrets.add("a", "svc", b"1").unwrap();
        store.inject_malformed_results(true);

        let err = secrets.list("svc").unwrap_err();
        assert!(matches!(err, SecError::MalformedResult(ref observed) if observed == "CFData"));
        assert_eq!(store.sim().live_objects(), 0);
    }
}
