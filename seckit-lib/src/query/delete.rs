//! Delete-until-no-duplicates-remain.
//!
//! The trust store removes one match per call and answers with a duplicate
//! status while more matches exist, so removing every match is a loop.

use super::predicate::Predicate;
use crate::backend::TrustStore;
use crate::bridge::Bridge;
use crate::errors::{check_status, SecError};

/// A bulk delete that stopped before it finished.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("delete stopped after removing {removed} item(s) in {attempts} attempt(s): {source}")]
pub struct DeleteError {
    /// Items confirmed removed before the failure.
    pub removed: usize,
    /// Delete calls made, including the failing one.
    pub attempts: usize,
    #[source]
    pub source: SecError,
}

impl DeleteError {
    /// Nothing matched on the first attempt.
    pub fn is_not_found(&self) -> bool {
        self.removed == 0 && self.source.is_not_found()
    }
}

/// Remove every item matching `predicate` and return how many were removed.
///
/// A duplicate status means one item was removed and more remain. Success
/// means the last match was removed. Not found on the first attempt is an
/// error with a count of zero.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(keys = predicate.len()))
)]
pub fn delete_all_matching(
    store: &dyn TrustStore,
    predicate: &Predicate<'_>,
) -> Result<usize, DeleteError> {
    let bridge = Bridge::new(store.runtime());
    let query = predicate.render(&bridge).map_err(|source| DeleteError {
        removed: 0,
        attempts: 0,
        source,
    })?;

    let mut removed = 0;
    let mut attempts = 0;
    loop {
        attempts += 1;
        match check_status(store.item_delete(&query)) {
            Ok(()) => {
                removed += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(removed, attempts, "delete finished");
                return Ok(removed);
            }
            Err(err) if err.is_duplicate() => removed += 1,
            Err(source) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(removed, attempts, error = %source, "delete stopped");
                return Err(DeleteError {
                    removed,
                    attempts,
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::backend::{AccessControlFlags, InMemoryTrustStore, NativeError};
    use crate::bridge::{AttrKey, Borrowed, NativeRuntime, Owned, Symbol};
    use crate::errors::Status;

    /// Forwards to the simulator, but answers the `fail_on`-th delete with
    /// `code` instead of deleting.
    struct FailingDeletes {
        inner: InMemoryTrustStore,
        fail_on: usize,
        code: i32,
        deletes: AtomicUsize,
    }

    impl TrustStore for FailingDeletes {
        fn runtime(&self) -> &dyn NativeRuntime {
            self.inner.runtime()
        }

        fn item_add(&self, attributes: &Owned<'_>) -> i32 {
            self.inner.item_add(attributes)
        }

        fn item_copy_matching(&self, query: &Owned<'_>) -> (i32, Option<Owned<'_>>) {
            self.inner.item_copy_matching(query)
        }

        fn item_update(&self, query: &Owned<'_>, changes: &Owned<'_>) -> i32 {
            self.inner.item_update(query, changes)
        }

        fn item_delete(&self, query: &Owned<'_>) -> i32 {
            if self.deletes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return self.code;
            }
            self.inner.item_delete(query)
        }

        fn create_access_control(
            &self,
            protection: Symbol,
            flags: AccessControlFlags,
        ) -> std::result::Result<Owned<'_>, NativeError> {
            self.inner.create_access_control(protection, flags)
        }

        fn create_random_key(
            &self,
            parameters: &Owned<'_>,
        ) -> std::result::Result<Owned<'_>, NativeError> {
            self.inner.create_random_key(parameters)
        }

        fn copy_public_key(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
            self.inner.copy_public_key(key)
        }

        fn copy_key_attributes(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
            self.inner.copy_key_attributes(key)
        }

        fn create_signature(
            &self,
            key: Borrowed<'_, '_>,
            algorithm: Symbol,
            digest: &Owned<'_>,
        ) -> std::result::Result<Owned<'_>, NativeError> {
            self.inner.create_signature(key, algorithm, digest)
        }

        fn create_auth_context(&self, reason: &str) -> std::result::Result<Owned<'_>, NativeError> {
            self.inner.create_auth_context(reason)
        }
    }

    fn add(store: &InMemoryTrustStore, account: &str, service: &str) {
        let bridge = Bridge::new(store.runtime());
        let item = Predicate::new()
            .with(AttrKey::Class, Symbol::ClassGenericPassword)
            .with(AttrKey::Account, account)
            .with(AttrKey::Service, service)
            .with(AttrKey::ValueData, b"x".as_slice())
            .render(&bridge)
            .unwrap();
        assert_eq!(store.item_add(&item), 0);
    }

    fn by_service(service: &str) -> Predicate<'_> {
        Predicate::new()
            .with(AttrKey::Class, Symbol::ClassGenericPassword)
            .with(AttrKey::Service, service)
    }

    #[test]
    fn test_removes_every_match() {
        let store = InMemoryTrustStore::new();
        for account in ["a", "b", "c", "d"] {
            add(&store, account, "svc");
        }
        add(&store, "a", "other");

        assert_eq!(delete_all_matching(&store, &by_service("svc")).unwrap(), 4);
        assert_eq!(store.item_count(), 1);
        assert_eq!(store.sim().live_objects(), 0);
    }

    #[test]
    fn test_first_attempt_not_found() {
        let store = InMemoryTrustStore::new();
        for _ in 0..2 {
            let err = delete_all_matching(&store, &by_service("svc")).unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(err.removed, 0);
            assert_eq!(err.attempts, 1);
        }
    }

    #[test]
    fn test_terminal_status_carries_progress() {
        let store = InMemoryTrustStore::new().with_entitlements(["group"]);
        let predicate = by_service("svc").with(AttrKey::AccessGroup, "not-entitled");
        let err = delete_all_matching(&store, &predicate).unwrap_err();
        assert_eq!(err.source.status(), Some(Status::MissingEntitlement));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("0 item(s)"));
    }

    #[test]
    fn test_failure_after_progress_reports_confirmed_removals() {
        let inner = InMemoryTrustStore::new();
        for account in ["a", "b", "c", "d", "e"] {
            add(&inner, account, "svc");
        }
        let store = FailingDeletes {
            inner,
            fail_on: 3,
            code: Status::InteractionNotAllowed.code(),
            deletes: AtomicUsize::new(0),
        };

        let err = delete_all_matching(&store, &by_service("svc")).unwrap_err();
        assert_eq!(err.removed, 2);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.source, SecError::Status(Status::InteractionNotAllowed));
        assert!(!err.is_not_found());
        assert_eq!(store.inner.item_count(), 3);
        assert_eq!(store.inner.sim().live_objects(), 0);
        assert_eq!(store.inner.sim().violations(), 0);
    }

    #[test]
    fn test_render_failure_makes_no_calls() {
        let store = InMemoryTrustStore::new();
        let err = delete_all_matching(&store, &Predicate::new()).unwrap_err();
        assert_eq!(err.source, SecError::EmptyPredicate);
        assert_eq!(err.attempts, 0);
        assert_eq!(store.calls(), 0);
    }
}
