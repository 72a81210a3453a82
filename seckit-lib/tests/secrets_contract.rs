//! Secret store behaviour against the simulated trust store.

mod common;

use common::TestContext;
use proptest::prelude::*;
use seckit_lib::{SecError, Status, StoreConfig};

#[test]
fn test_update_replaces_data_in_place() {
    let ctx = TestContext::new();
    let secrets = ctx.keychain.secrets();

    secrets.add("foo", "bar", b"hello").unwrap();
    secrets.update("foo", "bar", b"second").unwrap();

    let secret = secrets.get("foo", "bar").unwrap();
    assert_eq!(secret.account, "foo");
    assert_eq!(secret.service, "bar");
    assert_eq!(secret.data_str(), Some("second"));
    assert_eq!(ctx.store().item_count(), 1);
    ctx.assert_no_leaks();
}

#[test]
fn test_delete_missing_is_not_found_every_time() {
    let ctx = TestContext::new();
    let secrets = ctx.keychain.secrets();

    for _ in 0..2 {
        let err = secrets.delete(Some("nobody"), "nowhere").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.removed, 0);
    }
    ctx.assert_no_leaks();
}

#[test]
fn test_delete_removes_every_account_for_service() {
    let ctx = TestContext::new();
    let secrets = ctx.keychain.secrets();
    let accounts = ["a", "b", "c", "d", "e"];
    for account in accounts {
        secrets.add(account, "shared", account.as_bytes()).unwrap();
    }
    secrets.add("a", "unrelated", b"keep").unwrap();

    assert_eq!(secrets.delete(None, "shared").unwrap(), accounts.len());
    assert!(secrets.list("shared").unwrap().is_empty());
    assert_eq!(secrets.list("unrelated").unwrap().len(), 1);
    ctx.assert_no_leaks();
}

#[test]
fn test_list_empty_but_get_not_found() {
    let ctx = TestContext::new();
    let secrets = ctx.keychain.secrets();

    assert!(secrets.list("empty").unwrap().is_empty());
    assert!(secrets.get("anyone", "empty").unwrap_err().is_not_found());
    ctx.assert_no_leaks();
}

#[test]
fn test_list_returns_only_matching_service() {
    let ctx = TestContext::new();
    let secrets = ctx.keychain.secrets();
    secrets.add("alice", "mail", b"1").unwrap();
    secrets.add("bob", "mail", b"2").unwrap();
    secrets.add("alice", "chat", b"3").unwrap();

    let mut accounts: Vec<String> = secrets
        .list("mail")
        .unwrap()
        .into_iter()
        .map(|secret| secret.account)
        .collect();
    accounts.sort();
    assert_eq!(accounts, ["alice", "bob"]);
}

#[test]
fn test_missing_entitlement_has_remediation() {
    let ctx = TestContext::entitled(&[], StoreConfig::default());
    let err = ctx
        .keychain
        .secrets()
        .add("foo", "bar", b"hello")
        .unwrap_err();

    assert!(err.is_missing_entitlement());
    assert_eq!(err.code(), Some(-34018));
    assert!(err.remediation().is_some());
    assert!(err.to_string().contains("codesigned"));
    assert_eq!(ctx.store().item_count(), 0);
    ctx.assert_no_leaks();
}

#[test]
fn test_access_group_scopes_items() {
    let config = StoreConfig::new().with_access_group("TEAM.shared");
    let ctx = TestContext::entitled(&["TEAM.shared"], config);
    let secrets = ctx.keychain.secrets();
    secrets.add("foo", "bar", b"hello").unwrap();

    let other = StoreConfig::new().with_access_group("TEAM.other");
    let outside = seckit_lib::Secrets::new(ctx.store(), &other);
    let err = outside.get("foo", "bar").unwrap_err();
    assert_eq!(err.status(), Some(Status::MissingEntitlement));

    let legacy = StoreConfig::new().with_data_protection_keychain(false);
    let unscoped = seckit_lib::Secrets::new(ctx.store(), &legacy);
    assert_eq!(unscoped.get("foo", "bar").unwrap().data_str(), Some("hello"));
}

#[test]
fn test_invalid_text_is_encoding_failure() {
    let ctx = TestContext::new();
    let err = ctx
        .keychain
        .secrets()
        .add("nul\0byte", "bar", b"x")
        .unwrap_err();
    assert_eq!(err, SecError::EncodingFailed);
    assert_eq!(ctx.store().calls(), 0);
    ctx.assert_no_leaks();
}

fn identity() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._@-]{1,24}"
}

proptest! {
    /// Whatever goes in comes back out, and is gone after delete.
    #[test]
    fn test_round_trip(
        account in identity(),
        service in identity(),
        data in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let ctx = TestContext::new();
        let secrets = ctx.keychain.secrets();

        secrets.add(&account, &service, &data).unwrap();
        let secret = secrets.get(&account, &service).unwrap();
        prop_assert_eq!(&secret.account, &account);
        prop_assert_eq!(&secret.service, &service);
        prop_assert_eq!(&secret.data[..], &data[..]);

        prop_assert_eq!(secrets.delete(Some(&account), &service).unwrap(), 1);
        prop_assert!(secrets.get(&account, &service).unwrap_err().is_not_found());
        prop_assert_eq!(ctx.store().sim().live_objects(), 0);
    }
}
