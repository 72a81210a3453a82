//! Enclave key store and signing behaviour against the simulated trust store.

mod common;

use common::TestContext;
use proptest::prelude::*;
use seckit_lib::{AuthContext, Authenticator, NewKey, SecError, Status};
use sha2::{Digest, Sha256};

#[test]
fn test_create_and_get_agree() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();

    let created = keys.create(&NewKey::new("t").label("l")).unwrap();
    let fetched = keys.get("t", "l").unwrap();

    assert_eq!(created.public_key, fetched.public_key);
    assert_eq!(created.application_label, fetched.application_label);
    assert_eq!(fetched.tag, "t");
    assert_eq!(fetched.label, "l");
    ctx.assert_no_leaks();
}

#[test]
fn test_application_label_is_hash_of_point() {
    let ctx = TestContext::new();
    let key = ctx.keychain.keys().create(&NewKey::new("t")).unwrap();
    let digest = Sha256::digest(key.public_point());
    assert_eq!(key.application_label, digest[..20].to_vec());
}

#[test]
fn test_two_keys_under_one_tag() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    keys.create(&NewKey::new("t").label("first")).unwrap();
    keys.create(&NewKey::new("t").label("second")).unwrap();
    keys.create(&NewKey::new("other")).unwrap();

    let listed = keys.list("t", "").unwrap();
    assert_eq!(listed.len(), 2);
    assert_ne!(listed[0].application_label, listed[1].application_label);

    let mut labels: Vec<&str> = listed.iter().map(|key| key.label.as_str()).collect();
    labels.sort();
    assert_eq!(labels, ["first", "second"]);
    ctx.assert_no_leaks();
}

#[test]
fn test_delete_under_tag() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    for label in ["a", "b", "c"] {
        keys.create(&NewKey::new("t").label(label)).unwrap();
    }

    assert_eq!(keys.delete("t", "").unwrap(), 3);
    assert!(keys.list("t", "").unwrap().is_empty());
    let err = keys.delete("t", "").unwrap_err();
    assert!(err.is_not_found());
    ctx.assert_no_leaks();
}

#[test]
fn test_sign_after_relookup() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    keys.create(&NewKey::new("t")).unwrap();

    let key = keys.get("t", "").unwrap();
    let digest = Sha256::digest(b"release notes");
    let signature = keys.sign(&key, &digest).unwrap();
    assert!(key.verify(&digest, &signature));
    ctx.assert_no_leaks();
}

#[test]
fn test_sign_deleted_key_is_not_found() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    let key = keys.create(&NewKey::new("t")).unwrap();
    keys.delete("t", "").unwrap();

    assert!(keys.sign(&key, b"digest").unwrap_err().is_not_found());
}

#[test]
fn test_empty_digest_never_reaches_store() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    let key = keys.create(&NewKey::new("t")).unwrap();
    let before = ctx.store().calls();

    let err = keys.sign(&key, b"").unwrap_err();
    assert!(matches!(err, SecError::InvalidInput(_)));
    assert_eq!(ctx.store().calls(), before);
}

#[test]
fn test_user_presence_outcomes() {
    let cases = [
        (Authenticator::Cancel, Status::UserCanceled),
        (Authenticator::Fail, Status::AuthFailed),
        (Authenticator::NonInteractive, Status::InteractionNotAllowed),
    ];
    for (authenticator, expected) in cases {
        let ctx = TestContext::new();
        let keys = ctx.keychain.keys();
        let key = keys
            .create(&NewKey::new("t").require_user_presence(true))
            .unwrap()
            .with_auth_context(AuthContext::new("approve the deploy"));

        ctx.store().set_authenticator(authenticator);
        let err = keys.sign(&key, b"digest").unwrap_err();
        assert_eq!(err.status(), Some(expected), "{:?}", authenticator);
        assert!(err.is_auth_rejected() || expected == Status::InteractionNotAllowed);
        assert_eq!(ctx.store().prompts(), 1);
        ctx.assert_no_leaks();
    }
}

#[test]
fn test_non_interactive_has_remediation() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    let key = keys
        .create(&NewKey::new("t").require_user_presence(true))
        .unwrap();
    ctx.store().set_authenticator(Authenticator::NonInteractive);

    let err = keys.sign(&key, b"digest").unwrap_err();
    assert!(err.remediation().is_some());
}

#[test]
fn test_keys_without_presence_never_prompt() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    let key = keys
        .create(&NewKey::new("t"))
        .unwrap()
        .with_auth_context(AuthContext::new("unused"));
    ctx.store().set_authenticator(Authenticator::Cancel);

    keys.sign(&key, b"digest").unwrap();
    assert_eq!(ctx.store().prompts(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Signatures over digests of any nonzero length verify.
    #[test]
    fn test_sign_verify(digest in prop::collection::vec(any::<u8>(), 1..96)) {
        let ctx = TestContext::new();
        let keys = ctx.keychain.keys();
        let key = keys.create(&NewKey::new("prop")).unwrap();

        let signature = keys.sign(&key, &digest).unwrap();
        prop_assert!(key.verify(&digest, &signature));
        prop_assert_eq!(ctx.store().sim().live_objects(), 0);
    }
}
