//! Every native object an operation creates is released before it returns.

mod common;

use common::TestContext;
use seckit_lib::bridge::{AttrKey, Bridge, SimRuntime, Symbol};
use seckit_lib::query::{Lookup, MatchLimit, Predicate};
use seckit_lib::{NewKey, SecError, StoreConfig};

#[test]
fn test_handles_release_once() {
    let rt = SimRuntime::new();
    let bridge = Bridge::new(&rt);

    let data = bridge.wrap_bytes(b"payload").unwrap();
    let copy = data.clone();
    assert_eq!(rt.live_objects(), 1);
    drop(data);
    assert_eq!(bridge.read_bytes(copy.borrow()).unwrap(), b"payload");
    drop(copy);

    assert_eq!(rt.live_objects(), 0);
    assert_eq!(rt.violations(), 0);
}

#[test]
fn test_predicate_outlives_its_inputs() {
    let rt = SimRuntime::new();
    let bridge = Bridge::new(&rt);

    let map = {
        let account = bridge.wrap_text("alice").unwrap();
        bridge
            .build_predicate(&[(bridge.constant(AttrKey::Account), account.borrow())])
            .unwrap()
    };
    let account = bridge
        .predicate_value(map.borrow(), AttrKey::Account)
        .unwrap()
        .unwrap();
    assert_eq!(bridge.read_text(account).unwrap(), "alice");
    assert!(bridge
        .predicate_value(map.borrow(), AttrKey::Service)
        .unwrap()
        .is_none());

    drop(map);
    assert_eq!(rt.live_objects(), 0);
}

#[test]
fn test_allocation_failure_releases_partial_work() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    let key = keys.create(&NewKey::new("t")).unwrap();
    let calls = ctx.store().calls();
    ctx.store().sim().refuse_allocations(true);

    let err = keys.sign(&key, b"digest").unwrap_err();
    assert_eq!(err, SecError::AllocationFailed);
    assert_eq!(ctx.store().calls(), calls);
    ctx.assert_no_leaks();

    ctx.store().sim().refuse_allocations(false);
    keys.sign(&key, b"digest").unwrap();
    ctx.assert_no_leaks();
}

#[test]
fn test_every_operation_is_balanced() {
    let ctx = TestContext::new();
    let secrets = ctx.keychain.secrets();
    let keys = ctx.keychain.keys();

    secrets.add("a", "svc", b"1").unwrap();
    ctx.assert_no_leaks();
    assert!(secrets.add("a", "svc", b"1").is_err());
    ctx.assert_no_leaks();
    secrets.update("a", "svc", b"2").unwrap();
    ctx.assert_no_leaks();
    secrets.get("a", "svc").unwrap();
    ctx.assert_no_leaks();
    assert!(secrets.get("b", "svc").is_err());
    ctx.assert_no_leaks();
    secrets.list("svc").unwrap();
    ctx.assert_no_leaks();
    secrets.delete(None, "svc").unwrap();
    ctx.assert_no_leaks();

    let key = keys.create(&NewKey::new("t").label("l")).unwrap();
    ctx.assert_no_leaks();
    keys.get("t", "l").unwrap();
    ctx.assert_no_leaks();
    keys.list("t", "").unwrap();
    ctx.assert_no_leaks();
    keys.sign(&key, b"digest").unwrap();
    ctx.assert_no_leaks();
    keys.delete("t", "").unwrap();
    ctx.assert_no_leaks();
    assert!(keys.sign(&key, b"digest").is_err());
    ctx.assert_no_leaks();
}

#[test]
fn test_malformed_collection_is_reported() {
    let ctx = TestContext::new();
    let keys = ctx.keychain.keys();
    keys.create(&NewKey::new("t")).unwrap();
    ctx.store().inject_malformed_results(true);

    let err = keys.list("t", "").unwrap_err();
    assert_eq!(err, SecError::MalformedResult("CFData".into()));
    ctx.assert_no_leaks();
}

#[test]
fn test_single_result_for_all_lookup_is_malformed() {
    let ctx = TestContext::new();
    ctx.keychain.secrets().add("a", "svc", b"1").unwrap();
    let config = StoreConfig::default();

    // A one-match result handed to a collection reader.
    let record = Lookup::secrets()
        .service("svc")
        .scoped(&config)
        .limit(MatchLimit::One)
        .fetch_one(ctx.store())
        .unwrap();
    let bridge = Bridge::new(ctx.store().sim());
    let err = bridge.unwrap_collection(record.borrow()).unwrap_err();
    assert_eq!(err, SecError::MalformedResult("CFDictionary".into()));
    drop(record);
    ctx.assert_no_leaks();
}

#[test]
fn test_nested_predicate_renders_and_releases() {
    let rt = SimRuntime::new();
    let bridge = Bridge::new(&rt);
    let inner = Predicate::new()
        .with(AttrKey::ApplicationTag, b"t".as_slice())
        .with(AttrKey::IsPermanent, true);
    let outer = Predicate::new()
        .with(AttrKey::TokenId, Symbol::TokenIdSecureEnclave)
        .with(AttrKey::PrivateKeyAttrs, inner);

    let rendered = outer.render(&bridge).unwrap();
    assert_eq!(bridge.predicate_entries(rendered.borrow()).unwrap().len(), 2);
    drop(rendered);
    assert_eq!(rt.live_objects(), 0);
}
