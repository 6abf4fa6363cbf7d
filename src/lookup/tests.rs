//! Lookup and enrichment tests

use super::*;
use crate::error::{Error, HandlerError};
use crate::handler::{Handler, InputContext};
use crate::types::{Attributes, Outcome};
use crate::value::Record;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn ctx(json: serde_json::Value) -> InputContext {
    InputContext::new(Attributes::new(), Record::from_json(&json).unwrap())
}

fn customers() -> StaticLookup {
    StaticLookup::from_records(
        "customer_id",
        [
            Record::from_json(&json!({"customer_id": 1, "name": "Ada"})).unwrap(),
            Record::from_json(&json!({"customer_id": 2, "name": "Grace"})).unwrap(),
        ],
    )
    .unwrap()
}

/// Counts calls through to the wrapped table
struct Counting {
    inner: StaticLookup,
    calls: AtomicUsize,
}

impl LookupService for Counting {
    fn lookup(&self, ctx: &InputContext) -> Result<Option<Record>, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(ctx)
    }

    fn cache_key(&self, ctx: &InputContext) -> Option<String> {
        self.inner.cache_key(ctx)
    }
}

fn counting() -> Arc<Counting> {
    Arc::new(Counting {
        inner: customers(),
        calls: AtomicUsize::new(0),
    })
}

// ============================================================================
// StaticLookup Tests
// ============================================================================

#[test]
fn test_static_lookup_matches_on_key() {
    let table = customers();
    assert_eq!(table.len(), 2);
    assert_eq!(table.key_field(), "customer_id");

    let found = table.lookup(&ctx(json!({"customer_id": 2}))).unwrap().unwrap();
    assert_eq!(found.to_json(), json!({"customer_id": 2, "name": "Grace"}));

    assert!(table.lookup(&ctx(json!({"customer_id": 9}))).unwrap().is_none());
    assert!(table.lookup(&ctx(json!({"other": 1}))).unwrap().is_none());
    assert!(table.lookup(&ctx(json!({"customer_id": null}))).unwrap().is_none());
}

#[test]
fn test_static_lookup_nested_key() {
    let table = StaticLookup::new("order.customer")
        .with_entry("7", Record::new().with("tier", "gold"));
    let found = table
        .lookup(&ctx(json!({"order": {"customer": 7}})))
        .unwrap()
        .unwrap();
    assert_eq!(found.to_json(), json!({"tier": "gold"}));
}

#[test]
fn test_static_lookup_rejects_entry_without_key() {
    let result = StaticLookup::from_records("id", [Record::new().with("name", "x")]);
    assert!(matches!(result, Err(Error::InvalidConfigValue { .. })));
}

// ============================================================================
// CachedLookup Tests
// ============================================================================

#[test]
fn test_cache_serves_repeated_keys() {
    let inner = counting();
    let cached = CachedLookup::new(Arc::clone(&inner), 10);

    for _ in 0..3 {
        let found = cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
        assert!(found.is_some());
    }
    // Misses are cached too
    cached.lookup(&ctx(json!({"customer_id": 9}))).unwrap();
    cached.lookup(&ctx(json!({"customer_id": 9}))).unwrap();

    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cached.len(), 2);
}

#[test]
fn test_cache_expires_entries() {
    let inner = counting();
    let cached = CachedLookup::new(Arc::clone(&inner), 10).with_ttl(Duration::from_millis(20));

    cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    std::thread::sleep(Duration::from_millis(40));
    cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();

    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cache_evicts_least_recently_used() {
    let inner = counting();
    let cached = CachedLookup::new(Arc::clone(&inner), 1);

    cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    cached.lookup(&ctx(json!({"customer_id": 2}))).unwrap();
    assert_eq!(cached.len(), 1);

    cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_zero_capacity_disables_cache() {
    let inner = counting();
    let cached = CachedLookup::new(Arc::clone(&inner), 0);
    cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    cached.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert!(cached.is_empty());
}

#[test]
fn test_separate_instances_do_not_share_entries() {
    let inner = counting();
    let first = CachedLookup::new(Arc::clone(&inner), 10);
    let second = CachedLookup::new(Arc::clone(&inner), 10);

    first.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    second.lookup(&ctx(json!({"customer_id": 1}))).unwrap();
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// EnrichHandler Tests
// ============================================================================

#[test]
fn test_enrich_merges_match() {
    let handler = EnrichHandler::new(customers());
    let output = handler
        .process(&ctx(json!({"customer_id": 1, "amount": 10})))
        .unwrap();

    assert_eq!(output.outcome, Outcome::Success);
    assert_eq!(
        output.record.to_json(),
        json!({"customer_id": 1, "amount": 10, "name": "Ada"})
    );
}

#[test]
fn test_enrich_route_to_success_passes_miss_through() {
    let handler = EnrichHandler::new(customers());
    let output = handler.process(&ctx(json!({"customer_id": 5}))).unwrap();
    assert_eq!(output.outcome, Outcome::Success);
    assert_eq!(output.record.to_json(), json!({"customer_id": 5}));
}

#[test]
fn test_enrich_matched_unmatched_routing() {
    let handler =
        EnrichHandler::new(customers()).with_routing(LookupRouting::RouteToMatchedUnmatched);

    let hit = handler.process(&ctx(json!({"customer_id": 2}))).unwrap();
    assert_eq!(hit.outcome, Outcome::custom(MATCHED));

    let miss = handler.process(&ctx(json!({"customer_id": 3}))).unwrap();
    assert_eq!(miss.outcome, Outcome::custom(UNMATCHED));
}

#[test]
fn test_enrich_propagates_lookup_errors() {
    struct Unavailable;

    impl LookupService for Unavailable {
        fn lookup(&self, _: &InputContext) -> Result<Option<Record>, HandlerError> {
            Err(HandlerError::retryable("lookup backend unavailable"))
        }

        fn cache_key(&self, _: &InputContext) -> Option<String> {
            None
        }
    }

    let handler = EnrichHandler::new(Unavailable);
    let err = handler.process(&ctx(json!({"customer_id": 1}))).unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_lookup_routing_serde() {
    let routing: LookupRouting = serde_json::from_str("\"route_to_matched_unmatched\"").unwrap();
    assert_eq!(routing, LookupRouting::RouteToMatchedUnmatched);
    assert_eq!(LookupRouting::default(), LookupRouting::RouteToSuccess);
}
