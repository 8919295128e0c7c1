//! Integration-level coverage of the literal end-to-end scenarios and the
//! cross-cutting invariants in `spec.md §8`, exercised directly against
//! `SnapshotCache` (no simulated transport — that lives in the
//! `xds-cache-harness` crate).

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use xds_cache::{
    Cache, CancellationToken, IdHash, KnownResourceNames, Node, OpaqueResource, Resource,
    SnapshotBuilder, SnapshotCache, SotwRequest,
};

fn resource(name: &str, payload: &str) -> Arc<dyn Resource> {
    Arc::new(OpaqueResource::new(name, payload.as_bytes().to_vec()))
}

fn node(id: &str) -> Node {
    Node { id: id.to_string(), ..Default::default() }
}

#[tokio::test]
async fn law_set_snapshot_trigger_delivers_exactly_one_response() {
    let cache = SnapshotCache::new(false, Arc::new(IdHash));
    let token = CancellationToken::new();

    let (tx, mut rx) = mpsc::channel(4);
    let req = SotwRequest { node: node("A"), type_url: "TypeX".into(), version_info: "0".into(), ..Default::default() };
    let handle = cache.create_watch(req, KnownResourceNames::new(), tx).await;
    assert!(handle.is_active());

    let snap = SnapshotBuilder::new().with_resources("TypeX", "1", vec![resource("r1", "a")]).build();
    cache.set_snapshot(&token, "A", snap).await.unwrap();

    let response = rx.recv().await.expect("exactly one response");
    assert_eq!(response.version, "1");
    assert!(rx.try_recv().is_err(), "no second response should follow");
    assert!(cache.get_status_info("A").await.unwrap().num_sotw_watches == 0);
}

#[tokio::test]
async fn invariant_ads_response_satisfies_request_superset_of_snapshot_names() {
    let cache = SnapshotCache::new(true, Arc::new(IdHash));
    let token = CancellationToken::new();

    let snap = SnapshotBuilder::new()
        .with_resources("TypeX", "2", vec![resource("r1", "a"), resource("r2", "b")])
        .build();
    cache.set_snapshot(&token, "A", snap).await.unwrap();

    // Request names a strict subset of the snapshot: must be suppressed.
    let (tx, mut rx) = mpsc::channel(4);
    let req = SotwRequest { node: node("A"), type_url: "TypeX".into(), version_info: "1".into(), resource_names: vec!["r1".into()] };
    let handle = cache.create_watch(req, KnownResourceNames::new(), tx).await;
    assert!(handle.is_active(), "suppressed response must leave the watch registered");
    assert!(tokio::time::timeout(Duration::from_millis(20), rx.recv()).await.is_err());

    // Request names a superset: must be delivered.
    let (tx2, mut rx2) = mpsc::channel(4);
    let req2 = SotwRequest {
        node: node("A"),
        type_url: "TypeX".into(),
        version_info: "1".into(),
        resource_names: vec!["r1".into(), "r2".into()],
    };
    let handle2 = cache.create_watch(req2, KnownResourceNames::new(), tx2).await;
    assert!(!handle2.is_active());
    let response = rx2.recv().await.expect("superset request gets a response");
    assert_eq!(response.resources.len(), 2);
}

#[tokio::test]
async fn invariant_non_ads_response_is_subset_of_request_names() {
    let cache = SnapshotCache::new(false, Arc::new(IdHash));
    let token = CancellationToken::new();

    let snap = SnapshotBuilder::new()
        .with_resources("TypeX", "1", vec![resource("r1", "a"), resource("r2", "b")])
        .build();
    cache.set_snapshot(&token, "A", snap).await.unwrap();

    let (tx, mut rx) = mpsc::channel(4);
    let req = SotwRequest { node: node("A"), type_url: "TypeX".into(), version_info: "0".into(), resource_names: vec!["r1".into()] };
    let handle = cache.create_watch(req, KnownResourceNames::new(), tx).await;
    assert!(!handle.is_active());
    let response = rx.recv().await.expect("non-ADS response is delivered directly");
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].name(), "r1");
}

#[tokio::test]
async fn delta_watch_full_lifecycle_add_update_remove() {
    let cache = SnapshotCache::new(false, Arc::new(IdHash));
    let token = CancellationToken::new();

    let (tx, mut rx) = mpsc::channel(4);
    let state = Arc::new(tokio::sync::Mutex::new(xds_cache::StreamState::wildcard()));
    let req = xds_cache::DeltaRequest { node: node("A"), type_url: "TypeX".into(), ..Default::default() };
    let handle = cache.create_delta_watch(req.clone(), Arc::clone(&state), tx).await;
    assert!(handle.is_active(), "no snapshot yet: delta watch registers");

    let snap1 = SnapshotBuilder::new().with_resources("TypeX", "1", vec![resource("r1", "a")]).build();
    cache.set_snapshot(&token, "A", snap1).await.unwrap();
    let first = rx.recv().await.expect("delta watch woken by set_snapshot");
    assert_eq!(first.resources.len(), 1);
    assert!(first.removed_resources.is_empty());

    // Re-register: client is now up to date, watch stays registered
    // through a second set_snapshot that removes the resource.
    let (tx2, mut rx2) = mpsc::channel(4);
    let handle2 = cache.create_delta_watch(req, Arc::clone(&state), tx2).await;
    assert!(handle2.is_active());

    let snap2 = SnapshotBuilder::new().with_resources("TypeX", "2", vec![]).build();
    cache.set_snapshot(&token, "A", snap2).await.unwrap();
    let second = rx2.recv().await.expect("removal delivered");
    assert_eq!(second.removed_resources, vec!["r1".to_string()]);
    assert!(second.resources.is_empty());
}

#[tokio::test]
async fn clear_snapshot_abandons_open_watches_and_resets_node() {
    let cache = SnapshotCache::new(false, Arc::new(IdHash));
    let token = CancellationToken::new();

    let (tx, mut rx) = mpsc::channel(4);
    let req = SotwRequest { node: node("A"), type_url: "TypeX".into(), ..Default::default() };
    cache.create_watch(req, KnownResourceNames::new(), tx).await;
    assert_eq!(cache.get_status_keys().await, vec!["A".to_string()]);

    cache.clear_snapshot("A").await;
    assert!(cache.get_status_keys().await.is_empty());

    let snap = SnapshotBuilder::new().with_resources("TypeX", "1", vec![resource("r1", "a")]).build();
    cache.set_snapshot(&token, "A", snap).await.unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(20), rx.recv()).await.is_err(),
        "a watch abandoned by clear_snapshot must never be resurrected by a later set_snapshot"
    );
}
