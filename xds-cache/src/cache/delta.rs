use super::status::{DeltaWatch, StatusInfo, WatchHandle};
use super::{DeltaWatchSender, SnapshotCache};
use crate::error::CacheError;
use crate::request::{DeltaRequest, StreamState};
use crate::resource::Resource;
use crate::response::DeltaResponse;
use crate::snapshot::Snapshot;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// `spec.md §4.6`: computes the delta response for one (snapshot, request,
/// stream-state) triple, mutating `stream_state` to reflect what was just
/// delivered. Returns `None` iff the client is already fully up to date —
/// which is exactly when the watch should stay registered.
fn respond_delta(
    snapshot: &Snapshot,
    request: &DeltaRequest,
    state: &mut StreamState,
) -> Option<DeltaResponse> {
    state.apply_subscriptions(request);

    let version_map = snapshot.ensure_version_map(&request.type_url);
    let resources = snapshot.resources(&request.type_url);

    let mut changed = Vec::new();
    if let Some(resources) = resources {
        for (name, resource) in resources {
            if !state.is_subscribed(name) {
                continue;
            }
            let current_version = version_map.get(name).map(String::as_str);
            let known_version = state.resource_versions.get(name).map(String::as_str);
            if known_version != current_version {
                changed.push(Arc::clone(resource));
            }
        }
    }

    let mut removed = Vec::new();
    let known_names: Vec<String> = state.resource_versions.keys().cloned().collect();
    for name in known_names {
        if !state.is_subscribed(&name) {
            continue;
        }
        let still_present = resources.map(|r| r.contains_key(&name)).unwrap_or(false);
        if !still_present {
            removed.push(name.clone());
            state.resource_versions.remove(&name);
        }
    }

    if changed.is_empty() && removed.is_empty() {
        return None;
    }

    for resource in &changed {
        if let Some(version) = version_map.get(resource.name()) {
            state.resource_versions.insert(resource.name().to_string(), version.clone());
        }
    }

    Some(DeltaResponse {
        type_url: request.type_url.clone(),
        system_version: snapshot.version(&request.type_url),
        resources: changed,
        removed_resources: removed,
        request: request.clone(),
    })
}

pub(super) async fn create_delta_watch(
    cache: &SnapshotCache,
    request: DeltaRequest,
    stream_state: Arc<Mutex<StreamState>>,
    sink: DeltaWatchSender,
) -> WatchHandle {
    let node_key = cache.node_key(&request.node);

    let mut maps = cache.inner.write().await;
    let status_arc = Arc::clone(
        maps.status
            .entry(node_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(StatusInfo::new(request.node.clone())))),
    );
    let snapshot = maps.snapshots.get(&node_key).cloned();

    let mut status = status_arc.lock().await;
    status.last_watch_request_time = std::time::Instant::now();

    if let Some(snapshot) = snapshot {
        let mut state = stream_state.lock().await;
        if let Some(response) = respond_delta(&snapshot, &request, &mut state) {
            drop(state);
            info!(node = %node_key, type_url = %request.type_url, "delta watch: responding synchronously");
            super::check_sink_capacity(&sink);
            let _ = sink.try_send(response);
            return WatchHandle::noop(node_key);
        }
    }

    debug!(node = %node_key, type_url = %request.type_url, "delta watch: registering, client up to date or no snapshot");
    let id = cache.next_watch_id();
    status.delta_watches.insert(id, DeltaWatch { request, state: stream_state, tx: sink });
    WatchHandle::registered(node_key, id)
}

/// Dispatches open delta watches as part of `set_snapshot` (`spec.md §4.5`
/// steps 3-4). Called with the cache-root write lock already held by the
/// caller; acquires the status lock itself since `sotw::set_snapshot`
/// drops it before delegating here.
pub(super) async fn dispatch_on_set_snapshot(
    cache: &SnapshotCache,
    cancellation: &CancellationToken,
    status_arc: &Arc<Mutex<StatusInfo>>,
    snapshot: &Snapshot,
    sink_failure: &mut Option<String>,
) -> Result<(), CacheError> {
    let mut status = status_arc.lock().await;
    if status.delta_watches.is_empty() {
        return Ok(());
    }

    // Pre-warm the version map once per type-tag touched by an open delta
    // watch, rather than per watch (`spec.md §4.5` step 3).
    let type_urls: std::collections::HashSet<String> =
        status.delta_watches.values().map(|w| w.request.type_url.clone()).collect();
    for type_url in type_urls {
        snapshot.ensure_version_map(&type_url);
    }

    let candidates: Vec<(super::WatchId, DeltaRequest, Arc<Mutex<StreamState>>, DeltaWatchSender)> = status
        .delta_watches
        .iter()
        .map(|(id, w)| (*id, w.request.clone(), Arc::clone(&w.state), w.tx.clone()))
        .collect();

    for (id, request, state, tx) in candidates {
        if cancellation.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let mut state = state.lock().await;
        let Some(response) = respond_delta(snapshot, &request, &mut state) else {
            continue;
        };
        drop(state);
        super::check_sink_capacity(&tx);
        match tx.try_send(response) {
            Ok(()) => {
                info!(node = %cache.node_key(&request.node), type_url = %request.type_url, "delta watch triggered");
                status.delta_watches.remove(&id);
            }
            Err(err) => {
                tracing::warn!(type_url = %request.type_url, error = %err.to_string(), "delta sink send failed");
                sink_failure.get_or_insert(err.to_string());
                status.delta_watches.remove(&id);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::OpaqueResource;
    use crate::snapshot::SnapshotBuilder;

    fn resource(name: &str, payload: &str) -> Arc<dyn crate::resource::Resource> {
        Arc::new(OpaqueResource::new(name, payload.as_bytes().to_vec()))
    }

    #[test]
    fn respond_delta_is_none_when_up_to_date() {
        let snap = SnapshotBuilder::new().with_resources("TypeX", "1", vec![resource("r1", "a")]).build();
        let mut state = StreamState::wildcard();
        let req = DeltaRequest { type_url: "TypeX".into(), ..Default::default() };
        let first = respond_delta(&snap, &req, &mut state).expect("first response");
        assert_eq!(first.resources.len(), 1);
        assert!(respond_delta(&snap, &req, &mut state).is_none());
    }

    #[test]
    fn respond_delta_reports_removed_resources() {
        let snap_v1 =
            SnapshotBuilder::new().with_resources("TypeX", "1", vec![resource("r1", "a")]).build();
        let snap_v2 = SnapshotBuilder::new().with_resources("TypeX", "2", vec![]).build();
        let mut state = StreamState::wildcard();
        let req = DeltaRequest { type_url: "TypeX".into(), ..Default::default() };
        respond_delta(&snap_v1, &req, &mut state).expect("initial response");
        let second = respond_delta(&snap_v2, &req, &mut state).expect("removal response");
        assert_eq!(second.removed_resources, vec!["r1".to_string()]);
        assert!(second.resources.is_empty());
    }

    #[test]
    fn respond_delta_never_includes_unsubscribed_resources() {
        let snap =
            SnapshotBuilder::new().with_resources("TypeX", "1", vec![resource("r1", "a"), resource("r2", "b")]).build();
        let mut state = StreamState::new();
        state.subscribed.insert("r1".to_string());
        let req = DeltaRequest { type_url: "TypeX".into(), ..Default::default() };
        let resp = respond_delta(&snap, &req, &mut state).expect("response");
        assert_eq!(resp.resources.len(), 1);
        assert_eq!(resp.resources[0].name(), "r1");
    }
}
