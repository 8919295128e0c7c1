use super::status::{SotwWatch, StatusInfo, WatchHandle};
use super::SnapshotCache;
use crate::error::CacheError;
use crate::request::{KnownResourceNames, SotwRequest};
use crate::resource::ResourceRef;
use crate::response::Response;
use crate::snapshot::Snapshot;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::status::WatchSender;

/// `true` iff a response may be emitted. ADS mode suppresses emission
/// unless the request's resource names are a superset of the snapshot's
/// names for this type-tag (`spec.md §4.4` "ADS filtering rule"). Non-ADS
/// mode never suppresses. An empty request name list is never filtered
/// (it means "all resources").
fn ads_filter_passes(
    ads: bool,
    request_names: &[String],
    resources: Option<&HashMap<String, ResourceRef>>,
) -> bool {
    if !ads || request_names.is_empty() {
        return true;
    }
    let Some(resources) = resources else { return true };
    let requested: HashSet<&str> = request_names.iter().map(String::as_str).collect();
    resources.keys().all(|name| requested.contains(name.as_str()))
}

/// Builds the response body: the full set of resources if the request
/// named none, otherwise the intersection of named resources with the
/// snapshot (`spec.md §4.4` "Response shape").
fn filtered_resources(
    request_names: &[String],
    resources: Option<&HashMap<String, ResourceRef>>,
) -> Vec<ResourceRef> {
    let Some(resources) = resources else { return Vec::new() };
    if request_names.is_empty() {
        resources.values().cloned().collect()
    } else {
        request_names.iter().filter_map(|name| resources.get(name).cloned()).collect()
    }
}

fn build_response(request: &SotwRequest, resources: Option<&HashMap<String, ResourceRef>>, version: &str, heartbeat: bool) -> Response {
    Response {
        type_url: request.type_url.clone(),
        version: version.to_string(),
        resources: filtered_resources(&request.resource_names, resources),
        request: request.clone(),
        heartbeat,
    }
}

/// Attempts a non-blocking emission. Never awaits, so it never suspends
/// while the cache (or status) lock is held, per `spec.md §5`.
fn try_emit(tx: &WatchSender, response: Response) -> Result<(), String> {
    super::check_sink_capacity(tx);
    tx.try_send(response).map_err(|err| err.to_string())
}

/// `spec.md §4.4`: state-of-the-world `create_watch`. `known_resource_names`
/// carries the client's acknowledged-name sets for every type-tag on a
/// multiplexed stream (`spec.md §3` "Watch": a request carries the client's
/// known names); only the entry for `request.type_url` is relevant here,
/// matching the teacher's `known_resource_names.get(&req.type_url)` lookup.
pub(super) async fn create_watch(
    cache: &SnapshotCache,
    request: SotwRequest,
    known_resource_names: KnownResourceNames,
    sink: WatchSender,
) -> WatchHandle {
    let known_resource_names =
        known_resource_names.get(&request.type_url).cloned().unwrap_or_default();
    let node_key = cache.node_key(&request.node);

    // Cache lock held for the whole operation, status lock acquired
    // nested: this is what lets the subset fast-path and the registration
    // decision below observe one atomic view of (snapshot, status), with
    // no concurrent `set_snapshot` able to interleave (`spec.md §5`).
    let mut maps = cache.inner.write().await;
    let status_arc = Arc::clone(
        maps.status
            .entry(node_key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(StatusInfo::new(request.node.clone())))),
    );
    let snapshot = maps.snapshots.get(&node_key).cloned();

    let mut status = status_arc.lock().await;
    status.last_watch_request_time = std::time::Instant::now();

    let Some(snapshot) = snapshot else {
        debug!(node = %node_key, type_url = %request.type_url, "no snapshot; registering watch");
        let id = cache.next_watch_id();
        status.sotw_watches.insert(id, SotwWatch { request, known_resource_names, tx: sink });
        return WatchHandle::registered(node_key, id);
    };

    let resources = snapshot.resources(&request.type_url);
    let type_version = snapshot.version(&request.type_url);

    // Subset fast-path (`spec.md §4.4` step 4, Open Question (i)): stop at
    // the first requested-but-unknown name that exists in the snapshot and
    // emit one response covering the full intersection, rather than
    // responding per missing name.
    let mut fast_path_hit = false;
    if let Some(resources) = resources {
        for name in request.resource_names.iter().filter(|n| !known_resource_names.contains(n.as_str())) {
            if resources.contains_key(name) {
                fast_path_hit = true;
                break;
            }
        }
    }

    if fast_path_hit {
        if ads_filter_passes(cache.is_ads(), &request.resource_names, resources) {
            info!(node = %node_key, type_url = %request.type_url, version = %type_version, "subset fast-path: responding synchronously");
            let response = build_response(&request, resources, &type_version, false);
            let _ = try_emit(&sink, response);
            return WatchHandle::noop(node_key);
        }
        debug!(node = %node_key, type_url = %request.type_url, "ads inconsistent on subset fast-path; registering watch");
        let id = cache.next_watch_id();
        status.sotw_watches.insert(id, SotwWatch { request, known_resource_names, tx: sink });
        return WatchHandle::registered(node_key, id);
    }

    if request.version_info == type_version {
        info!(node = %node_key, type_url = %request.type_url, "client at latest version; registering watch");
        let id = cache.next_watch_id();
        status.sotw_watches.insert(id, SotwWatch { request, known_resource_names, tx: sink });
        return WatchHandle::registered(node_key, id);
    }

    if ads_filter_passes(cache.is_ads(), &request.resource_names, resources) {
        info!(node = %node_key, type_url = %request.type_url, version = %type_version, "version changed; responding synchronously");
        let response = build_response(&request, resources, &type_version, false);
        let _ = try_emit(&sink, response);
        return WatchHandle::noop(node_key);
    }
    debug!(node = %node_key, type_url = %request.type_url, "ads inconsistent on version change; registering watch");
    let id = cache.next_watch_id();
    status.sotw_watches.insert(id, SotwWatch { request, known_resource_names, tx: sink });
    WatchHandle::registered(node_key, id)
}

/// `spec.md §4.5`: install a new snapshot and dispatch eligible SOTW
/// watches. Delta dispatch lives in `super::delta`; both are driven from
/// here so the whole operation shares one cache-root write-lock span.
pub(super) async fn set_snapshot(
    cache: &SnapshotCache,
    cancellation: &CancellationToken,
    node_key: &str,
    snapshot: Snapshot,
) -> Result<(), CacheError> {
    let mut maps = cache.inner.write().await;
    maps.snapshots.insert(node_key.to_string(), snapshot.clone());
    let Some(status_arc) = maps.status.get(node_key).cloned() else {
        return Ok(());
    };
    let mut status = status_arc.lock().await;

    let mut sink_failure: Option<String> = None;

    let candidates: Vec<(super::WatchId, SotwRequest, WatchSender)> =
        status.sotw_watches.iter().map(|(id, w)| (*id, w.request.clone(), w.tx.clone())).collect();

    for (id, request, tx) in candidates {
        if cancellation.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let new_version = snapshot.version(&request.type_url);
        if new_version == request.version_info {
            continue;
        }
        let resources = snapshot.resources(&request.type_url);
        if !ads_filter_passes(cache.is_ads(), &request.resource_names, resources) {
            debug!(node = %node_key, type_url = %request.type_url, "ads inconsistent; watch remains open");
            continue;
        }
        let response = build_response(&request, resources, &new_version, false);
        match try_emit(&tx, response) {
            Ok(()) => {
                info!(node = %node_key, type_url = %request.type_url, version = %new_version, "watch triggered");
                status.sotw_watches.remove(&id);
            }
            Err(err) => {
                tracing::warn!(node = %node_key, type_url = %request.type_url, error = %err, "sink send failed");
                sink_failure.get_or_insert(err);
                status.sotw_watches.remove(&id);
            }
        }
    }

    drop(status);
    super::delta::dispatch_on_set_snapshot(cache, cancellation, &status_arc, &snapshot, &mut sink_failure).await?;

    match sink_failure {
        Some(msg) => Err(CacheError::SinkSendFailed(msg)),
        None => Ok(()),
    }
}
