use super::SnapshotCache;
use crate::resource::Resource;
use crate::response::Response;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// `spec.md §4.7`: spawns the background heartbeat task. Returns
/// immediately; the task runs until `cancellation` fires between ticks.
pub(super) fn spawn(cache: Arc<SnapshotCache>, cancellation: CancellationToken, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so heartbeating starts
        // `interval` after construction, not on it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("heartbeat loop: cancellation observed, stopping");
                    return;
                }
                _ = ticker.tick() => {
                    tick(&cache).await;
                }
            }
        }
    });
}

async fn tick(cache: &SnapshotCache) {
    let maps = cache.inner.write().await;
    let node_keys: Vec<String> = maps.status.keys().cloned().collect();
    for node_key in node_keys {
        let Some(status_arc) = maps.status.get(&node_key).cloned() else { continue };
        let Some(snapshot) = maps.snapshots.get(&node_key).cloned() else { continue };
        let mut status = status_arc.lock().await;

        let candidates: Vec<(super::WatchId, crate::request::SotwRequest, super::WatchSender)> =
            status.sotw_watches.iter().map(|(id, w)| (*id, w.request.clone(), w.tx.clone())).collect();

        for (id, request, tx) in candidates {
            let Some(resources) = snapshot.resources(&request.type_url) else { continue };
            let ttl_resources: Vec<_> =
                resources.values().filter(|r| r.ttl().is_some()).cloned().collect();
            if ttl_resources.is_empty() {
                continue;
            }
            let version = snapshot.version(&request.type_url);
            let response = Response {
                type_url: request.type_url.clone(),
                version: version.clone(),
                resources: ttl_resources,
                request: request.clone(),
                heartbeat: true,
            };
            super::check_sink_capacity(&tx);
            if tx.try_send(response).is_ok() {
                info!(node = %node_key, type_url = %request.type_url, version = %version, "heartbeat emitted");
            }
            // The watch is removed whether or not the send succeeded: the
            // client is expected to ACK by re-establishing a fresh watch
            // via create_watch, and a send failure means the sink is gone
            // regardless (`spec.md §4.7`).
            status.sotw_watches.remove(&id);
        }
    }
}
