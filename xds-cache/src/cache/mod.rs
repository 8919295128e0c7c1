mod delta;
mod fetch;
mod heartbeat;
mod sotw;
mod status;

pub use status::{DeltaWatchSender, StatusSnapshot, WatchHandle, WatchId, WatchSender};
pub(crate) use status::{DeltaWatch, SotwWatch, StatusInfo};

use crate::error::CacheError;
use crate::node::NodeHash;
use crate::request::{DeltaRequest, KnownResourceNames, SotwRequest, StreamState};
use crate::response::Response;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// The cache's public contract, per `spec.md §6`. A single concrete type
/// ([`SnapshotCache`]) implements it; the trait exists so embedders and
/// tests can depend on the contract rather than the implementation,
/// matching the teacher's `Cache` trait.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set_snapshot(
        &self,
        cancellation: &CancellationToken,
        node_key: &str,
        snapshot: Snapshot,
    ) -> Result<(), CacheError>;

    async fn get_snapshot(&self, node_key: &str) -> Result<Snapshot, CacheError>;

    async fn clear_snapshot(&self, node_key: &str);

    async fn create_watch(
        &self,
        request: SotwRequest,
        known_resource_names: KnownResourceNames,
        sink: WatchSender,
    ) -> WatchHandle;

    async fn create_delta_watch(
        &self,
        request: DeltaRequest,
        stream_state: Arc<Mutex<StreamState>>,
        sink: DeltaWatchSender,
    ) -> WatchHandle;

    async fn cancel_watch(&self, handle: &WatchHandle);

    async fn fetch(
        &self,
        cancellation: &CancellationToken,
        request: &SotwRequest,
    ) -> Result<Response, crate::error::FetchError>;

    async fn get_status_info(&self, node_key: &str) -> Option<StatusSnapshot>;

    async fn get_status_keys(&self) -> Vec<String>;
}

/// Cache-root state: per-node snapshots, and per-node status entries.
/// Guarded by a single `RwLock` (`spec.md §5`: "one reader-writer lock
/// guards the cache root"). Each status entry carries its own inner
/// `Mutex`, acquired only while the root lock is already held, per the
/// cache-then-status lock order.
#[derive(Default)]
struct CacheMaps {
    snapshots: HashMap<String, Snapshot>,
    status: HashMap<String, Arc<Mutex<StatusInfo>>>,
}

/// The core snapshot cache. `spec.md §2`: watch dispatcher, status
/// registry, and fetch path all live here; node-hash and heartbeating are
/// constructor-time collaborators.
pub struct SnapshotCache {
    inner: RwLock<CacheMaps>,
    ads: bool,
    node_hash: Arc<dyn NodeHash>,
    watch_counter: AtomicU64,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache").field("ads", &self.ads).finish_non_exhaustive()
    }
}

impl SnapshotCache {
    pub fn new(ads: bool, node_hash: Arc<dyn NodeHash>) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(CacheMaps::default()),
            ads,
            node_hash,
            watch_counter: AtomicU64::new(0),
        })
    }

    /// Constructs a cache and spawns a background heartbeat task that ticks
    /// every `interval`, per `spec.md §4.7`. The task stops observing the
    /// cache once `cancellation` is triggered.
    pub fn with_heartbeating(
        cancellation: CancellationToken,
        ads: bool,
        node_hash: Arc<dyn NodeHash>,
        interval: std::time::Duration,
    ) -> Arc<Self> {
        let cache = Self::new(ads, node_hash);
        heartbeat::spawn(Arc::clone(&cache), cancellation, interval);
        cache
    }

    pub(crate) fn next_watch_id(&self) -> WatchId {
        WatchId(self.watch_counter.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn is_ads(&self) -> bool {
        self.ads
    }

    pub(crate) fn node_key(&self, node: &crate::node::Node) -> String {
        self.node_hash.id(node)
    }
}

/// A sink of zero capacity is a contract violation (`spec.md §7`: "a sink
/// of zero capacity" is "implementation-defined" behavior, not something
/// the cache is required to recover from). Debug builds catch it loudly;
/// release builds log and proceed, since the cache must not panic on
/// otherwise-valid input.
pub(crate) fn check_sink_capacity<T>(tx: &tokio::sync::mpsc::Sender<T>) {
    debug_assert!(tx.max_capacity() > 0, "watch sink must have capacity >= 1 per spec.md §4.4");
    if tx.max_capacity() == 0 {
        tracing::warn!("watch sink constructed with zero capacity; embedder contract violation");
    }
}

#[async_trait]
impl Cache for SnapshotCache {
    async fn set_snapshot(
        &self,
        cancellation: &CancellationToken,
        node_key: &str,
        snapshot: Snapshot,
    ) -> Result<(), CacheError> {
        sotw::set_snapshot(self, cancellation, node_key, snapshot).await
    }

    async fn get_snapshot(&self, node_key: &str) -> Result<Snapshot, CacheError> {
        let maps = self.inner.read().await;
        maps.snapshots.get(node_key).cloned().ok_or(CacheError::MissingSnapshot)
    }

    async fn clear_snapshot(&self, node_key: &str) {
        let mut maps = self.inner.write().await;
        maps.snapshots.remove(node_key);
        maps.status.remove(node_key);
    }

    async fn create_watch(
        &self,
        request: SotwRequest,
        known_resource_names: KnownResourceNames,
        sink: WatchSender,
    ) -> WatchHandle {
        sotw::create_watch(self, request, known_resource_names, sink).await
    }

    async fn create_delta_watch(
        &self,
        request: DeltaRequest,
        stream_state: Arc<Mutex<StreamState>>,
        sink: DeltaWatchSender,
    ) -> WatchHandle {
        delta::create_delta_watch(self, request, stream_state, sink).await
    }

    async fn cancel_watch(&self, handle: &WatchHandle) {
        let Some(id) = handle.id else { return };
        let maps = self.inner.read().await;
        if let Some(status) = maps.status.get(&handle.node_key) {
            let mut status = status.lock().await;
            if status.sotw_watches.remove(&id).is_none() {
                status.delta_watches.remove(&id);
            }
        }
    }

    async fn fetch(
        &self,
        cancellation: &CancellationToken,
        request: &SotwRequest,
    ) -> Result<Response, crate::error::FetchError> {
        fetch::fetch(self, cancellation, request).await
    }

    async fn get_status_info(&self, node_key: &str) -> Option<StatusSnapshot> {
        let maps = self.inner.read().await;
        let status = maps.status.get(node_key)?;
        let status = status.lock().await;
        Some(StatusSnapshot::from(&*status))
    }

    async fn get_status_keys(&self) -> Vec<String> {
        let maps = self.inner.read().await;
        maps.status.keys().cloned().collect()
    }
}
