use crate::node::Node;
use crate::request::{DeltaRequest, SotwRequest, StreamState};
use crate::response::{DeltaResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};

/// Globally unique (per `SnapshotCache` instance), monotonically increasing
/// watch identifier. `spec.md §3`: "the id namespace is process-wide" — here
/// scoped to one cache instance, per the Design Notes clarification that the
/// counter is per-instance rather than truly global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub(crate) u64);

pub type WatchSender = mpsc::Sender<Response>;
pub type DeltaWatchSender = mpsc::Sender<DeltaResponse>;

/// Returned by `create_watch`/`create_delta_watch`. `id` is `None` when the
/// request was served synchronously (subset fast-path or an immediate
/// version-changed response) — cancelling such a handle is a no-op, per
/// `spec.md §4.4`.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    pub(crate) node_key: String,
    pub(crate) id: Option<WatchId>,
}

impl WatchHandle {
    pub(crate) fn registered(node_key: String, id: WatchId) -> Self {
        Self { node_key, id: Some(id) }
    }

    pub(crate) fn noop(node_key: String) -> Self {
        Self { node_key, id: None }
    }

    /// `true` if cancelling this handle actually removes a registered watch.
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }
}

pub(crate) struct SotwWatch {
    pub request: SotwRequest,
    pub known_resource_names: std::collections::HashSet<String>,
    pub tx: WatchSender,
}

pub(crate) struct DeltaWatch {
    pub request: DeltaRequest,
    pub state: Arc<Mutex<StreamState>>,
    pub tx: DeltaWatchSender,
}

/// Per-node watch tables and diagnostics. `spec.md §3`: created lazily on
/// first `create_watch`/`create_delta_watch`/mention in `set_snapshot`,
/// destroyed only by `clear_snapshot`.
pub(crate) struct StatusInfo {
    pub node: Node,
    pub last_watch_request_time: Instant,
    pub sotw_watches: HashMap<WatchId, SotwWatch>,
    pub delta_watches: HashMap<WatchId, DeltaWatch>,
}

impl StatusInfo {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            last_watch_request_time: Instant::now(),
            sotw_watches: HashMap::new(),
            delta_watches: HashMap::new(),
        }
    }
}

/// Public, read-only projection of a [`StatusInfo`] for `get_status_info`.
/// Never exposes the watch tables themselves — those hold response senders
/// that are this crate's concern alone.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub node: Node,
    pub last_watch_request_time: Instant,
    pub num_sotw_watches: usize,
    pub num_delta_watches: usize,
}

impl From<&StatusInfo> for StatusSnapshot {
    fn from(status: &StatusInfo) -> Self {
        Self {
            node: status.node.clone(),
            last_watch_request_time: status.last_watch_request_time,
            num_sotw_watches: status.sotw_watches.len(),
            num_delta_watches: status.delta_watches.len(),
        }
    }
}
