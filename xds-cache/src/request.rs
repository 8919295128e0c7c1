use crate::node::Node;
use std::collections::{HashMap, HashSet};

/// A state-of-the-world discovery request, scoped to a single type-tag.
#[derive(Debug, Clone, Default)]
pub struct SotwRequest {
    pub node: Node,
    pub type_url: String,
    /// The client's last-known version for this type-tag. Empty string
    /// means "no version yet" (cold start).
    pub version_info: String,
    /// Empty means "all resources of this type"; non-empty scopes the
    /// response to a subset (and, in ADS mode, requires the subset to be a
    /// superset of the snapshot's names before a response is emitted).
    pub resource_names: Vec<String>,
}

/// A delta (incremental) discovery request. Carries subscription deltas
/// rather than a full name list, per the incremental xDS wire contract.
#[derive(Debug, Clone, Default)]
pub struct DeltaRequest {
    pub node: Node,
    pub type_url: String,
    pub resource_names_subscribe: Vec<String>,
    pub resource_names_unsubscribe: Vec<String>,
}

/// Per-connection record of what a delta-watching client currently knows.
/// Owned by the caller (the streaming server); the cache borrows it
/// read-write during `create_delta_watch` and during `set_snapshot`
/// dispatch.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Resource name -> last version delivered to this stream.
    pub resource_versions: HashMap<String, String>,
    /// The subscription set. Empty + `subscribe_to_all` = wildcard.
    pub subscribed: HashSet<String>,
    pub subscribed_to_all: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wildcard() -> Self {
        Self { subscribed_to_all: true, ..Self::default() }
    }

    /// Applies a delta request's subscribe/unsubscribe lists to the
    /// subscription set. Call before computing a response so the diff
    /// reflects the client's up-to-date interest.
    pub fn apply_subscriptions(&mut self, req: &DeltaRequest) {
        for name in &req.resource_names_subscribe {
            self.subscribed.insert(name.clone());
        }
        for name in &req.resource_names_unsubscribe {
            self.subscribed.remove(name);
            self.resource_versions.remove(name);
        }
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscribed_to_all || self.subscribed.contains(name)
    }
}

/// The set of resource names a client has already acknowledged, scoped by
/// type-tag. Used for the SOTW subset fast-path (`spec.md §4.4`); a stream
/// multiplexing several type-tags over one ADS connection carries one
/// entry per type-tag here.
pub type KnownResourceNames = HashMap<String, HashSet<String>>;
