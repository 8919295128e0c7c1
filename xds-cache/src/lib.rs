//! A node-partitioned, version-addressed configuration cache for
//! xDS-shaped discovery protocols.
//!
//! This crate is the core of a control plane: it mediates between a
//! producer that periodically installs consistent bundles of resources
//! (`Snapshot`) and many long-lived watchers (state-of-the-world or delta)
//! or one-shot fetchers. It owns no transport, no serialization format, and
//! no policy for deciding what belongs in a snapshot — those are an
//! embedder's concern.

mod cache;
mod error;
mod node;
mod request;
mod resource;
mod response;
mod snapshot;

pub use cache::{Cache, DeltaWatchSender, SnapshotCache, StatusSnapshot, WatchHandle, WatchId, WatchSender};
pub use error::{CacheError, FetchError};
pub use node::{IdHash, Locality, Node, NodeHash, Sha256NodeHash};
pub use request::{DeltaRequest, KnownResourceNames, SotwRequest, StreamState};
pub use resource::{OpaqueResource, Resource, ResourceRef};
pub use response::{DeltaResponse, Response};
pub use snapshot::{Snapshot, SnapshotBuilder};

/// Re-exported so embedders don't need a direct `tokio-util` dependency
/// just to pass a `CancellationToken` into `Cache::set_snapshot`/`fetch`
/// or to construct a heartbeating cache.
pub use tokio_util::sync::CancellationToken;
