//! A simulated bidirectional discovery stream.
//!
//! Stands in for the half of a gRPC stream that pushes responses down to a
//! client: a bounded channel sized to the sink-capacity contract
//! `spec.md §4.4` requires (capacity >= 1), wrapped as a `ReceiverStream` so
//! callers can drain it with `futures::StreamExt` the way a real streaming
//! handler would forward responses onto the wire.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use xds_cache::{DeltaResponse, DeltaWatchSender, Response, WatchSender};

/// Default channel capacity for a simulated SOTW or delta stream. One slot
/// is enough to satisfy the cache's non-blocking `try_send` emission
/// contract for a single outstanding response per watch.
pub const DEFAULT_CAPACITY: usize = 4;

/// Builds a simulated state-of-the-world stream: a `WatchSender` to hand to
/// `Cache::create_watch`, and a `ReceiverStream<Response>` the caller drains.
pub fn sotw_channel(capacity: usize) -> (WatchSender, ReceiverStream<Response>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ReceiverStream::new(rx))
}

/// Builds a simulated delta stream: a `DeltaWatchSender` to hand to
/// `Cache::create_delta_watch`, and a `ReceiverStream<DeltaResponse>`.
pub fn delta_channel(capacity: usize) -> (DeltaWatchSender, ReceiverStream<DeltaResponse>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ReceiverStream::new(rx))
}
