//! Demonstration plumbing for `xds-cache`.
//!
//! The core crate owns no transport: a real embedder would bridge a gRPC
//! bidirectional stream to `Cache::create_watch`/`create_delta_watch`. This
//! crate stands in for that bridge with an in-process simulated stream
//! (a bounded `tokio::sync::mpsc` channel plus a `ReceiverStream`, the same
//! plumbing a `tonic` server handler would use to push responses to a
//! client), and exercises the cache through it — both for the CLI demo
//! binary and for the integration test suite.

pub mod scenario;
pub mod stream;

pub use stream::{delta_channel, sotw_channel};
