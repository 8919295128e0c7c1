use thiserror::Error;

/// Errors a [`crate::cache::Cache`] implementation can return.
///
/// `ADS-inconsistent` from the error taxonomy is deliberately absent here:
/// the spec calls it a silent, logged-not-returned condition, so it never
/// surfaces as a value — see the `tracing::debug!` call sites in
/// `cache::sotw` instead.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No snapshot has ever been installed for this node.
    #[error("no snapshot for node")]
    MissingSnapshot,

    /// The embedder's cancellation signal fired while a response was being
    /// delivered to a sink.
    #[error("operation cancelled")]
    Cancelled,

    /// A watch's sink rejected a send despite the caller's promised
    /// capacity (the receiver was almost certainly dropped).
    #[error("response sink unreachable: {0}")]
    SinkSendFailed(String),
}

/// Errors specific to the one-shot [`crate::cache::Cache::fetch`] path.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no snapshot for node")]
    MissingSnapshot,

    /// Sentinel, not an operational failure: the caller's known version
    /// already matches the snapshot. The caller is expected to poll again
    /// later rather than treat this as an error condition.
    #[error("snapshot version unchanged, nothing to fetch")]
    SkipFetch,

    #[error("operation cancelled")]
    Cancelled,
}

impl From<CacheError> for FetchError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::MissingSnapshot => FetchError::MissingSnapshot,
            CacheError::Cancelled => FetchError::Cancelled,
            // Fetch never sends to a sink; this arm is unreachable in
            // practice but kept total rather than panicking at a library
            // boundary.
            CacheError::SinkSendFailed(msg) => {
                tracing::warn!(message = %msg, "unexpected sink error surfaced from fetch path");
                FetchError::MissingSnapshot
            }
        }
    }
}
