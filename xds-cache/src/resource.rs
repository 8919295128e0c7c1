use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An opaque configuration payload. The cache never interprets a
/// `Resource`'s bytes; it only ever reads `name()`, `ttl()`, and, when a
/// delta watch needs a per-resource version, `marshalled()`.
///
/// `spec.md §3`: TTL absent means "never heartbeat"; TTL present means
/// "eligible for heartbeat refresh".
pub trait Resource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn ttl(&self) -> Option<Duration> {
        None
    }

    /// Opaque bytes used only to derive a per-resource version for delta
    /// diffing (`Snapshot::ensure_version_map`). The cache does not decode
    /// or otherwise interpret this payload.
    fn marshalled(&self) -> Cow<'_, [u8]>;
}

pub type ResourceRef = Arc<dyn Resource>;

/// A ready-made [`Resource`] for embedders that have no existing payload
/// type of their own, and for tests.
#[derive(Debug, Clone)]
pub struct OpaqueResource {
    name: String,
    ttl: Option<Duration>,
    payload: Vec<u8>,
}

impl OpaqueResource {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), ttl: None, payload: payload.into() }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl Resource for OpaqueResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn marshalled(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_resource_has_no_ttl_by_default() {
        let r = OpaqueResource::new("r1", b"payload".to_vec());
        assert_eq!(r.ttl(), None);
        assert_eq!(r.name(), "r1");
    }

    #[test]
    fn opaque_resource_with_ttl_is_eligible_for_heartbeat() {
        let r = OpaqueResource::new("r1", b"payload".to_vec()).with_ttl(Duration::from_secs(30));
        assert_eq!(r.ttl(), Some(Duration::from_secs(30)));
    }
}
