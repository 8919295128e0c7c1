use super::SnapshotCache;
use crate::error::FetchError;
use crate::request::SotwRequest;
use crate::response::Response;
use tokio_util::sync::CancellationToken;

/// `spec.md §4.3`: one-shot fetch. Registers no watch and never mutates
/// status — only the snapshot map is read, under the cache's shared lock.
pub(super) async fn fetch(
    cache: &SnapshotCache,
    cancellation: &CancellationToken,
    request: &SotwRequest,
) -> Result<Response, FetchError> {
    if cancellation.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let node_key = cache.node_key(&request.node);
    let maps = cache.inner.read().await;
    let snapshot = maps.snapshots.get(&node_key).ok_or(FetchError::MissingSnapshot)?;

    let version = snapshot.version(&request.type_url);
    if version == request.version_info {
        return Err(FetchError::SkipFetch);
    }

    let resources = snapshot.resources(&request.type_url);
    let filtered = if request.resource_names.is_empty() {
        resources.map(|r| r.values().cloned().collect()).unwrap_or_default()
    } else {
        resources
            .map(|r| request.resource_names.iter().filter_map(|name| r.get(name).cloned()).collect())
            .unwrap_or_default()
    };

    Ok(Response {
        type_url: request.type_url.clone(),
        version,
        resources: filtered,
        request: request.clone(),
        heartbeat: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::node::{IdHash, Node};
    use crate::resource::{OpaqueResource, Resource};
    use crate::snapshot::SnapshotBuilder;
    use std::sync::Arc;

    #[tokio::test]
    async fn fetch_missing_snapshot() {
        let cache = SnapshotCache::new(false, Arc::new(IdHash));
        let token = CancellationToken::new();
        let req = SotwRequest { node: Node { id: "a".into(), ..Default::default() }, type_url: "TypeX".into(), ..Default::default() };
        let err = cache.fetch(&token, &req).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingSnapshot));
    }

    #[tokio::test]
    async fn fetch_skips_when_version_matches() {
        let cache = SnapshotCache::new(false, Arc::new(IdHash));
        let token = CancellationToken::new();
        let snap = SnapshotBuilder::new()
            .with_resources("TypeX", "1", vec![Arc::new(OpaqueResource::new("r1", b"x".to_vec())) as _])
            .build();
        cache.set_snapshot(&token, "a", snap).await.unwrap();
        let req = SotwRequest {
            node: Node { id: "a".into(), ..Default::default() },
            type_url: "TypeX".into(),
            version_info: "1".into(),
            ..Default::default()
        };
        let err = cache.fetch(&token, &req).await.unwrap_err();
        assert!(matches!(err, FetchError::SkipFetch));
    }

    #[tokio::test]
    async fn fetch_idempotence_on_stable_snapshot() {
        let cache = SnapshotCache::new(false, Arc::new(IdHash));
        let token = CancellationToken::new();
        let snap = SnapshotBuilder::new()
            .with_resources("TypeX", "1", vec![Arc::new(OpaqueResource::new("r1", b"x".to_vec())) as _])
            .build();
        cache.set_snapshot(&token, "a", snap).await.unwrap();
        let req = SotwRequest {
            node: Node { id: "a".into(), ..Default::default() },
            type_url: "TypeX".into(),
            version_info: "1".into(),
            ..Default::default()
        };
        let first = cache.fetch(&token, &req).await.unwrap_err();
        let second = cache.fetch(&token, &req).await.unwrap_err();
        assert!(matches!(first, FetchError::SkipFetch));
        assert!(matches!(second, FetchError::SkipFetch));
    }

    #[tokio::test]
    async fn fetch_returns_subset_for_named_resources() {
        let cache = SnapshotCache::new(false, Arc::new(IdHash));
        let token = CancellationToken::new();
        let snap = SnapshotBuilder::new()
            .with_resources(
                "TypeX",
                "1",
                vec![
                    Arc::new(OpaqueResource::new("r1", b"x".to_vec())) as _,
                    Arc::new(OpaqueResource::new("r2", b"y".to_vec())) as _,
                ],
            )
            .build();
        cache.set_snapshot(&token, "a", snap).await.unwrap();
        let req = SotwRequest {
            node: Node { id: "a".into(), ..Default::default() },
            type_url: "TypeX".into(),
            version_info: "0".into(),
            resource_names: vec!["r2".into()],
        };
        let resp = cache.fetch(&token, &req).await.unwrap();
        assert_eq!(resp.resources.len(), 1);
        assert_eq!(resp.resources[0].name(), "r2");
    }
}
