use crate::resource::{Resource, ResourceRef};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A single type-tag's slice of a [`Snapshot`]: its opaque version string,
/// its resources by name, and a lazily-computed per-resource version map
/// used only for delta diffing.
#[derive(Debug)]
struct TypeState {
    version: String,
    items: HashMap<String, ResourceRef>,
    version_map: RwLock<Option<Arc<HashMap<String, String>>>>,
}

/// An immutable, per-node bundle of typed resources with per-type versions.
///
/// Cheap to clone: all shared state lives behind one `Arc`, so installing
/// the same snapshot object into multiple places (or cloning it into the
/// cache root under `spec.md §4.5`) never deep-copies resources.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    types: Arc<HashMap<String, TypeState>>,
}

impl Snapshot {
    /// The type-tag's opaque version, or `""` if the type-tag is unpresent.
    pub fn version(&self, type_url: &str) -> String {
        self.types.get(type_url).map(|t| t.version.clone()).unwrap_or_default()
    }

    /// The type-tag's resources, or `None` if the type-tag is unpresent.
    /// Unlike `version`, absence is distinguishable from "present but empty".
    pub fn resources(&self, type_url: &str) -> Option<&HashMap<String, ResourceRef>> {
        self.types.get(type_url).map(|t| &t.items)
    }

    pub fn type_urls(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Builds the per-resource version map for `type_url` if it hasn't been
    /// built yet, and returns it. Idempotent and safe to call while holding
    /// the cache lock: the first caller computes it, later callers (on this
    /// or any clone sharing the same `Arc`) observe the memoized result.
    ///
    /// Per-resource versions are SHA-256 digests of each resource's
    /// `marshalled()` bytes — an opaque, stable fingerprint the delta
    /// responder can compare against what a stream already knows, without
    /// the cache ever interpreting the payload.
    pub fn ensure_version_map(&self, type_url: &str) -> Arc<HashMap<String, String>> {
        let Some(state) = self.types.get(type_url) else {
            return Arc::new(HashMap::new());
        };
        if let Some(existing) = state.version_map.read().unwrap().as_ref() {
            return Arc::clone(existing);
        }
        let mut write = state.version_map.write().unwrap();
        if let Some(existing) = write.as_ref() {
            return Arc::clone(existing);
        }
        let computed = Arc::new(
            state
                .items
                .iter()
                .map(|(name, resource)| (name.clone(), hash_resource(resource.as_ref())))
                .collect::<HashMap<_, _>>(),
        );
        *write = Some(Arc::clone(&computed));
        computed
    }
}

fn hash_resource(resource: &dyn Resource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&*resource.marshalled());
    format!("{:x}", hasher.finalize())
}

/// Ergonomic construction of a [`Snapshot`]. Construction is the caller's
/// concern — the cache only ever treats snapshots as immutable values.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    types: HashMap<String, TypeState>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(
        mut self,
        type_url: impl Into<String>,
        version: impl Into<String>,
        resources: impl IntoIterator<Item = ResourceRef>,
    ) -> Self {
        let items = resources.into_iter().map(|r| (r.name().to_string(), r)).collect();
        self.types.insert(
            type_url.into(),
            TypeState { version: version.into(), items, version_map: RwLock::new(None) },
        );
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot { types: Arc::new(self.types) }
    }
}
