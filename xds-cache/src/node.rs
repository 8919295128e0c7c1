use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A generic client-identity descriptor. Shaped after Envoy's `core.v3.Node`
/// but independent of any protobuf definition — callers own their own
/// descriptor type and pass it by value to the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub id: String,
    pub cluster: String,
    pub metadata: BTreeMap<String, String>,
    pub locality: Option<Locality>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Locality {
    pub region: String,
    pub zone: String,
    pub sub_zone: String,
}

/// A pure, total function mapping a node descriptor to an opaque node key.
/// Supplied by the embedder at cache construction. Must be deterministic
/// and collision-free within a deployment; the cache does not detect
/// collisions.
pub trait NodeHash: Send + Sync + fmt::Debug {
    fn id(&self, node: &Node) -> String;
}

/// Uses `node.id` verbatim as the cache key. This is the teacher's original
/// `hash_id` behavior and remains the right default when node ids are
/// already unique and non-sensitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdHash;

impl NodeHash for IdHash {
    fn id(&self, node: &Node) -> String {
        node.id.clone()
    }
}

/// Hashes `id` + `cluster` + sorted metadata pairs with SHA-256. Useful when
/// `id` alone is not a safe or stable cache key (e.g. it is reused across
/// logically distinct proxies, or carries information the embedder would
/// rather not retain as a live map key).
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256NodeHash;

impl NodeHash for Sha256NodeHash {
    fn id(&self, node: &Node) -> String {
        let mut hasher = Sha256::new();
        hasher.update(node.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(node.cluster.as_bytes());
        for (k, v) in &node.metadata {
            hasher.update([0u8]);
            hasher.update(k.as_bytes());
            hasher.update([1u8]);
            hasher.update(v.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_hash_uses_node_id_verbatim() {
        let node = Node { id: "proxy-1".into(), ..Default::default() };
        assert_eq!(IdHash.id(&node), "proxy-1");
    }

    #[test]
    fn id_hash_is_empty_for_default_node() {
        assert_eq!(IdHash.id(&Node::default()), "");
    }

    #[test]
    fn sha256_hash_is_deterministic() {
        let node = Node { id: "proxy-1".into(), cluster: "edge".into(), ..Default::default() };
        assert_eq!(Sha256NodeHash.id(&node), Sha256NodeHash.id(&node));
    }

    #[test]
    fn sha256_hash_distinguishes_metadata() {
        let mut a = Node { id: "proxy-1".into(), ..Default::default() };
        let mut b = a.clone();
        a.metadata.insert("az".into(), "us-east-1a".into());
        b.metadata.insert("az".into(), "us-east-1b".into());
        assert_ne!(Sha256NodeHash.id(&a), Sha256NodeHash.id(&b));
    }

    #[test]
    fn sha256_hash_distinguishes_key_value_boundary() {
        // Without the 1u8 separator between key and value, {"x": "yz"} and
        // {"xy": "z"} would hash identically.
        let mut a = Node::default();
        a.metadata.insert("x".into(), "yz".into());
        let mut b = Node::default();
        b.metadata.insert("xy".into(), "z".into());
        assert_ne!(Sha256NodeHash.id(&a), Sha256NodeHash.id(&b));
    }
}
