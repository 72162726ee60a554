use parking_lot::RwLock;
use rand::seq::{IndexedRandom, SliceRandom};
use search_core::persist::{read_snapshot, write_snapshot};
use search_core::{Node, ShardId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("no nodes registered")]
    Empty,
    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// Live nodes keyed by id, optionally mirrored to a snapshot file that is
/// rewritten on every mutation.
pub struct NodeRegistry {
    path: Option<PathBuf>,
    nodes: RwLock<Vec<Node>>,
}

impl NodeRegistry {
    pub fn in_memory() -> Self {
        Self { path: None, nodes: RwLock::new(Vec::new()) }
    }

    /// Open a file-backed registry, loading any existing snapshot.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let nodes: Vec<Node> = read_snapshot(&path)?.unwrap_or_default();
        tracing::info!(path = %path.display(), nodes = nodes.len(), "node registry loaded");
        Ok(Self { path: Some(path), nodes: RwLock::new(nodes) })
    }

    fn persist(&self, nodes: &[Node]) -> Result<(), RegistryError> {
        if let Some(path) = &self.path {
            write_snapshot(path, nodes)?;
        }
        Ok(())
    }

    /// Insert or replace the node with `node.id`. The in-memory list only
    /// changes once the snapshot is written.
    pub fn create_or_update(&self, node: Node) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write();
        let mut next = nodes.clone();
        match next.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => next.push(node),
        }
        self.persist(&next)?;
        *nodes = next;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<Node, RegistryError> {
        let mut nodes = self.nodes.write();
        let pos = nodes.iter().position(|n| n.id == id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut next = nodes.clone();
        let removed = next.remove(pos);
        self.persist(&next)?;
        *nodes = next;
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<Node, RegistryError> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn get_all(&self) -> Vec<Node> {
        self.nodes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn get_random(&self) -> Result<Node, RegistryError> {
        self.nodes.read().choose(&mut rand::rng()).cloned().ok_or(RegistryError::Empty)
    }

    /// Every node, uniformly shuffled.
    pub fn randomize_all(&self) -> Vec<Node> {
        let mut all = self.get_all();
        all.shuffle(&mut rand::rng());
        all
    }

    /// Nodes grouped by shard. Grouping runs over a fresh shuffle, so the order
    /// inside each shard differs from call to call.
    pub fn all_by_shard(&self) -> BTreeMap<ShardId, Vec<Node>> {
        let mut shards: BTreeMap<ShardId, Vec<Node>> = BTreeMap::new();
        for node in self.randomize_all() {
            shards.entry(node.shard_id).or_default().push(node);
        }
        shards
    }
}
