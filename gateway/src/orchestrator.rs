//! Scatter-gather search across every shard.
//!
//! One task per shard walks that shard's (shuffled) replicas one at a time and
//! keeps the first decodable answer. Replicas of a shard are assumed to hold the
//! same index, so no other replica is consulted once one has answered. A shard
//! whose replicas all fail contributes nothing and the query still succeeds.
//! The merged list is not re-sorted across shards.

use crate::client::NodeClient;
use crate::registry::NodeRegistry;
use parking_lot::Mutex;
use search_core::SearchResult;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no nodes registered")]
    NoNodes,
}

pub struct SearchOrchestrator<C> {
    registry: Arc<NodeRegistry>,
    client: Arc<C>,
}

impl<C: NodeClient> SearchOrchestrator<C> {
    pub fn new(registry: Arc<NodeRegistry>, client: Arc<C>) -> Self {
        Self { registry, client }
    }

    pub async fn search(&self, term: &str) -> Result<Vec<SearchResult>, SearchError> {
        let shards = self.registry.all_by_shard();
        if shards.is_empty() {
            return Err(SearchError::NoNodes);
        }

        let results: Arc<Mutex<Vec<SearchResult>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();
        for (shard_id, nodes) in shards {
            let client = Arc::clone(&self.client);
            let results = Arc::clone(&results);
            let term = term.to_string();
            tasks.spawn(async move {
                for node in &nodes {
                    match client.search(node, &term).await {
                        Ok(found) => {
                            tracing::debug!(shard_id, node_id = %node.id, hits = found.len(), "shard answered");
                            results.lock().extend(found);
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(shard_id, node_id = %node.id, error = %e, "replica failed, trying next");
                        }
                    }
                }
                tracing::warn!(shard_id, replicas = nodes.len(), "every replica failed, shard skipped");
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "shard task aborted");
            }
        }

        let merged = std::mem::take(&mut *results.lock());
        tracing::info!(term, hits = merged.len(), "search merged");
        Ok(merged)
    }
}
