#![allow(dead_code)]

use anyhow::{anyhow, Result};
use gateway::client::NodeClient;
use parking_lot::Mutex;
use search_core::{Node, SearchResult, ShardId};
use std::collections::HashMap;
use time::OffsetDateTime;

pub fn node(id: &str, shard_id: ShardId) -> Node {
    Node {
        id: id.into(),
        shard_id,
        hostname: format!("{id}.internal"),
        port: 9000,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn hit(id: &str, score: f64) -> SearchResult {
    SearchResult { id: id.into(), score, page: None }
}

/// Scripted node behaviour: nodes without a script fail every call.
#[derive(Default)]
pub struct MockClient {
    search_replies: HashMap<String, Vec<SearchResult>>,
    accepts_crawl: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(mut self, node_id: &str, results: Vec<SearchResult>) -> Self {
        self.search_replies.insert(node_id.to_string(), results);
        self
    }

    pub fn accepting(mut self, node_id: &str) -> Self {
        self.accepts_crawl.push(node_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl NodeClient for MockClient {
    async fn search(&self, node: &Node, _term: &str) -> Result<Vec<SearchResult>> {
        self.calls.lock().push(node.id.clone());
        self.search_replies
            .get(&node.id)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {}", node.id))
    }

    async fn crawl(&self, node: &Node, _url: &str) -> Result<()> {
        self.calls.lock().push(node.id.clone());
        if self.accepts_crawl.contains(&node.id) {
            Ok(())
        } else {
            Err(anyhow!("node {} answered 500", node.id))
        }
    }
}
