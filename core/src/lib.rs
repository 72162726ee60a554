pub mod index;
pub mod persist;
pub mod shard;
pub mod store;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use time::OffsetDateTime;

pub use index::{ForwardIndex, Index, InvertedIndex, MatchMode, Posting};
pub use shard::{shard_id, DEFAULT_NUM_SHARDS};
pub use store::{open_store, FileStore, IndexStore, MemoryStore, SledStore, StoreKind};

pub type PageId = String;
pub type ShardId = u32;

/// Page ids are the SHA-1 hex digest of the page URL.
pub fn page_id(url: &str) -> PageId {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A crawled page as produced by the fetch/parse pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub url: String,
    pub title: String,
    /// Raw page content; may be HTML or plain text.
    pub content: String,
    #[serde(default)]
    pub meta_description: String,
}

/// The part of a page that travels with search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub id: PageId,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub meta_description: String,
}

impl From<&Page> for PageMeta {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            url: page.url.clone(),
            title: page.title.clone(),
            meta_description: page.meta_description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: PageId,
    pub score: f64,
    /// `None` when the page is no longer in the forward index.
    pub page: Option<PageMeta>,
}

/// Body of a node's `GET /search` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Body of a node's `POST /crawl` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
}

/// A worker process hosting one shard's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub shard_id: ShardId,
    pub hostname: String,
    pub port: u16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Node {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.hostname, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    /// Set when a dispatch pass found no node willing to take the job.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_tried_at: Option<OffsetDateTime>,
}

impl CrawlJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), requested_at: OffsetDateTime::now_utc(), last_tried_at: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_id_is_sha1_hex() {
        assert_eq!(page_id("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(page_id("https://example.com").len(), 40);
    }

    #[test]
    fn search_result_wire_format() {
        let result = SearchResult { id: "p1".into(), score: 0.5, page: None };
        let json = serde_json::to_value(SearchResponse { results: vec![result] }).unwrap();
        assert_eq!(json, serde_json::json!({"results": [{"id": "p1", "score": 0.5, "page": null}]}));
    }

    #[test]
    fn node_round_trips_through_json() {
        let node = Node {
            id: "n1".into(),
            shard_id: 3,
            hostname: "localhost".into(),
            port: 8081,
            created_at: OffsetDateTime::now_utc(),
        };
        let back: Node = serde_json::from_str(&serde_json::to_string(&node).unwrap()).unwrap();
        assert_eq!(back, node);
        assert_eq!(node.base_url(), "http://localhost:8081");
    }
}
