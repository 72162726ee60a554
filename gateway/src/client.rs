use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use search_core::{CrawlRequest, Node, SearchResponse, SearchResult};
use std::future::Future;
use std::time::Duration;

/// The two remote calls the gateway makes against shard nodes.
pub trait NodeClient: Send + Sync + 'static {
    /// `GET /search?q=`; any transport or decode failure is an error.
    fn search(&self, node: &Node, term: &str) -> impl Future<Output = Result<Vec<SearchResult>>> + Send;

    /// `POST /crawl`; only an HTTP 200 counts as accepted.
    fn crawl(&self, node: &Node, url: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone, Default)]
pub struct HttpNodeClient {
    client: Client,
}

impl HttpNodeClient {
    /// `timeout` of `None` leaves remote calls unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self { client: builder.build()? })
    }
}

impl NodeClient for HttpNodeClient {
    async fn search(&self, node: &Node, term: &str) -> Result<Vec<SearchResult>> {
        let resp = self
            .client
            .get(format!("{}/search", node.base_url()))
            .query(&[("q", term)])
            .send()
            .await?
            .error_for_status()?;
        let body: SearchResponse = resp.json().await?;
        Ok(body.results)
    }

    async fn crawl(&self, node: &Node, url: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/crawl", node.base_url()))
            .json(&CrawlRequest { url: url.to_string() })
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(anyhow!("node {} answered {}: {}", node.id, status, body.trim()))
            }
        }
    }
}
