use crate::client::NodeClient;
use crate::queue::{CrawlQueue, QueueError};
use crate::registry::NodeRegistry;
use search_core::{CrawlJob, Node};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The queue is empty; a normal condition for the scheduler to retry on.
    #[error("no jobs in queue")]
    NoJobs,
    #[error("no nodes registered")]
    NoNodes,
    /// Every candidate refused or failed; carries the job and the last failure.
    #[error("could not crawl {}: {source}", .job.url)]
    Exhausted {
        job: CrawlJob,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Queue(QueueError),
}

impl From<QueueError> for CrawlError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Empty => CrawlError::NoJobs,
            other => CrawlError::Queue(other),
        }
    }
}

/// Hands queued URLs to worker nodes, one job per call.
pub struct CrawlDispatcher<C> {
    queue: Arc<CrawlQueue>,
    registry: Arc<NodeRegistry>,
    client: Arc<C>,
}

impl<C: NodeClient> CrawlDispatcher<C> {
    pub fn new(queue: Arc<CrawlQueue>, registry: Arc<NodeRegistry>, client: Arc<C>) -> Self {
        Self { queue, registry, client }
    }

    /// Pop one job and push it to a randomly ordered list of nodes. The queue is
    /// left untouched while no node is registered. A job whose dispatch fails is
    /// handed back inside [`CrawlError::Exhausted`]; see [`Self::crawl_and_requeue`].
    pub async fn crawl(&self) -> Result<Node, CrawlError> {
        self.queue.load()?;
        if self.registry.is_empty() {
            return Err(CrawlError::NoNodes);
        }
        let job = self.queue.pop()?;
        let candidates = self.registry.randomize_all();
        self.dispatch(&job, &candidates).await
    }

    /// Offer `job` to each candidate in order, stopping at the first that
    /// accepts it.
    pub async fn dispatch(&self, job: &CrawlJob, candidates: &[Node]) -> Result<Node, CrawlError> {
        let mut last_error = None;
        for node in candidates {
            match self.client.crawl(node, &job.url).await {
                Ok(()) => {
                    tracing::info!(url = %job.url, node_id = %node.id, "crawl job accepted");
                    return Ok(node.clone());
                }
                Err(e) => {
                    tracing::warn!(url = %job.url, node_id = %node.id, error = %e, "node refused crawl job");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(source) => Err(CrawlError::Exhausted { job: job.clone(), source }),
            None => Err(CrawlError::NoNodes),
        }
    }

    /// One scheduler tick: [`Self::crawl`], putting an exhausted job back at the
    /// tail of the queue stamped with `last_tried_at`.
    pub async fn crawl_and_requeue(&self) -> Result<Node, CrawlError> {
        match self.crawl().await {
            Err(CrawlError::Exhausted { mut job, source }) => {
                job.last_tried_at = Some(OffsetDateTime::now_utc());
                self.queue.push(job.clone())?;
                tracing::info!(url = %job.url, queued = self.queue.len(), "crawl job re-queued");
                Err(CrawlError::Exhausted { job, source })
            }
            other => other,
        }
    }
}
