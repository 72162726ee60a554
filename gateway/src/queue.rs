use parking_lot::Mutex;
use search_core::persist::{read_snapshot, write_snapshot};
use search_core::CrawlJob;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Nothing queued; retry later.
    #[error("no jobs in queue")]
    Empty,
    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// FIFO of pending crawl jobs. When file-backed, the whole queue is rewritten
/// after every push and pop.
pub struct CrawlQueue {
    path: Option<PathBuf>,
    jobs: Mutex<VecDeque<CrawlJob>>,
}

impl CrawlQueue {
    pub fn in_memory() -> Self {
        Self { path: None, jobs: Mutex::new(VecDeque::new()) }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QueueError> {
        let queue = Self { path: Some(path.as_ref().to_path_buf()), jobs: Mutex::new(VecDeque::new()) };
        queue.load()?;
        Ok(queue)
    }

    /// Replace the in-memory queue with the persisted one. A queue that was
    /// never written loads as empty.
    pub fn load(&self) -> Result<(), QueueError> {
        if let Some(path) = &self.path {
            let jobs: VecDeque<CrawlJob> = read_snapshot(path)?.unwrap_or_default();
            *self.jobs.lock() = jobs;
        }
        Ok(())
    }

    fn persist(&self, jobs: &VecDeque<CrawlJob>) -> Result<(), QueueError> {
        if let Some(path) = &self.path {
            write_snapshot(path, jobs)?;
        }
        Ok(())
    }

    pub fn push(&self, job: CrawlJob) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock();
        jobs.push_back(job);
        self.persist(&jobs)
    }

    pub fn pop(&self) -> Result<CrawlJob, QueueError> {
        let mut jobs = self.jobs.lock();
        let job = jobs.pop_front().ok_or(QueueError::Empty)?;
        self.persist(&jobs)?;
        Ok(job)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
