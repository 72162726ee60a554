mod support;

use gateway::dispatcher::{CrawlDispatcher, CrawlError};
use gateway::queue::CrawlQueue;
use gateway::registry::NodeRegistry;
use gateway::run_dispatch_loop;
use search_core::CrawlJob;
use std::sync::Arc;
use std::time::Duration;
use support::{node, MockClient};

fn dispatcher(client: MockClient, registry: NodeRegistry, queue: CrawlQueue) -> (CrawlDispatcher<MockClient>, Arc<MockClient>, Arc<CrawlQueue>) {
    let client = Arc::new(client);
    let queue = Arc::new(queue);
    let d = CrawlDispatcher::new(Arc::clone(&queue), Arc::new(registry), Arc::clone(&client));
    (d, client, queue)
}

#[tokio::test]
async fn stops_at_the_first_accepting_node() {
    let (d, client, _) = dispatcher(MockClient::new().accepting("b"), NodeRegistry::in_memory(), CrawlQueue::in_memory());
    let candidates = vec![node("a", 0), node("b", 1), node("c", 2)];

    let chosen = d.dispatch(&CrawlJob::new("https://example.com"), &candidates).await.unwrap();
    assert_eq!(chosen.id, "b");
    assert_eq!(client.calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn exhausting_every_node_reports_the_last_failure() {
    let (d, client, _) = dispatcher(MockClient::new(), NodeRegistry::in_memory(), CrawlQueue::in_memory());
    let candidates = vec![node("a", 0), node("b", 1), node("c", 2)];

    let err = d.dispatch(&CrawlJob::new("https://example.com"), &candidates).await.unwrap_err();
    match err {
        CrawlError::Exhausted { job, source } => {
            assert_eq!(job.url, "https://example.com");
            assert!(source.to_string().contains("node c"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.calls(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn empty_queue_is_no_jobs() {
    let registry = NodeRegistry::in_memory();
    registry.create_or_update(node("a", 0)).unwrap();
    let (d, client, _) = dispatcher(MockClient::new().accepting("a"), registry, CrawlQueue::in_memory());
    assert!(matches!(d.crawl().await, Err(CrawlError::NoJobs)));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn crawl_pops_and_dispatches_one_job() {
    let registry = NodeRegistry::in_memory();
    registry.create_or_update(node("a", 0)).unwrap();
    let queue = CrawlQueue::in_memory();
    queue.push(CrawlJob::new("https://one.example")).unwrap();
    queue.push(CrawlJob::new("https://two.example")).unwrap();
    let (d, client, queue) = dispatcher(MockClient::new().accepting("a"), registry, queue);

    assert_eq!(d.crawl().await.unwrap().id, "a");
    assert_eq!(queue.len(), 1);
    assert_eq!(client.calls(), vec!["a"]);
}

#[tokio::test]
async fn queue_is_held_while_no_node_is_registered() {
    let dir = tempfile::tempdir().unwrap();
    let queue = CrawlQueue::open(dir.path().join("queue.bin")).unwrap();
    queue.push(CrawlJob::new("https://one.example")).unwrap();
    let (d, client, queue) = dispatcher(MockClient::new(), NodeRegistry::in_memory(), queue);

    assert!(matches!(d.crawl().await, Err(CrawlError::NoNodes)));
    assert!(matches!(d.crawl_and_requeue().await, Err(CrawlError::NoNodes)));
    assert_eq!(queue.len(), 1);
    assert!(client.calls().is_empty());

    let reopened = CrawlQueue::open(dir.path().join("queue.bin")).unwrap();
    assert_eq!(reopened.pop().unwrap().url, "https://one.example");
}

#[tokio::test]
async fn refused_jobs_go_back_on_the_queue() {
    let registry = NodeRegistry::in_memory();
    registry.create_or_update(node("a", 0)).unwrap();
    registry.create_or_update(node("b", 1)).unwrap();
    let queue = CrawlQueue::in_memory();
    queue.push(CrawlJob::new("https://first.example")).unwrap();
    queue.push(CrawlJob::new("https://second.example")).unwrap();
    let (d, client, queue) = dispatcher(MockClient::new(), registry, queue);

    match d.crawl_and_requeue().await {
        Err(CrawlError::Exhausted { job, .. }) => assert_eq!(job.url, "https://first.example"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(client.calls().len(), 2);
    assert_eq!(queue.len(), 2);

    // The retried job moves to the tail, stamped with its last attempt.
    assert_eq!(queue.pop().unwrap().url, "https://second.example");
    let retried = queue.pop().unwrap();
    assert_eq!(retried.url, "https://first.example");
    let tried_at = retried.last_tried_at.expect("last_tried_at set on requeue");
    assert!(tried_at >= retried.requested_at);
}

#[tokio::test]
async fn dispatch_loop_keeps_jobs_until_a_node_registers() {
    let queue = CrawlQueue::in_memory();
    for i in 0..3 {
        queue.push(CrawlJob::new(format!("https://site{i}.example"))).unwrap();
    }
    let (d, _, queue) = dispatcher(MockClient::new(), NodeRegistry::in_memory(), queue);

    let ticking = run_dispatch_loop(Arc::new(d), Duration::from_millis(10));
    assert!(tokio::time::timeout(Duration::from_millis(200), ticking).await.is_err());
    assert_eq!(queue.len(), 3);
}
