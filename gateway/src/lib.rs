pub mod client;
pub mod dispatcher;
pub mod orchestrator;
pub mod queue;
pub mod registry;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use search_core::{shard_id, CrawlJob, Node, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

use client::NodeClient;
use dispatcher::{CrawlDispatcher, CrawlError};
use orchestrator::SearchOrchestrator;
use queue::CrawlQueue;
use registry::{NodeRegistry, RegistryError};

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct CrawlParams {
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (status, Json(json!({ "error": msg.to_string() })))
}

fn crawl_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (status, Json(json!({ "success": false, "error": msg.to_string() })))
}

pub struct GatewayState<C> {
    pub registry: Arc<NodeRegistry>,
    pub queue: Arc<CrawlQueue>,
    pub orchestrator: Arc<SearchOrchestrator<C>>,
    pub dispatcher: Arc<CrawlDispatcher<C>>,
    pub num_shards: NonZeroU32,
}

impl<C> Clone for GatewayState<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            queue: Arc::clone(&self.queue),
            orchestrator: Arc::clone(&self.orchestrator),
            dispatcher: Arc::clone(&self.dispatcher),
            num_shards: self.num_shards,
        }
    }
}

impl<C: NodeClient> GatewayState<C> {
    pub fn new(registry: Arc<NodeRegistry>, queue: Arc<CrawlQueue>, client: Arc<C>, num_shards: NonZeroU32) -> Self {
        Self {
            orchestrator: Arc::new(SearchOrchestrator::new(Arc::clone(&registry), Arc::clone(&client))),
            dispatcher: Arc::new(CrawlDispatcher::new(Arc::clone(&queue), Arc::clone(&registry), client)),
            registry,
            queue,
            num_shards,
        }
    }
}

/// CORS from `CORS_ALLOW_ORIGIN` (comma-separated), any origin otherwise.
fn cors_layer() -> CorsLayer {
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app<C: NodeClient>(state: GatewayState<C>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler::<C>))
        .route("/crawl", get(crawl_handler::<C>).post(crawl_handler::<C>))
        .route("/nodes", get(list_nodes::<C>).post(upsert_node::<C>))
        .route("/nodes/:id", get(get_node::<C>).delete(delete_node::<C>))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn search_handler<C: NodeClient>(
    State(state): State<GatewayState<C>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    if params.q.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing query"));
    }
    match state.orchestrator.search(&params.q).await {
        Ok(results) => Ok(Json(SearchResults { results })),
        Err(e) => {
            tracing::error!(query = %params.q, error = %e, "search failed");
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e))
        }
    }
}

/// Validate an absolute URL, queue it for crawling and report its shard.
///
/// The reported `shard_id` is informational: the dispatcher hands the job to
/// whichever node accepts it first, whatever shard that node serves.
pub async fn crawl_handler<C: NodeClient>(
    State(state): State<GatewayState<C>>,
    Query(params): Query<CrawlParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let raw = params.url.unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(crawl_error(StatusCode::BAD_REQUEST, "url is required"));
    }
    let url = match Url::parse(raw.trim()) {
        Ok(u) if !u.cannot_be_a_base() && u.host_str().is_some() => u,
        _ => return Err(crawl_error(StatusCode::BAD_REQUEST, "url is invalid")),
    };

    let shard = shard_id(url.as_str(), state.num_shards);
    state.queue.push(CrawlJob::new(url.as_str())).map_err(|e| {
        tracing::error!(url = %url, error = %e, "enqueue failed");
        crawl_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;
    tracing::info!(url = %url, shard_id = shard, queued = state.queue.len(), "crawl job queued");
    Ok(Json(json!({ "success": true, "shard_id": shard })))
}

pub async fn list_nodes<C: NodeClient>(State(state): State<GatewayState<C>>) -> Json<Vec<Node>> {
    Json(state.registry.get_all())
}

pub async fn upsert_node<C: NodeClient>(
    State(state): State<GatewayState<C>>,
    Json(node): Json<Node>,
) -> Result<Json<Node>, ApiError> {
    if node.id.trim().is_empty() || node.hostname.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "node id and hostname are required"));
    }
    state
        .registry
        .create_or_update(node.clone())
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    tracing::info!(node_id = %node.id, shard_id = node.shard_id, host = %node.hostname, port = node.port, "node registered");
    Ok(Json(node))
}

fn registry_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::NotFound(_) | RegistryError::Empty => api_error(StatusCode::NOT_FOUND, e),
        RegistryError::Persist(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub async fn get_node<C: NodeClient>(
    State(state): State<GatewayState<C>>,
    Path(id): Path<String>,
) -> Result<Json<Node>, ApiError> {
    state.registry.get(&id).map(Json).map_err(registry_error)
}

pub async fn delete_node<C: NodeClient>(
    State(state): State<GatewayState<C>>,
    Path(id): Path<String>,
) -> Result<Json<Node>, ApiError> {
    state.registry.delete(&id).map(Json).map_err(registry_error)
}

/// Drive the dispatcher forever, one job per tick. Jobs no node accepted go
/// back on the queue.
pub async fn run_dispatch_loop<C: NodeClient>(dispatcher: Arc<CrawlDispatcher<C>>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match dispatcher.crawl_and_requeue().await {
            Ok(node) => tracing::debug!(node_id = %node.id, "dispatched crawl job"),
            Err(CrawlError::NoJobs) => tracing::debug!("crawl queue empty"),
            Err(CrawlError::NoNodes) => tracing::debug!("no nodes registered, crawl queue held"),
            Err(e) => tracing::warn!(error = %e, "crawl dispatch failed"),
        }
    }
}
