pub mod fetch;
pub mod pages;

use anyhow::{anyhow, Result};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use url::Url;
use search_core::{CrawlRequest, Index, IndexStore, MatchMode, Node, SearchResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use fetch::Fetcher;
use pages::{valid_page_id, PageStore};

/// Upper bound for `POST /pages` bodies.
pub const MAX_PAGE_UPLOAD_BYTES: usize = 10_000_000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct StorePageRequest {
    pub page_id: String,
    pub html: String,
}

#[derive(Serialize, Deserialize)]
pub struct GetPageResponse {
    pub html: String,
}

/// Body of `GET /stats`.
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeStats {
    pub total_pages: usize,
    pub total_keywords: usize,
    /// Size in bytes of the `GET /dump/page` export.
    pub size_of_pages: usize,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (status, Json(json!({ "error": msg.to_string() })))
}

#[derive(Clone)]
pub struct NodeState {
    pub index: Arc<RwLock<Index>>,
    pub store: Arc<dyn IndexStore>,
    pub match_mode: MatchMode,
    pub fetcher: Fetcher,
    pub pages: PageStore,
}

impl NodeState {
    /// Build the node state, starting from whatever `store` last persisted.
    pub fn load(store: Arc<dyn IndexStore>, match_mode: MatchMode, fetcher: Fetcher, pages: PageStore) -> Result<Self> {
        let index = match store.load()? {
            Some(index) => {
                tracing::info!(pages = index.len(), tokens = index.token_count(), "index loaded");
                index
            }
            None => {
                tracing::info!("no persisted index, starting empty");
                Index::new()
            }
        };
        Ok(Self { index: Arc::new(RwLock::new(index)), store, match_mode, fetcher, pages })
    }

    /// Persist the current index off the async runtime.
    pub async fn save(&self) -> Result<()> {
        let index = self.index.clone();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(&index.read())).await?
    }
}

pub fn build_app(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/crawl", post(crawl_handler))
        .route("/pages", post(store_page_handler))
        .route("/pages/:page_id", get(get_page_handler))
        .route("/stats", get(stats_handler))
        .route("/dump/page", get(dump_pages_handler))
        .route("/dump/keyword", get(dump_keywords_handler))
        .layer(DefaultBodyLimit::max(MAX_PAGE_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn search_handler(
    State(state): State<NodeState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = params.q.unwrap_or_default();
    if q.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing query"));
    }
    let results = state.index.read().search(&q, state.match_mode);
    tracing::debug!(query = %q, hits = results.len(), "search served");
    Ok(Json(SearchResponse { results }))
}

/// Parse an absolute, hierarchical URL such as `https://host/path`.
pub fn parse_absolute_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(anyhow!("{raw} is not an absolute url"));
    }
    Ok(url)
}

pub async fn crawl_handler(
    State(state): State<NodeState>,
    Json(req): Json<CrawlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let url = parse_absolute_url(&req.url).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let page = state.fetcher.fetch(&url).await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "fetch failed");
        api_error(StatusCode::BAD_GATEWAY, e)
    })?;
    let page_id = page.id.clone();

    if let Err(e) = state.pages.put(&page_id, &page.content).await {
        tracing::warn!(page_id = %page_id, error = %e, "storing page body failed");
    }

    let unchanged = state.index.read().page(&page_id).is_some_and(|p| p.content == page.content);
    if unchanged {
        tracing::debug!(page_id = %page_id, "content unchanged, skipping reindex");
    } else {
        state.index.write().add_page(page);
        state.save().await.map_err(|e| {
            tracing::error!(error = %e, "saving index failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;
    }

    tracing::info!(page_id = %page_id, url = %url, "page crawled");
    Ok(Json(json!({ "message": "success", "page_id": page_id })))
}

pub async fn get_page_handler(
    State(state): State<NodeState>,
    Path(page_id): Path<String>,
) -> Result<Json<GetPageResponse>, ApiError> {
    if !valid_page_id(&page_id) {
        return Err(api_error(StatusCode::NOT_FOUND, "invalid page id"));
    }
    match state.pages.get(&page_id).await {
        Ok(Some(html)) => Ok(Json(GetPageResponse { html })),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "page not found")),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

pub async fn store_page_handler(
    State(state): State<NodeState>,
    Json(req): Json<StorePageRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !valid_page_id(&req.page_id) {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid page id"));
    }
    state.pages.put(&req.page_id, &req.html).await.map_err(|e| {
        tracing::error!(page_id = %req.page_id, error = %e, "storing page failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to store page")
    })?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

pub async fn stats_handler(State(state): State<NodeState>) -> Result<Json<NodeStats>, ApiError> {
    let index = state.index.read();
    let pages = serde_json::to_vec(&index.forward).map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(Json(NodeStats {
        total_pages: index.len(),
        total_keywords: index.token_count(),
        size_of_pages: pages.len(),
    }))
}

fn json_export<T: Serialize>(value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).map_err(|e| {
        tracing::error!(error = %e, "index export failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Forward index as JSON, keyed by page id.
pub async fn dump_pages_handler(State(state): State<NodeState>) -> Result<Response, ApiError> {
    let index = state.index.read();
    json_export(&index.forward)
}

/// Inverted index as JSON, keyed by token.
pub async fn dump_keywords_handler(State(state): State<NodeState>) -> Result<Response, ApiError> {
    let index = state.index.read();
    json_export(&index.inverted)
}

/// Announce this node to a gateway's registry.
pub async fn register_with_gateway(gateway: &str, node: &Node) -> Result<()> {
    let endpoint = format!("{}/nodes", gateway.trim_end_matches('/'));
    let resp = reqwest::Client::new().post(&endpoint).json(node).send().await?;
    if !resp.status().is_success() {
        return Err(anyhow!("gateway answered {}", resp.status()));
    }
    tracing::info!(gateway, node_id = %node.id, shard_id = node.shard_id, "registered with gateway");
    Ok(())
}
