use anyhow::Result;
use clap::Parser;
use search_core::{open_store, MatchMode, Node, ShardId, StoreKind};
use search_node::fetch::Fetcher;
use search_node::pages::PageStore;
use search_node::{build_app, register_with_gateway, NodeState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "search-node")]
#[command(about = "Shard node: hosts one shard's index and crawls on request")]
struct Args {
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "NODE_PORT", default_value_t = 8081)]
    port: u16,
    /// Node id; a random UUID when omitted
    #[arg(long, env = "NODE_ID")]
    node_id: Option<String>,
    /// Shard this node serves
    #[arg(long, env = "NODE_SHARD", default_value_t = 0)]
    shard: ShardId,
    /// Hostname other services should use to reach this node
    #[arg(long, default_value = "localhost")]
    advertise_host: String,
    /// Index store backend: memory, file or sled
    #[arg(long, env = "NODE_STORE", default_value = "file")]
    store: StoreKind,
    /// Directory for the index snapshot and stored page bodies
    #[arg(long, env = "NODE_DATA_DIR", default_value = "./data/node")]
    data_dir: PathBuf,
    /// Term matching: exact, substring, fallback or fallback:<min results>
    #[arg(long, default_value = "fallback:10")]
    match_mode: MatchMode,
    /// Gateway base URL to register with, e.g. http://localhost:8080
    #[arg(long, env = "GATEWAY_URL")]
    gateway: Option<String>,
    /// Page fetch timeout in seconds
    #[arg(long, default_value_t = 12)]
    fetch_timeout_secs: u64,
    /// User-Agent for page fetches
    #[arg(long, default_value = "search-node-bot/0.1")]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let store_path = match args.store {
        StoreKind::Sled => args.data_dir.join("index.sled"),
        _ => args.data_dir.join("index.bin"),
    };
    let store = open_store(args.store, &store_path)?;
    let fetcher = Fetcher::new(&args.user_agent, Duration::from_secs(args.fetch_timeout_secs))?;
    let pages = PageStore::new(args.data_dir.join("pages"));
    let state = NodeState::load(Arc::clone(&store), args.match_mode, fetcher, pages)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, shard = args.shard, match_mode = %args.match_mode, "node listening");

    if let Some(gateway) = &args.gateway {
        let node = Node {
            id: args.node_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            shard_id: args.shard,
            hostname: args.advertise_host.clone(),
            port: args.port,
            created_at: OffsetDateTime::now_utc(),
        };
        if let Err(e) = register_with_gateway(gateway, &node).await {
            tracing::warn!(error = %e, "gateway registration failed; serving anyway");
        }
    }

    axum::serve(listener, build_app(state)).await?;
    Ok(())
}
