use anyhow::Result;
use clap::Parser;
use gateway::client::HttpNodeClient;
use gateway::queue::CrawlQueue;
use gateway::registry::NodeRegistry;
use gateway::{build_app, run_dispatch_loop, GatewayState};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "API gateway: scatter-gather search and crawl dispatch over shard nodes")]
struct Args {
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "GATEWAY_PORT", default_value_t = 8080)]
    port: u16,
    /// Directory for the node registry and crawl queue snapshots; in memory when omitted
    #[arg(long, env = "GATEWAY_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Number of shards the URL space is split into
    #[arg(long, env = "NUM_SHARDS", default_value_t = search_core::DEFAULT_NUM_SHARDS)]
    num_shards: NonZeroU32,
    /// Milliseconds between crawl dispatch attempts
    #[arg(long, default_value_t = 1000)]
    dispatch_interval_ms: u64,
    /// Per-request timeout for node calls; unbounded when omitted
    #[arg(long)]
    request_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let (registry, queue) = match &args.data_dir {
        Some(dir) => (NodeRegistry::open(dir.join("nodes.bin"))?, CrawlQueue::open(dir.join("queue.bin"))?),
        None => (NodeRegistry::in_memory(), CrawlQueue::in_memory()),
    };
    let client = HttpNodeClient::new(args.request_timeout_secs.map(Duration::from_secs))?;
    let state = GatewayState::new(Arc::new(registry), Arc::new(queue), Arc::new(client), args.num_shards);

    tokio::spawn(run_dispatch_loop(
        Arc::clone(&state.dispatcher),
        Duration::from_millis(args.dispatch_interval_ms.max(1)),
    ));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, num_shards = args.num_shards.get(), nodes = state.registry.len(), "gateway listening");
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}
