use anyhow::Result;
use clap::{Parser, Subcommand};
use search_core::{open_store, page_id, shard_id, Page, ShardId, StoreKind, DEFAULT_NUM_SHARDS};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputPage {
    #[serde(default)]
    id: Option<String>,
    url: String,
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    meta_description: String,
}

impl From<InputPage> for Page {
    fn from(p: InputPage) -> Self {
        Page {
            id: p.id.unwrap_or_else(|| page_id(&p.url)),
            url: p.url,
            title: p.title,
            content: p.content,
            meta_description: p.meta_description,
        }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load page dumps into a shard node's index store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add pages from JSON/JSONL files (or a directory of them) to an index
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Index store backend: memory, file or sled
        #[arg(long, default_value = "file")]
        store: StoreKind,
        /// Snapshot file (file store) or database directory (sled store)
        #[arg(long)]
        output: PathBuf,
        /// Only keep pages whose URL maps to this shard
        #[arg(long)]
        shard: Option<ShardId>,
        /// Shard count used with --shard
        #[arg(long, default_value_t = DEFAULT_NUM_SHARDS)]
        num_shards: NonZeroU32,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, store, output, shard, num_shards } => {
            build_index(&input, store, &output, shard.map(|s| (s, num_shards)))
        }
    }
}

fn build_index(input: &Path, kind: StoreKind, output: &Path, shard: Option<(ShardId, NonZeroU32)>) -> Result<()> {
    if kind == StoreKind::Memory {
        tracing::warn!("memory store selected; the index is discarded when the indexer exits");
    }
    let store = open_store(kind, output)?;
    let mut index = store.load()?.unwrap_or_default();
    let before = index.len();

    let mut added = 0usize;
    let mut skipped = 0usize;
    for file in input_files(input) {
        for page in read_pages(&file)? {
            if let Some((wanted, n)) = shard {
                if shard_id(&page.url, n) != wanted {
                    skipped += 1;
                    continue;
                }
            }
            index.add_page(page);
            added += 1;
        }
    }

    store.save(&index)?;
    tracing::info!(
        added,
        skipped,
        pages_before = before,
        pages = index.len(),
        tokens = index.token_count(),
        output = %output.display(),
        "index build complete"
    );
    Ok(())
}

fn input_files(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    files.sort();
    files
}

fn read_pages(file: &Path) -> Result<Vec<Page>> {
    let reader = BufReader::new(File::open(file)?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut pages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let page: InputPage = serde_json::from_str(&line)?;
            pages.push(page.into());
        }
        return Ok(pages);
    }
    match serde_json::from_reader(reader)? {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| Ok(serde_json::from_value::<InputPage>(v)?.into()))
            .collect(),
        v @ serde_json::Value::Object(_) => Ok(vec![serde_json::from_value::<InputPage>(v)?.into()]),
        _ => Ok(Vec::new()),
    }
}
