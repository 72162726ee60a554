//! Whole-index persistence backends.
//!
//! The index engine never touches storage itself; a node owns one
//! `Arc<dyn IndexStore>` chosen by [`StoreKind`] and calls [`IndexStore::save`]
//! after mutating its [`Index`].

mod file;
mod kv;
mod memory;

pub use file::FileStore;
pub use kv::SledStore;
pub use memory::MemoryStore;

use crate::Index;
use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub trait IndexStore: Send + Sync {
    /// Persist the whole index, replacing whatever was stored before.
    fn save(&self, index: &Index) -> Result<()>;

    /// Load the last saved index; `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Index>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    File,
    Sled,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreKind::Memory),
            "file" | "disk" => Ok(StoreKind::File),
            "sled" | "kv" => Ok(StoreKind::Sled),
            _ => Err(format!("unknown store kind: {s} (expected memory, file or sled)")),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreKind::Memory => "memory",
            StoreKind::File => "file",
            StoreKind::Sled => "sled",
        };
        f.write_str(name)
    }
}

/// Open the configured backend. `path` is the snapshot file for `File`, the
/// database directory for `Sled`, and ignored for `Memory`.
pub fn open_store(kind: StoreKind, path: &Path) -> Result<Arc<dyn IndexStore>> {
    tracing::info!(%kind, path = %path.display(), "opening index store");
    Ok(match kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(FileStore::new(path)),
        StoreKind::Sled => Arc::new(SledStore::open(path)?),
    })
}
