use super::IndexStore;
use crate::persist::{read_snapshot, write_snapshot};
use crate::Index;
use anyhow::Result;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Full bincode snapshot of the index, rewritten on every save.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexStore for FileStore {
    fn save(&self, index: &Index) -> Result<()> {
        let _guard = self.write_lock.lock();
        write_snapshot(&self.path, index)?;
        tracing::debug!(path = %self.path.display(), pages = index.len(), "index snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<Option<Index>> {
        read_snapshot(&self.path)
    }
}
