use super::IndexStore;
use crate::Index;
use anyhow::Result;
use parking_lot::Mutex;

/// Keeps the last saved index for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    index: Mutex<Option<Index>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStore for MemoryStore {
    fn save(&self, index: &Index) -> Result<()> {
        *self.index.lock() = Some(index.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Index>> {
        Ok(self.index.lock().clone())
    }
}
