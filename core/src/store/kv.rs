use super::IndexStore;
use crate::{Index, Page, Posting};
use anyhow::{anyhow, Context, Result};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{IVec, Transactional, Tree};
use std::collections::HashSet;
use std::path::Path;

const PAGES: &str = "pages";
const POSTINGS: &str = "postings";
const HASHES: &str = "hashes";
const META: &str = "meta";
const SNAPSHOT_MARKER: &[u8] = b"snapshot";

/// Embedded transactional key-value backend.
///
/// Pages are stored one blob per page id and postings one list per token; a
/// save rewrites both trees in a single transaction. The `hashes` tree holds the
/// last seen content hash of each page for change detection and is never
/// touched by `save`/`load`.
pub struct SledStore {
    db: sled::Db,
    pages: Tree,
    postings: Tree,
    hashes: Tree,
    meta: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("opening sled db at {}", path.display()))?;
        Ok(Self {
            pages: db.open_tree(PAGES)?,
            postings: db.open_tree(POSTINGS)?,
            hashes: db.open_tree(HASHES)?,
            meta: db.open_tree(META)?,
            db,
        })
    }

    pub fn get_hash(&self, page_id: &str) -> Result<Option<String>> {
        match self.hashes.get(page_id.as_bytes())? {
            Some(v) => Ok(Some(String::from_utf8(v.to_vec())?)),
            None => Ok(None),
        }
    }

    pub fn update_hash(&self, page_id: &str, hash: &str) -> Result<()> {
        self.hashes.insert(page_id.as_bytes(), hash.as_bytes())?;
        self.hashes.flush()?;
        Ok(())
    }
}

fn stale_keys(tree: &Tree, keep: &HashSet<&[u8]>) -> Result<Vec<IVec>> {
    let mut stale = Vec::new();
    for key in tree.iter().keys() {
        let key = key?;
        if !keep.contains(key.as_ref()) {
            stale.push(key);
        }
    }
    Ok(stale)
}

impl IndexStore for SledStore {
    fn save(&self, index: &Index) -> Result<()> {
        let pages = index
            .forward
            .iter()
            .map(|(id, page)| Ok((id.as_bytes(), bincode::serialize(page)?)))
            .collect::<Result<Vec<_>>>()?;
        let postings = index
            .inverted
            .iter()
            .map(|(token, list)| Ok((token.as_bytes(), bincode::serialize(list)?)))
            .collect::<Result<Vec<_>>>()?;

        let stale_pages = stale_keys(&self.pages, &pages.iter().map(|(k, _)| *k).collect())?;
        let stale_postings = stale_keys(&self.postings, &postings.iter().map(|(k, _)| *k).collect())?;

        let outcome = (&self.pages, &self.postings, &self.meta).transaction(
            |(tx_pages, tx_postings, tx_meta)| -> ConflictableTransactionResult<(), ()> {
                for key in &stale_pages {
                    tx_pages.remove(key.clone())?;
                }
                for key in &stale_postings {
                    tx_postings.remove(key.clone())?;
                }
                for (key, value) in &pages {
                    tx_pages.insert(*key, value.as_slice())?;
                }
                for (key, value) in &postings {
                    tx_postings.insert(*key, value.as_slice())?;
                }
                tx_meta.insert(SNAPSHOT_MARKER, &[1u8][..])?;
                Ok(())
            },
        );
        match outcome {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => return Err(e.into()),
            Err(TransactionError::Abort(())) => return Err(anyhow!("index save transaction aborted")),
        }
        self.db.flush()?;
        tracing::debug!(pages = index.len(), tokens = index.token_count(), "index saved to sled");
        Ok(())
    }

    fn load(&self) -> Result<Option<Index>> {
        if !self.meta.contains_key(SNAPSHOT_MARKER)? {
            return Ok(None);
        }
        let mut index = Index::new();
        for entry in self.pages.iter() {
            let (key, value) = entry?;
            let page: Page = bincode::deserialize(&value)?;
            index.forward.insert(String::from_utf8(key.to_vec())?, page);
        }
        for entry in self.postings.iter() {
            let (key, value) = entry?;
            let list: Vec<Posting> = bincode::deserialize(&value)?;
            index.inverted.insert(String::from_utf8(key.to_vec())?, list);
        }
        Ok(Some(index))
    }
}
