use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref PAGE_ID: Regex = Regex::new(r"^[0-9a-f]{40}$").expect("valid regex");
}

/// Only SHA-1 hex ids are accepted, which also keeps ids from escaping the
/// storage directory.
pub fn valid_page_id(id: &str) -> bool {
    PAGE_ID.is_match(id)
}

/// Raw HTML bodies on disk, one file per page id.
#[derive(Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub async fn put(&self, page_id: &str, html: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(page_id), html).await?;
        Ok(())
    }

    /// `Ok(None)` when no body is stored for `page_id`.
    pub async fn get(&self, page_id: &str) -> Result<Option<String>> {
        match tokio::fs::read(self.root.join(page_id)).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_ids_must_be_sha1_hex() {
        assert!(valid_page_id(&search_core::page_id("https://example.com")));
        assert!(!valid_page_id("../../etc/passwd"));
        assert!(!valid_page_id("ABCDEF0123456789ABCDEF0123456789ABCDEF01"));
        assert!(!valid_page_id(""));
    }

    #[tokio::test]
    async fn stores_and_reads_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path().join("pages"));
        let id = search_core::page_id("https://example.com");
        assert!(store.get(&id).await.unwrap().is_none());
        store.put(&id, "<p>hi</p>").await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().as_deref(), Some("<p>hi</p>"));
    }
}
