//! Object storage for source artifacts, addressed by bucket and key.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::StoreError;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Pass back to [`ObjectStore::list`] to get the next page.
    pub next: Option<String>,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Keys under `prefix` in lexicographic order, resuming after `after`.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        after: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    async fn copy(&self, from: &str, to: &str, key: &str) -> Result<(), StoreError> {
        let body = self.get(from, key).await?;
        self.put(to, key, body).await
    }

    /// Copy then delete.
    async fn rename(&self, from: &str, to: &str, key: &str) -> Result<(), StoreError> {
        self.copy(from, to, key).await?;
        self.delete(from, key).await
    }
}

pub const DEFAULT_PAGE_SIZE: usize = 1000;

fn page(mut keys: Vec<String>, prefix: &str, after: Option<&str>, size: usize) -> ListPage {
    keys.retain(|k| k.starts_with(prefix) && after.is_none_or(|a| k.as_str() > a));
    keys.sort();
    let next = if keys.len() > size {
        keys.truncate(size);
        keys.last().cloned()
    } else {
        None
    };
    ListPage { keys, next }
}

fn not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::ObjectNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

// ── In memory ──

#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            objects: Mutex::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .is_ok_and(|o| o.contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>>, StoreError> {
        self.objects
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.lock()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.lock()?
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.lock()?
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(bucket, key))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let keys = self
            .lock()?
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        Ok(page(keys, prefix, after, self.page_size))
    }
}

// ── Filesystem ──

/// Buckets are directories under `root`; keys may contain `/`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain || bucket.is_empty() || bucket.contains(['/', '\\']) {
            return Err(StoreError::InvalidKey(format!("{bucket}/{key}")));
        }
        Ok(self.root.join(bucket).join(relative))
    }

    fn map_missing(err: std::io::Error, bucket: &str, key: &str) -> StoreError {
        if err.kind() == std::io::ErrorKind::NotFound {
            not_found(bucket, key)
        } else {
            StoreError::Io(err)
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path(bucket, key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Self::map_missing(e, bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        debug!(bucket, key, "object written");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.path(bucket, key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::map_missing(e, bucket, key))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        after: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let base = self.root.join(bucket);
        let mut keys = Vec::new();
        let mut pending = vec![base.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&base) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }
        Ok(page(keys, prefix, after, self.page_size))
    }
}
