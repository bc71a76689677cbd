use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::CachedResponse;
use crate::error::CacheResult;

/// Named buckets of cached responses, keyed by request URL.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it does not exist yet.
    async fn open(&self, bucket: &str) -> CacheResult<()>;

    /// All bucket names, sorted.
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Returns whether a bucket was actually removed.
    async fn delete(&self, bucket: &str) -> CacheResult<bool>;

    async fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>>;

    async fn put_all(&self, bucket: &str, entries: Vec<CachedResponse>) -> CacheResult<()>;
}

#[derive(Default)]
pub struct MemoryStorage {
    buckets: Mutex<BTreeMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, bucket: &str) -> CacheResult<()> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.keys().cloned().collect())
    }

    async fn delete(&self, bucket: &str) -> CacheResult<bool> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.remove(bucket).is_some())
    }

    async fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>> {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.get(bucket).and_then(|b| b.get(url)).cloned())
    }

    async fn put_all(&self, bucket: &str, entries: Vec<CachedResponse>) -> CacheResult<()> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let target = buckets.entry(bucket.to_string()).or_default();
        for entry in entries {
            target.insert(entry.url.clone(), entry);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
}

/// One directory per bucket under `root`; each entry is a JSON metadata
/// file plus a raw body file, both named after the SHA-256 of the URL.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<cache dir>/helena/buckets`, or a temp-dir fallback.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("helena")
            .join("buckets")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Scratch directories are dot-prefixed so they never show up as buckets.
    fn scratch_dir(&self, bucket: &str, suffix: &str) -> PathBuf {
        self.root.join(format!(".{}.{}", bucket, suffix))
    }

    fn entry_paths(&self, bucket: &str, url: &str) -> (PathBuf, PathBuf) {
        entry_files(&self.bucket_dir(bucket), url)
    }

    /// Fill `staging` with the live bucket's current files plus `entries`.
    async fn stage(
        &self,
        live: &Path,
        staging: &Path,
        entries: Vec<CachedResponse>,
    ) -> CacheResult<()> {
        match tokio::fs::read_dir(live).await {
            Ok(mut existing) => {
                while let Some(file) = existing.next_entry().await? {
                    tokio::fs::copy(file.path(), staging.join(file.file_name())).await?;
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        for entry in entries {
            let (meta_path, body_path) = entry_files(staging, &entry.url);
            // body first: a lookup only trusts entries whose metadata exists
            tokio::fs::write(&body_path, &entry.body).await?;
            let meta = EntryMeta {
                url: entry.url,
                status: entry.status,
                content_type: entry.content_type,
            };
            tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?).await?;
        }
        Ok(())
    }

    /// Replace the live bucket with the staged one.
    async fn swap_in(&self, bucket: &str, live: &Path, staging: &Path) -> CacheResult<()> {
        let retired = self.scratch_dir(bucket, "old");
        remove_dir_if_present(&retired).await?;

        let had_live = tokio::fs::try_exists(live).await?;
        if had_live {
            tokio::fs::rename(live, &retired).await?;
        }
        if let Err(e) = tokio::fs::rename(staging, live).await {
            if had_live {
                tokio::fs::rename(&retired, live).await?;
            }
            return Err(e.into());
        }
        if had_live {
            if let Err(e) = tokio::fs::remove_dir_all(&retired).await {
                log::warn!("Could not remove retired bucket {}: {}", retired.display(), e);
            }
        }
        Ok(())
    }
}

fn entry_files(dir: &Path, url: &str) -> (PathBuf, PathBuf) {
    let key = format!("{:x}", Sha256::digest(url.as_bytes()));
    (dir.join(format!("{}.json", key)), dir.join(format!("{}.body", key)))
}

async fn remove_dir_if_present(dir: &Path) -> CacheResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, bucket: &str) -> CacheResult<()> {
        tokio::fs::create_dir_all(self.bucket_dir(bucket)).await?;
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, bucket: &str) -> CacheResult<bool> {
        match tokio::fs::remove_dir_all(self.bucket_dir(bucket)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>> {
        let (meta_path, body_path) = self.entry_paths(bucket, url);

        let meta = match tokio::fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta)?;
        let body = tokio::fs::read(&body_path).await?;

        Ok(Some(CachedResponse {
            url: meta.url,
            status: meta.status,
            content_type: meta.content_type,
            body: Bytes::from(body),
        }))
    }

    /// Entries are written into a staging copy of the bucket that replaces
    /// the live one only once every write has succeeded.
    async fn put_all(&self, bucket: &str, entries: Vec<CachedResponse>) -> CacheResult<()> {
        let live = self.bucket_dir(bucket);
        let staging = self.scratch_dir(bucket, "staging");
        remove_dir_if_present(&staging).await?;
        tokio::fs::create_dir_all(&staging).await?;

        if let Err(e) = self.stage(&live, &staging, entries).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                log::warn!("Could not remove staging dir {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }
        self.swap_in(bucket, &live, &staging).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(url: &str, body: &'static [u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn disk_round_trips_entries() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());

        storage
            .put_all("helena-cache-v1", vec![entry("http://a.test/index.html", b"<html></html>")])
            .await
            .unwrap();

        let found = storage
            .lookup("helena-cache-v1", "http://a.test/index.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, entry("http://a.test/index.html", b"<html></html>"));

        assert!(storage
            .lookup("helena-cache-v1", "http://a.test/other.html")
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .lookup("helena-cache-v0", "http://a.test/index.html")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn disk_keys_and_delete() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().join("buckets"));

        assert!(storage.keys().await.unwrap().is_empty());

        storage.open("helena-cache-v1").await.unwrap();
        storage.open("helena-cache-v0").await.unwrap();
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["helena-cache-v0", "helena-cache-v1"]
        );

        assert!(storage.delete("helena-cache-v0").await.unwrap());
        assert!(!storage.delete("helena-cache-v0").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["helena-cache-v1"]);
    }

    #[tokio::test]
    async fn disk_put_merges_into_existing_bucket() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());

        storage
            .put_all("helena-cache-v1", vec![entry("http://a.test/a.js", b"one")])
            .await
            .unwrap();
        storage
            .put_all(
                "helena-cache-v1",
                vec![entry("http://a.test/a.js", b"two"), entry("http://a.test/b.js", b"b")],
            )
            .await
            .unwrap();

        let a = storage.lookup("helena-cache-v1", "http://a.test/a.js").await.unwrap().unwrap();
        let b = storage.lookup("helena-cache-v1", "http://a.test/b.js").await.unwrap().unwrap();
        assert_eq!(a.body, Bytes::from_static(b"two"));
        assert_eq!(b.body, Bytes::from_static(b"b"));

        // no staging or retired directories left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn failed_disk_write_leaves_bucket_untouched() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        storage
            .put_all("helena-cache-v1", vec![entry("http://a.test/index.html", b"old")])
            .await
            .unwrap();

        // a directory inside the bucket cannot be copied into the staging area
        std::fs::create_dir(dir.path().join("helena-cache-v1").join("stray.body")).unwrap();

        let result = storage
            .put_all("helena-cache-v1", vec![entry("http://a.test/index.html", b"new")])
            .await;
        assert!(result.is_err());

        let found = storage
            .lookup("helena-cache-v1", "http://a.test/index.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, Bytes::from_static(b"old"));
        assert_eq!(storage.keys().await.unwrap(), vec!["helena-cache-v1"]);
        assert!(!dir.path().join(".helena-cache-v1.staging").exists());
    }

    #[tokio::test]
    async fn memory_put_replaces_same_url() {
        let storage = MemoryStorage::new();
        storage.put_all("b", vec![entry("u", b"one")]).await.unwrap();
        storage.put_all("b", vec![entry("u", b"two")]).await.unwrap();
        let found = storage.lookup("b", "u").await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from_static(b"two"));
    }
}
