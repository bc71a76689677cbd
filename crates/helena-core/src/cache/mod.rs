//! Offline asset cache
//!
//! A precache-shell cache: a fixed manifest of application assets is stored
//! in one named bucket at install time, stale buckets are removed at
//! activation, and every fetch is answered from the bucket when possible.
//! Nothing is written back at fetch time. Requests to the AI backend's host
//! always go straight to the network.

mod fetcher;
mod storage;

pub use fetcher::{Fetcher, HttpFetcher};
pub use storage::{CacheStorage, DiskStorage, MemoryStorage};

use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

pub const CACHE_NAME: &str = "helena-cache-v1";
pub const EXCLUDED_HOST: &str = "googleapis.com";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";

pub fn default_manifest() -> Vec<String> {
    ["/", "index.html", "./app.js", "./manifest.json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Current bucket generation. Changing it invalidates every other
    /// bucket on the next activation.
    pub name: String,
    /// Manifest entries are resolved against this URL.
    pub base_url: String,
    pub manifest: Vec<String>,
    /// Substring of URLs that must never touch the cache.
    pub excluded_host: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            name: CACHE_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            manifest: default_manifest(),
            excluded_host: EXCLUDED_HOST.to_string(),
        }
    }
}

impl CacheSettings {
    pub fn is_excluded(&self, url: &str) -> bool {
        !self.excluded_host.is_empty() && url.contains(&self.excluded_host)
    }

    /// Manifest entries as absolute URLs, in manifest order.
    pub fn manifest_urls(&self) -> CacheResult<Vec<String>> {
        let base = Url::parse(&self.base_url)
            .map_err(|_| CacheError::InvalidUrl(self.base_url.clone()))?;
        self.manifest
            .iter()
            .map(|entry| {
                base.join(entry)
                    .map(|u| u.to_string())
                    .map_err(|_| CacheError::InvalidUrl(entry.clone()))
            })
            .collect()
    }
}

/// A stored (or freshly fetched) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub response: CachedResponse,
    pub source: FetchSource,
}

pub struct AssetCache<S, F> {
    settings: CacheSettings,
    storage: S,
    fetcher: F,
}

impl<S: CacheStorage, F: Fetcher> AssetCache<S, F> {
    pub fn new(settings: CacheSettings, storage: S, fetcher: F) -> Self {
        Self {
            settings,
            storage,
            fetcher,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetch the whole manifest and store it in the current bucket.
    ///
    /// All resources are downloaded before anything is written, so a failed
    /// install leaves the bucket untouched and the previous generation in
    /// charge.
    pub async fn install(&self) -> CacheResult<usize> {
        let urls = self.settings.manifest_urls()?;
        let mut entries = Vec::with_capacity(urls.len());

        for url in urls {
            let response = self
                .fetcher
                .fetch(&url)
                .await
                .map_err(|e| CacheError::Population {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
            if !response.is_success() {
                return Err(CacheError::Population {
                    url,
                    reason: format!("status {}", response.status),
                });
            }
            entries.push(response);
        }

        let count = entries.len();
        self.storage.open(&self.settings.name).await?;
        self.storage.put_all(&self.settings.name, entries).await?;
        log::info!(
            "Cache {} opened, {} shell resources added",
            self.settings.name,
            count
        );
        Ok(count)
    }

    /// Delete every bucket except the current one. Best effort: a failed
    /// deletion is logged and skipped. Returns the names actually deleted.
    pub async fn activate(&self) -> CacheResult<Vec<String>> {
        let names = self.storage.keys().await?;
        let mut deleted = Vec::new();

        for name in names {
            if name == self.settings.name {
                continue;
            }
            match self.storage.delete(&name).await {
                Ok(_) => {
                    log::info!("Deleted stale cache {}", name);
                    deleted.push(name);
                }
                Err(e) => log::warn!("Could not delete stale cache {}: {}", name, e),
            }
        }

        Ok(deleted)
    }

    /// Answer a resource request: cache first, then network. Requests to the
    /// excluded host never read or write the bucket.
    pub async fn fetch(&self, url: &str) -> CacheResult<FetchedResponse> {
        if self.settings.is_excluded(url) {
            log::debug!("Bypassing cache for {}", url);
            return self.from_network(url).await;
        }

        let key = normalize(url);
        if let Some(response) = self.storage.lookup(&self.settings.name, &key).await? {
            log::debug!("Cache hit for {}", key);
            return Ok(FetchedResponse {
                response,
                source: FetchSource::Cache,
            });
        }

        self.from_network(&key).await
    }

    async fn from_network(&self, url: &str) -> CacheResult<FetchedResponse> {
        let response = self.fetcher.fetch(url).await?;
        Ok(FetchedResponse {
            response,
            source: FetchSource::Network,
        })
    }
}

/// Request identity: the URL in its canonical form, when it parses.
fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Serves canned bodies and counts calls per URL.
    #[derive(Default, Clone)]
    struct FakeNetwork {
        routes: Arc<Mutex<HashMap<String, u16>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeNetwork {
        fn serve(&self, url: &str, status: u16) {
            self.routes.lock().unwrap().insert(url.to_string(), status);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeNetwork {
        async fn fetch(&self, url: &str) -> CacheResult<CachedResponse> {
            self.calls.lock().unwrap().push(url.to_string());
            let status = self
                .routes
                .lock()
                .unwrap()
                .get(url)
                .copied()
                .ok_or_else(|| CacheError::InvalidUrl(format!("unreachable {}", url)))?;
            Ok(CachedResponse {
                url: url.to_string(),
                status,
                content_type: Some("text/plain".to_string()),
                body: Bytes::from(format!("network:{}", url)),
            })
        }
    }

    /// Memory storage that counts reads and writes.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        reads: AtomicUsize,
        writes: AtomicUsize,
        fail_delete: Option<String>,
    }

    #[async_trait]
    impl CacheStorage for CountingStorage {
        async fn open(&self, bucket: &str) -> CacheResult<()> {
            self.inner.open(bucket).await
        }

        async fn keys(&self) -> CacheResult<Vec<String>> {
            self.inner.keys().await
        }

        async fn delete(&self, bucket: &str) -> CacheResult<bool> {
            if self.fail_delete.as_deref() == Some(bucket) {
                return Err(CacheError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "locked",
                )));
            }
            self.inner.delete(bucket).await
        }

        async fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(bucket, url).await
        }

        async fn put_all(&self, bucket: &str, entries: Vec<CachedResponse>) -> CacheResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put_all(bucket, entries).await
        }
    }

    fn settings() -> CacheSettings {
        CacheSettings {
            base_url: "http://shell.test/app/".to_string(),
            manifest: vec!["/".to_string(), "index.html".to_string(), "./app.js".to_string()],
            ..CacheSettings::default()
        }
    }

    fn serve_shell(network: &FakeNetwork) {
        network.serve("http://shell.test/", 200);
        network.serve("http://shell.test/app/index.html", 200);
        network.serve("http://shell.test/app/app.js", 200);
    }

    #[test]
    fn manifest_resolves_against_base() {
        assert_eq!(
            settings().manifest_urls().unwrap(),
            vec![
                "http://shell.test/",
                "http://shell.test/app/index.html",
                "http://shell.test/app/app.js",
            ]
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let settings = CacheSettings {
            base_url: "not a url".to_string(),
            ..CacheSettings::default()
        };
        assert!(matches!(settings.manifest_urls(), Err(CacheError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn install_precaches_manifest() {
        let network = FakeNetwork::default();
        serve_shell(&network);
        let cache = AssetCache::new(settings(), CountingStorage::default(), network.clone());

        assert_eq!(cache.install().await.unwrap(), 3);
        assert_eq!(cache.storage().inner.keys().await.unwrap(), vec![CACHE_NAME]);

        let hit = cache.fetch("http://shell.test/app/index.html").await.unwrap();
        assert_eq!(hit.source, FetchSource::Cache);
        assert_eq!(hit.response.body, Bytes::from("network:http://shell.test/app/index.html"));
        assert_eq!(network.calls().len(), 3);
    }

    #[tokio::test]
    async fn install_fails_whole_on_one_missing_resource() {
        let network = FakeNetwork::default();
        network.serve("http://shell.test/", 200);
        network.serve("http://shell.test/app/index.html", 404);
        network.serve("http://shell.test/app/app.js", 200);
        let cache = AssetCache::new(settings(), CountingStorage::default(), network);

        match cache.install().await {
            Err(CacheError::Population { url, reason }) => {
                assert_eq!(url, "http://shell.test/app/index.html");
                assert!(reason.contains("404"));
            }
            other => panic!("expected population error, got {:?}", other),
        }
        assert_eq!(cache.storage().writes.load(Ordering::SeqCst), 0);
        assert!(cache.storage().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_fails_on_unreachable_resource() {
        let network = FakeNetwork::default();
        network.serve("http://shell.test/", 200);
        let cache = AssetCache::new(settings(), CountingStorage::default(), network);

        assert!(matches!(
            cache.install().await,
            Err(CacheError::Population { .. })
        ));
    }

    #[tokio::test]
    async fn activate_deletes_only_stale_buckets() {
        let storage = CountingStorage::default();
        storage.open("helena-cache-v1").await.unwrap();
        storage.open("helena-cache-v0").await.unwrap();
        let cache = AssetCache::new(settings(), storage, FakeNetwork::default());

        let deleted = cache.activate().await.unwrap();
        assert_eq!(deleted, vec!["helena-cache-v0".to_string()]);
        assert_eq!(cache.storage().keys().await.unwrap(), vec!["helena-cache-v1"]);
    }

    #[tokio::test]
    async fn activate_skips_failed_deletions() {
        let storage = CountingStorage {
            fail_delete: Some("old-a".to_string()),
            ..CountingStorage::default()
        };
        for name in ["old-a", "old-b", CACHE_NAME] {
            storage.open(name).await.unwrap();
        }
        let cache = AssetCache::new(settings(), storage, FakeNetwork::default());

        let deleted = cache.activate().await.unwrap();
        assert_eq!(deleted, vec!["old-b".to_string()]);
        assert_eq!(
            cache.storage().keys().await.unwrap(),
            vec!["helena-cache-v1", "old-a"]
        );
    }

    #[tokio::test]
    async fn excluded_host_never_touches_bucket() {
        let api = "https://generativelanguage.googleapis.com/v1beta/models";
        let network = FakeNetwork::default();
        network.serve(api, 200);

        let storage = CountingStorage::default();
        storage
            .put_all(
                CACHE_NAME,
                vec![CachedResponse {
                    url: api.to_string(),
                    status: 200,
                    content_type: None,
                    body: Bytes::from_static(b"stale"),
                }],
            )
            .await
            .unwrap();
        let writes_before = storage.writes.load(Ordering::SeqCst);

        let cache = AssetCache::new(settings(), storage, network.clone());
        let fetched = cache.fetch(api).await.unwrap();

        assert_eq!(fetched.source, FetchSource::Network);
        assert_eq!(fetched.response.body, Bytes::from(format!("network:{}", api)));
        assert_eq!(cache.storage().reads.load(Ordering::SeqCst), 0);
        assert_eq!(cache.storage().writes.load(Ordering::SeqCst), writes_before);
        assert_eq!(network.calls(), vec![api.to_string()]);
    }

    #[tokio::test]
    async fn miss_goes_to_network_without_write_back() {
        let network = FakeNetwork::default();
        network.serve("http://shell.test/extra.css", 200);
        let cache = AssetCache::new(settings(), CountingStorage::default(), network.clone());

        for _ in 0..2 {
            let fetched = cache.fetch("http://shell.test/extra.css").await.unwrap();
            assert_eq!(fetched.source, FetchSource::Network);
        }
        assert_eq!(cache.storage().writes.load(Ordering::SeqCst), 0);
        assert_eq!(network.calls().len(), 2);
    }
}
