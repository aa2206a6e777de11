use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use tracing::{debug, info, warn};

use crate::core::lyrics::LyricsResult;
use crate::error::{CacheError, LyricSyncError, Result};

/// Persistence for normalized lyrics, one record per (provider, song id).
#[async_trait]
pub trait LyricsStore: Send + Sync {
    async fn load(&self, song_id: &str, provider: &str) -> Option<LyricsResult>;
    async fn save(&self, song_id: &str, provider: &str, lyrics: &LyricsResult) -> Result<()>;
    /// Removes every record and returns how many were dropped.
    async fn clear(&self) -> Result<usize>;
    async fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub backend: String,
    pub total_entries: usize,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub hit_rate_percent: f64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    hits: AtomicU64,
}

impl Counters {
    fn record(&self, hit: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }

    fn stats(&self, backend: &str, total_entries: usize) -> CacheStats {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let cache_hits = self.hits.load(Ordering::Relaxed);
        CacheStats {
            backend: backend.to_string(),
            total_entries,
            total_requests,
            cache_hits,
            hit_rate_percent: hit_rate(cache_hits, total_requests),
        }
    }
}

fn hit_rate(hits: u64, requests: u64) -> f64 {
    if requests > 0 {
        (hits as f64 / requests as f64) * 100.0
    } else {
        0.0
    }
}

/// `md5("{provider}_{song_id}")` with the provider lowercased.
pub fn cache_key(song_id: &str, provider: &str) -> String {
    format!("{:x}", md5::compute(format!("{}_{}", provider.to_lowercase(), song_id)))
}

/// One pretty-printed JSON file per record.
pub struct FileStore {
    cache_dir: PathBuf,
    counters: Counters,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            counters: Counters::default(),
        })
    }

    fn path_for(&self, song_id: &str, provider: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", cache_key(song_id, provider)))
    }

    async fn record_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl LyricsStore for FileStore {
    async fn load(&self, song_id: &str, provider: &str) -> Option<LyricsResult> {
        let path = self.path_for(song_id, provider);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => {
                debug!("File cache miss for {}:{}", provider, song_id);
                self.counters.record(false);
                return None;
            }
        };

        match serde_json::from_str::<LyricsResult>(&content) {
            Ok(lyrics) => {
                debug!("File cache hit for {}:{}", provider, song_id);
                self.counters.record(true);
                Some(lyrics)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache record {}: {}", path.display(), e);
                self.counters.record(false);
                None
            }
        }
    }

    async fn save(&self, song_id: &str, provider: &str, lyrics: &LyricsResult) -> Result<()> {
        let path = self.path_for(song_id, provider);
        let content = serde_json::to_string_pretty(lyrics)?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Write atomically: write to temp then rename
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &content).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("Cached lyrics for {}:{} at {}", provider, song_id, path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let files = self.record_files().await?;
        for file in &files {
            tokio::fs::remove_file(file).await?;
        }
        self.counters.reset();
        info!("File cache cleared, removed {} records", files.len());
        Ok(files.len())
    }

    async fn stats(&self) -> CacheStats {
        let entries = match self.record_files().await {
            Ok(files) => files.len(),
            Err(e) => {
                warn!("Failed to list cache directory: {}", e);
                0
            }
        };
        self.counters.stats("file", entries)
    }
}

pub struct RedisStore {
    client: RedisClient,
    key_prefix: String,
    ttl_seconds: u64,
    counters: Counters,
}

impl RedisStore {
    pub fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self> {
        let client = RedisClient::open(redis_url).map_err(CacheError::from)?;
        Ok(Self {
            client,
            key_prefix: "lyricsync:lyrics:".to_string(),
            ttl_seconds,
            counters: Counters::default(),
        })
    }

    fn key(&self, song_id: &str, provider: &str) -> String {
        format!("{}{}", self.key_prefix, cache_key(song_id, provider))
    }

    async fn connection(&self) -> Result<redis::aio::Connection> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| LyricSyncError::Cache(CacheError::Redis(e)))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut con = self.connection().await?;
        let pattern = format!("{}*", self.key_prefix);
        let keys: Vec<String> = con.keys(&pattern).await.map_err(CacheError::from)?;
        Ok(keys)
    }
}

#[async_trait]
impl LyricsStore for RedisStore {
    async fn load(&self, song_id: &str, provider: &str) -> Option<LyricsResult> {
        let key = self.key(song_id, provider);
        let mut con = match self.connection().await {
            Ok(con) => con,
            Err(e) => {
                warn!("Failed to connect to Redis: {}", e);
                self.counters.record(false);
                return None;
            }
        };

        match con.get::<_, Option<String>>(&key).await {
            Ok(Some(value)) => match serde_json::from_str::<LyricsResult>(&value) {
                Ok(lyrics) => {
                    debug!("Redis cache hit for {}:{}", provider, song_id);
                    self.counters.record(true);
                    Some(lyrics)
                }
                Err(e) => {
                    warn!("Failed to deserialize cached lyrics: {}", e);
                    self.counters.record(false);
                    None
                }
            },
            Ok(None) => {
                debug!("Redis cache miss for {}:{}", provider, song_id);
                self.counters.record(false);
                None
            }
            Err(e) => {
                warn!("Redis get error for {}: {}", key, e);
                self.counters.record(false);
                None
            }
        }
    }

    async fn save(&self, song_id: &str, provider: &str, lyrics: &LyricsResult) -> Result<()> {
        let key = self.key(song_id, provider);
        let value = serde_json::to_string(lyrics)?;
        let mut con = self.connection().await?;
        let _: () = con
            .set_ex(&key, &value, self.ttl_seconds)
            .await
            .map_err(CacheError::from)?;
        debug!("Cached lyrics in Redis for {}:{}", provider, song_id);
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let keys = self.keys().await?;
        if !keys.is_empty() {
            let mut con = self.connection().await?;
            let _: () = con.del(&keys).await.map_err(CacheError::from)?;
        }
        self.counters.reset();
        info!("Redis cache cleared, removed {} keys", keys.len());
        Ok(keys.len())
    }

    async fn stats(&self) -> CacheStats {
        let entries = match self.keys().await {
            Ok(keys) => keys.len(),
            Err(e) => {
                warn!("Failed to count Redis keys: {}", e);
                0
            }
        };
        self.counters.stats("redis", entries)
    }
}

/// Redis first, file fallback. File hits are copied back into Redis.
pub struct HybridStore {
    redis: Option<RedisStore>,
    file: FileStore,
}

impl HybridStore {
    pub fn new(file_cache_dir: PathBuf, redis_url: Option<&str>, ttl_seconds: u64) -> Result<Self> {
        let file = FileStore::new(file_cache_dir)?;

        let redis = match redis_url {
            Some(url) => match RedisStore::new(url, ttl_seconds) {
                Ok(store) => {
                    info!("Redis cache initialized successfully");
                    Some(store)
                }
                Err(e) => {
                    warn!("Failed to initialize Redis cache, falling back to file only: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self { redis, file })
    }
}

#[async_trait]
impl LyricsStore for HybridStore {
    async fn load(&self, song_id: &str, provider: &str) -> Option<LyricsResult> {
        if let Some(redis) = &self.redis {
            if let Some(lyrics) = redis.load(song_id, provider).await {
                return Some(lyrics);
            }
        }

        let lyrics = self.file.load(song_id, provider).await?;
        if let Some(redis) = &self.redis {
            if let Err(e) = redis.save(song_id, provider, &lyrics).await {
                debug!("Failed to update Redis cache from file cache: {}", e);
            }
        }
        Some(lyrics)
    }

    async fn save(&self, song_id: &str, provider: &str, lyrics: &LyricsResult) -> Result<()> {
        let redis_error = match &self.redis {
            Some(redis) => redis.save(song_id, provider, lyrics).await.err(),
            None => None,
        };
        let file_error = self.file.save(song_id, provider, lyrics).await.err();

        // Only fail when every configured backend failed
        match (redis_error, file_error) {
            (Some(redis_err), Some(file_err)) => Err(LyricSyncError::Internal(anyhow::anyhow!(
                "Both caches failed - Redis: {}, File: {}",
                redis_err,
                file_err
            ))),
            (None, Some(file_err)) if self.redis.is_none() => Err(file_err),
            (Some(redis_err), None) => {
                debug!("Redis cache save failed, but file cache succeeded: {}", redis_err);
                Ok(())
            }
            (None, Some(file_err)) => {
                debug!("File cache save failed, but Redis cache succeeded: {}", file_err);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut errors = Vec::new();

        if let Some(redis) = &self.redis {
            match redis.clear().await {
                Ok(n) => removed += n,
                Err(e) => errors.push(format!("Redis: {}", e)),
            }
        }
        match self.file.clear().await {
            Ok(n) => removed += n,
            Err(e) => errors.push(format!("File: {}", e)),
        }

        if errors.is_empty() {
            Ok(removed)
        } else {
            Err(LyricSyncError::Internal(anyhow::anyhow!(
                "Cache clear errors: {}",
                errors.join(", ")
            )))
        }
    }

    async fn stats(&self) -> CacheStats {
        let file_stats = self.file.stats().await;
        let Some(redis) = &self.redis else {
            return file_stats;
        };

        let redis_stats = redis.stats().await;
        let total_requests = file_stats.total_requests + redis_stats.total_requests;
        let cache_hits = file_stats.cache_hits + redis_stats.cache_hits;
        CacheStats {
            backend: "redis+file".to_string(),
            total_entries: file_stats.total_entries.max(redis_stats.total_entries),
            total_requests,
            cache_hits,
            hit_rate_percent: hit_rate(cache_hits, total_requests),
        }
    }
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    /// In-process store for pipeline tests.
    #[derive(Default)]
    pub struct MemoryStore {
        records: Mutex<HashMap<String, LyricsResult>>,
        counters: Counters,
    }

    impl MemoryStore {
        pub async fn len(&self) -> usize {
            self.records.lock().await.len()
        }
    }

    #[async_trait]
    impl LyricsStore for MemoryStore {
        async fn load(&self, song_id: &str, provider: &str) -> Option<LyricsResult> {
            let found = self.records.lock().await.get(&cache_key(song_id, provider)).cloned();
            self.counters.record(found.is_some());
            found
        }

        async fn save(&self, song_id: &str, provider: &str, lyrics: &LyricsResult) -> Result<()> {
            self.records
                .lock()
                .await
                .insert(cache_key(song_id, provider), lyrics.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<usize> {
            let mut records = self.records.lock().await;
            let removed = records.len();
            records.clear();
            self.counters.reset();
            Ok(removed)
        }

        async fn stats(&self) -> CacheStats {
            self.counters.stats("memory", self.records.lock().await.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lyrics::Line;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lyricsync-cache-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn sample() -> LyricsResult {
        LyricsResult::new(vec![Line::new(1.0, 2.0, "hello").with_translation("你好")])
    }

    #[test]
    fn test_cache_key_lowercases_provider() {
        assert_eq!(cache_key("123", "QQ Music"), cache_key("123", "qq music"));
        assert_ne!(cache_key("123", "qq music"), cache_key("124", "qq music"));
        assert_eq!(
            cache_key("1", "netease"),
            format!("{:x}", md5::compute("netease_1"))
        );
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = temp_dir("roundtrip");
        let store = FileStore::new(dir.clone()).unwrap();

        assert!(store.load("1", "Netease").await.is_none());
        store.save("1", "Netease", &sample()).await.unwrap();

        let loaded = store.load("1", "netease").await.unwrap();
        assert_eq!(loaded, sample());
        assert!(dir.join(format!("{}.json", cache_key("1", "netease"))).exists());
        assert!(!dir.join(format!("{}.json.tmp", cache_key("1", "netease"))).exists());

        let stats = store.stats().await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.hit_rate_percent, 50.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_file_store_clear() {
        let dir = temp_dir("clear");
        let store = FileStore::new(dir.clone()).unwrap();
        store.save("1", "kugou", &sample()).await.unwrap();
        store.save("2", "kugou", &sample()).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.load("1", "kugou").await.is_none());
        assert_eq!(store.stats().await.total_entries, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss() {
        let dir = temp_dir("corrupt");
        let store = FileStore::new(dir.clone()).unwrap();
        std::fs::write(dir.join(format!("{}.json", cache_key("9", "qq"))), "{not json").unwrap();
        assert!(store.load("9", "qq").await.is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_hybrid_without_redis_uses_files() {
        let dir = temp_dir("hybrid");
        let store = HybridStore::new(dir.clone(), None, 60).unwrap();
        store.save("7", "netease", &sample()).await.unwrap();
        assert_eq!(store.load("7", "netease").await, Some(sample()));
        assert_eq!(store.stats().await.backend, "file");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::default();
        store.save("1", "x", &sample()).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.load("1", "X").await.is_some());
        assert_eq!(store.clear().await.unwrap(), 1);
    }
}
