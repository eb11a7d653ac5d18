use crate::types::{AggregatorError, Result, Tweet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, warn};

/// One cycle's merged, sorted result. Readers share it; commits replace it whole.
pub type TweetCollection = Arc<Vec<Tweet>>;

/// Authoritative in-memory cache backed by a single JSON file.
///
/// Memory always wins once anything has been committed. The file is only read
/// on cold start, after waiting up to `cold_start_wait` for the first commit.
pub struct CacheStore {
    path: PathBuf,
    memory: RwLock<Option<TweetCollection>>,
    committed: watch::Sender<bool>,
    cold_start_wait: Duration,
    write_lock: Mutex<()>,
    generation: AtomicU64,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, cold_start_wait: Duration) -> Self {
        let (committed, _) = watch::channel(false);
        Self {
            path: path.into(),
            memory: RwLock::new(None),
            committed,
            cold_start_wait,
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of commits so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Replace the in-memory collection, then write it to disk.
    ///
    /// A failed write is returned as `CacheWrite`, but the new collection is
    /// already being served from memory at that point.
    pub async fn commit(&self, items: Vec<Tweet>) -> Result<TweetCollection> {
        let _guard = self.write_lock.lock().await;
        let collection: TweetCollection = Arc::new(items);

        *self.memory.write().await = Some(collection.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.committed.send_replace(true);

        self.write_snapshot(&collection).await?;
        debug!("Wrote {} tweets to {}", collection.len(), self.path.display());
        Ok(collection)
    }

    /// The committed collection, without waiting or touching disk.
    pub async fn current(&self) -> Option<TweetCollection> {
        self.memory.read().await.clone()
    }

    pub async fn read(&self) -> TweetCollection {
        if let Some(collection) = self.current().await {
            return collection;
        }

        let mut committed = self.committed.subscribe();
        let landed = tokio::time::timeout(self.cold_start_wait, async {
            committed.wait_for(|landed| *landed).await.is_ok()
        })
        .await
        .unwrap_or(false);

        if landed {
            if let Some(collection) = self.current().await {
                return collection;
            }
        }

        match self.read_snapshot().await {
            Ok(items) => Arc::new(items),
            Err(e) => {
                warn!("{}, returning an empty collection", e);
                Arc::new(Vec::new())
            }
        }
    }

    /// Parse the durable file. Never consults or updates memory.
    pub async fn read_snapshot(&self) -> Result<Vec<Tweet>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AggregatorError::CacheRead {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let items: Vec<Tweet> = serde_json::from_str(&content).map_err(|e| AggregatorError::CacheRead {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        debug!("Read {} tweets from {}", items.len(), self.path.display());
        Ok(items)
    }

    async fn write_snapshot(&self, collection: &[Tweet]) -> Result<()> {
        let write_error = |source: std::io::Error| AggregatorError::CacheWrite {
            path: self.path.clone(),
            source,
        };

        let body = serde_json::to_vec(collection)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body).await.map_err(write_error)?;
        tokio::fs::rename(&staging, &self.path).await.map_err(write_error)?;
        Ok(())
    }
}
