use crate::runtime::{default_spawner, AsyncSpawner, TaskHandle};
use crate::LoopError;
use image::RgbaImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_CAPACITY: usize = 1024;

/// Value stored for a tile URL
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Image(Arc<RgbaImage>),
    /// Negative entry for a failed download, blocking retries until it
    /// expires
    Error { error: LoopError, at: Instant },
}

impl CacheEntry {
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        match self {
            Self::Image(image) => Some(image),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    fn is_expired(&self, now: Instant, expiry: Duration) -> bool {
        match self {
            Self::Image(_) => false,
            Self::Error { at, .. } => now.saturating_duration_since(*at) >= expiry,
        }
    }
}

type Entries = Arc<Mutex<LruCache<String, CacheEntry>>>;

/// Shared in-memory tile cache keyed by fully qualified tile URL, using LRU
/// eviction.
///
/// Error entries expire after `error_expiry`. Expiry is checked on every
/// lookup; in addition, while error entries exist a background sweep removes
/// the expired ones every `sweep_interval`.
pub struct TileCache {
    entries: Entries,
    error_expiry: Duration,
    sweep_interval: Duration,
    spawner: Arc<dyn AsyncSpawner>,
    sweeper: Mutex<Option<TaskHandle>>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize, error_expiry: Duration, sweep_interval: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            error_expiry,
            sweep_interval,
            spawner: default_spawner(),
            sweeper: Mutex::new(None),
        }
    }

    /// Runs the error sweep on `spawner`
    pub fn with_spawner(mut self, spawner: Arc<dyn AsyncSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Cache sized and timed from a configuration
    pub fn from_config(config: &crate::LoopConfig) -> Self {
        Self::new(
            config.cache_capacity,
            config.error_expiry(),
            config.error_sweep_interval(),
        )
    }

    /// Get a live entry. Expired error entries are removed and reported as
    /// absent.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().ok()?;
        let expired = entries
            .peek(url)
            .map(|entry| entry.is_expired(Instant::now(), self.error_expiry))?;
        if expired {
            entries.pop(url);
            return None;
        }
        entries.get(url).cloned()
    }

    pub fn get_image(&self, url: &str) -> Option<Arc<RgbaImage>> {
        self.get(url).and_then(|entry| entry.image().cloned())
    }

    /// True for a decoded image or an unexpired error
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    pub fn insert_image(&self, url: impl Into<String>, image: Arc<RgbaImage>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(url.into(), CacheEntry::Image(image));
        }
    }

    /// Records a failed download. Cancellations are never cached.
    pub fn insert_error(&self, url: impl Into<String>, error: LoopError) {
        if error == LoopError::Cancelled {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                url.into(),
                CacheEntry::Error {
                    error,
                    at: Instant::now(),
                },
            );
        }
        self.ensure_sweeper();
    }

    /// Remove a tile from the cache
    pub fn remove(&self, url: &str) -> Option<CacheEntry> {
        self.entries.lock().ok()?.pop(url)
    }

    /// Clear all tiles from the cache
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Removes expired error entries, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.entries, self.error_expiry).0
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|(_, e)| e.is_error()).count())
            .unwrap_or(0)
    }

    /// Get the current number of cached entries
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.cap().get())
            .unwrap_or(0)
    }

    pub fn error_expiry(&self) -> Duration {
        self.error_expiry
    }

    fn ensure_sweeper(&self) {
        // Outside a runtime only the lookup-time expiry applies
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        let Ok(mut slot) = self.sweeper.lock() else {
            return;
        };
        if slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return;
        }

        let entries = Arc::downgrade(&self.entries);
        *slot = Some(self.spawner.spawn(run_sweeper(
            entries,
            self.error_expiry,
            self.sweep_interval,
        )));
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::from_config(&crate::LoopConfig::default())
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("error_expiry", &self.error_expiry)
            .finish()
    }
}

/// Returns (removed, remaining error entries)
fn sweep(entries: &Entries, expiry: Duration) -> (usize, usize) {
    let Ok(mut entries) = entries.lock() else {
        return (0, 0);
    };
    let now = Instant::now();
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now, expiry))
        .map(|(url, _)| url.clone())
        .collect();
    for url in &expired {
        entries.pop(url);
    }
    let remaining = entries.iter().filter(|(_, e)| e.is_error()).count();
    (expired.len(), remaining)
}

async fn run_sweeper(entries: Weak<Mutex<LruCache<String, CacheEntry>>>, expiry: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        ticker.tick().await;
        let Some(entries) = entries.upgrade() else {
            break;
        };
        let (removed, remaining) = sweep(&entries, expiry);
        if removed > 0 {
            log::debug!("swept {} expired tile errors, {} remaining", removed, remaining);
        }
        if remaining == 0 {
            break;
        }
    }
}
