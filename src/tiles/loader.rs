use crate::context::LoopContext;
use crate::prelude::HashMap;
use crate::tiles::cache::{CacheEntry, TileCache};
use crate::{LoopError, Result};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use image::RgbaImage;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

type TileFuture = BoxFuture<'static, Result<Arc<RgbaImage>>>;

/// Async tile loader with bounded concurrency and request de-duplication.
///
/// At most `max_concurrent_downloads` requests are on the wire at once.
/// Concurrent loads of the same URL share one request. Every finished
/// request stores its outcome in the shared cache: the decoded image, or an
/// error entry that blocks the URL until it expires. A load that is dropped
/// before finishing leaves nothing behind.
#[derive(Clone)]
pub struct TileLoader {
    ctx: LoopContext,
    semaphore: Arc<Semaphore>,
    pending: Arc<Mutex<HashMap<String, WeakShared<TileFuture>>>>,
}

impl TileLoader {
    pub fn new(ctx: LoopContext) -> Self {
        let permits = ctx.config().max_concurrent_downloads;
        Self {
            ctx,
            semaphore: Arc::new(Semaphore::new(permits)),
            pending: Arc::new(Mutex::new(HashMap::default())),
        }
    }

    /// Resolve a tile, from the cache when possible
    pub async fn load(&self, url: String) -> Result<Arc<RgbaImage>> {
        if let Some(entry) = self.ctx.cache().get(&url) {
            return match entry {
                CacheEntry::Image(image) => Ok(image),
                CacheEntry::Error { error, .. } => Err(error),
            };
        }

        let shared = self.join_or_start(&url);
        let result = shared.await;
        self.prune_pending();
        result
    }

    /// Number of distinct URLs currently being downloaded
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .map(|pending| pending.values().filter(|w| w.upgrade().is_some()).count())
            .unwrap_or(0)
    }

    pub fn context(&self) -> &LoopContext {
        &self.ctx
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        self.ctx.cache()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn join_or_start(&self, url: &str) -> Shared<TileFuture> {
        let start = || Self::download(self.ctx.clone(), self.semaphore.clone(), url.to_string()).boxed().shared();

        let Ok(mut pending) = self.pending.lock() else {
            return start();
        };
        if let Some(existing) = pending.get(url).and_then(|weak| weak.upgrade()) {
            log::debug!("joining in-flight request for {}", url);
            return existing;
        }

        let shared = start();
        if let Some(weak) = shared.downgrade() {
            pending.insert(url.to_string(), weak);
        }
        shared
    }

    fn prune_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|_, weak| weak.upgrade().is_some());
        }
    }

    async fn download(ctx: LoopContext, semaphore: Arc<Semaphore>, url: String) -> Result<Arc<RgbaImage>> {
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| LoopError::Cancelled)?;

        log::debug!("downloading tile {}", url);
        let result = Self::fetch_and_decode(&ctx, &url).await;

        match &result {
            Ok(image) => {
                ctx.cache().insert_image(url.clone(), image.clone());
            }
            Err(e) => {
                log::warn!("tile download failed: {}", e);
                ctx.cache().insert_error(url.clone(), e.clone());
            }
        }
        result
    }

    async fn fetch_and_decode(ctx: &LoopContext, url: &str) -> Result<Arc<RgbaImage>> {
        let failed = |reason: String| LoopError::TileDownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = ctx
            .http()
            .get(ctx.tile_request(url))
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.is_success() {
            return Err(failed(format!("HTTP {}", response.status)));
        }

        let body = response.body;
        let image = crate::runtime::spawn_blocking(move || image::load_from_memory(&body))
            .await?
            .map_err(|e| failed(format!("decode: {}", e)))?;
        Ok(Arc::new(image.to_rgba8()))
    }
}
