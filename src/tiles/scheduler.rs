//! Per-overlay fetch scheduling.
//!
//! A fetch downloads every (tile, frame) pair of a viewport that is not yet
//! cached, optionally composites each frame once its own downloads are done,
//! and then finalizes: composites move into the rendered frame cache, the
//! last progress unit completes and the completion callback runs. Only one
//! fetch runs at a time; starting another aborts the previous one.

use super::addressing::tile_coordinates;
use super::cache::TileCache;
use super::compositor::composite;
use super::loader::TileLoader;
use super::progress::FetchProgress;
use super::source::TileSource;
use crate::context::LoopContext;
use crate::core::geo::TileCoord;
use crate::core::viewport::Viewport;
use crate::prelude::{HashMap, HashSet};
use crate::runtime::{AsyncSpawner, TaskHandle};
use futures::future::join_all;
use image::RgbaImage;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinSet;

/// Composited frames keyed by frame key
pub type FrameCache = Arc<RwLock<HashMap<String, Arc<RgbaImage>>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub viewport: Viewport,
    pub zoom: u8,
    /// Frame keys in playback order
    pub frame_keys: Vec<String>,
    pub composite: bool,
}

/// What a finished fetch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub generation: u64,
    pub frames: usize,
    pub downloads: usize,
    pub failed: usize,
    pub composited: usize,
}

pub type CompletionCallback = Box<dyn FnOnce(FetchSummary) + Send + 'static>;

struct FramePlan {
    key: String,
    tiles: Vec<(TileCoord, String)>,
    uncached: Vec<String>,
}

struct ActiveFetch {
    generation: u64,
    progress: Arc<FetchProgress>,
    _task: TaskHandle,
}

pub struct FetchScheduler {
    source: Arc<dyn TileSource>,
    cache: Arc<TileCache>,
    loader: TileLoader,
    frames: FrameCache,
    active: Mutex<Option<ActiveFetch>>,
    generation: Arc<AtomicU64>,
    spawner: Arc<dyn AsyncSpawner>,
    tile_size: u32,
}

impl FetchScheduler {
    pub fn new(ctx: LoopContext, source: Arc<dyn TileSource>) -> Self {
        let tile_size = ctx.config().tile_size;
        Self {
            tile_size,
            spawner: ctx.spawner().clone(),
            source,
            cache: ctx.cache().clone(),
            loader: TileLoader::new(ctx),
            frames: Arc::new(RwLock::new(HashMap::default())),
            active: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts a fetch, cancelling the one in flight. `on_complete` runs
    /// exactly once unless this fetch is itself cancelled.
    pub fn fetch(&self, request: FetchRequest, on_complete: CompletionCallback) -> Arc<FetchProgress> {
        self.cancel();
        self.clear_frames();

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let coordinates = tile_coordinates(&request.viewport, request.zoom);
        let plans = self.plan(&coordinates, &request.frame_keys);
        let downloads: usize = plans.iter().map(|p| p.uncached.len()).sum();
        let progress = Arc::new(FetchProgress::new(downloads));

        log::debug!(
            "fetch {} started: {} tiles x {} frames, {} to download, composite: {}",
            generation,
            coordinates.len(),
            plans.len(),
            downloads,
            request.composite
        );

        let coordinator = Coordinator {
            generation,
            current_generation: self.generation.clone(),
            loader: self.loader.clone(),
            cache: self.cache.clone(),
            frames: self.frames.clone(),
            progress: progress.clone(),
            viewport: request.viewport,
            coordinates: Arc::new(coordinates),
            composite: request.composite,
            tile_size: self.tile_size,
            downloads,
        };
        let task = self.spawner.spawn(coordinator.run(plans, on_complete));

        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveFetch {
                generation,
                progress: progress.clone(),
                _task: task,
            });
        }
        progress
    }

    /// Aborts the fetch in flight. Downloads already finished stay cached;
    /// the rest are torn down and leave nothing in the cache.
    pub fn cancel(&self) {
        let active = self.active.lock().ok().and_then(|mut a| a.take());
        if let Some(active) = active {
            // Invalidate before aborting so a finishing coordinator cannot
            // report completion
            self.generation.fetch_add(1, Ordering::AcqRel);
            if !active.progress.is_complete() {
                log::debug!("fetch {} cancelled", active.generation);
            }
        }
    }

    pub fn progress(&self) -> Option<Arc<FetchProgress>> {
        self.active
            .lock()
            .ok()
            .and_then(|a| a.as_ref().map(|a| a.progress.clone()))
    }

    pub fn is_loading(&self) -> bool {
        self.progress().map(|p| !p.is_complete()).unwrap_or(false)
    }

    pub fn frame(&self, key: &str) -> Option<Arc<RgbaImage>> {
        self.frames.read().ok()?.get(key).cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn frames(&self) -> FrameCache {
        self.frames.clone()
    }

    pub fn clear_frames(&self) {
        if let Ok(mut frames) = self.frames.write() {
            frames.clear();
        }
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    fn plan(&self, coordinates: &[TileCoord], frame_keys: &[String]) -> Vec<FramePlan> {
        let mut seen = HashSet::default();
        frame_keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .map(|key| {
                let tiles: Vec<(TileCoord, String)> = coordinates
                    .iter()
                    .map(|coord| (*coord, self.source.url(*coord, key)))
                    .collect();
                let uncached = tiles
                    .iter()
                    .filter(|(_, url)| !self.cache.contains(url))
                    .map(|(_, url)| url.clone())
                    .collect();
                FramePlan {
                    key: key.clone(),
                    tiles,
                    uncached,
                }
            })
            .collect()
    }
}

impl Drop for FetchScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Where and how one frame gets composited
struct Compositing {
    viewport: Viewport,
    coordinates: Arc<Vec<TileCoord>>,
    tile_size: u32,
    frames: FrameCache,
}

struct Coordinator {
    generation: u64,
    current_generation: Arc<AtomicU64>,
    loader: TileLoader,
    cache: Arc<TileCache>,
    frames: FrameCache,
    progress: Arc<FetchProgress>,
    viewport: Viewport,
    coordinates: Arc<Vec<TileCoord>>,
    composite: bool,
    tile_size: u32,
    downloads: usize,
}

impl Coordinator {
    fn is_current(&self) -> bool {
        self.current_generation.load(Ordering::Acquire) == self.generation
    }

    async fn run(self, plans: Vec<FramePlan>, on_complete: CompletionCallback) {
        let frame_count = plans.len();
        let failed = Arc::new(AtomicUsize::new(0));
        let loop_cache: FrameCache = Arc::new(RwLock::new(HashMap::default()));

        // Dropping the set aborts every frame task and their downloads
        let mut tasks = JoinSet::new();
        for plan in plans {
            tasks.spawn(Self::run_frame(
                plan,
                self.loader.clone(),
                self.cache.clone(),
                self.progress.clone(),
                failed.clone(),
                self.composite.then(|| Compositing {
                    viewport: self.viewport,
                    coordinates: self.coordinates.clone(),
                    tile_size: self.tile_size,
                    frames: loop_cache.clone(),
                }),
            ));
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::warn!("fetch {} frame task failed: {}", self.generation, e);
            }
        }

        if !self.is_current() {
            return;
        }

        let composited = match loop_cache.write() {
            Ok(mut rendered) => {
                let rendered = std::mem::take(&mut *rendered);
                let count = rendered.len();
                if let Ok(mut frames) = self.frames.write() {
                    *frames = rendered;
                }
                count
            }
            Err(_) => 0,
        };
        self.progress.complete_unit();

        let summary = FetchSummary {
            generation: self.generation,
            frames: frame_count,
            downloads: self.downloads,
            failed: failed.load(Ordering::Acquire),
            composited,
        };
        log::info!(
            "fetch {} finished: {} frames, {} downloads ({} failed), {} composited",
            summary.generation,
            summary.frames,
            summary.downloads,
            summary.failed,
            summary.composited
        );
        on_complete(summary);
    }

    async fn run_frame(
        plan: FramePlan,
        loader: TileLoader,
        cache: Arc<TileCache>,
        progress: Arc<FetchProgress>,
        failed: Arc<AtomicUsize>,
        compositing: Option<Compositing>,
    ) {
        let downloads = plan.uncached.into_iter().map(|url| {
            let loader = loader.clone();
            let progress = progress.clone();
            let failed = failed.clone();
            async move {
                if loader.load(url).await.is_err() {
                    failed.fetch_add(1, Ordering::AcqRel);
                }
                progress.complete_unit();
            }
        });
        join_all(downloads).await;

        let Some(Compositing {
            viewport,
            coordinates,
            tile_size,
            frames: loop_cache,
        }) = compositing
        else {
            return;
        };

        let tiles: HashMap<TileCoord, Arc<RgbaImage>> = plan
            .tiles
            .iter()
            .filter_map(|(coord, url)| cache.get_image(url).map(|image| (*coord, image)))
            .collect();
        let rendered = crate::runtime::spawn_blocking(move || {
            composite(&coordinates, &viewport, tile_size, |coord| tiles.get(coord).cloned())
        })
        .await;

        match rendered {
            Ok(image) => {
                if let Ok(mut frames) = loop_cache.write() {
                    frames.insert(plan.key, Arc::new(image));
                }
            }
            Err(e) => log::warn!("compositing frame {} failed: {}", plan.key, e),
        }
    }
}
