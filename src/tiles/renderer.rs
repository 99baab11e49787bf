//! Draw-ready decisions for an external map renderer.
//!
//! The host map asks whether a rect can be drawn at the current zoom and then
//! asks for draw commands. Each rect is split into quadrants; each quadrant
//! shows the tile under its center at the currently displayed frame.

use super::addressing::zoom_level;
use super::cache::{CacheEntry, TileCache};
use super::loader::TileLoader;
use super::source::TileSource;
use crate::core::geo::TileCoord;
use crate::core::viewport::MapRect;
use crate::events::{EventSender, OverlayEvent};
use crate::prelude::HashMap;
use crate::runtime::TaskHandle;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Supplies the key of the frame currently on display
pub type FrameKeyFn = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Tile downloads started by `can_draw`, keyed by URL. The handle is `None`
/// only while the task is being spawned.
type Requests = Arc<Mutex<HashMap<String, Option<TaskHandle>>>>;

#[derive(Debug, Clone)]
pub enum DrawCommand {
    Image {
        rect: MapRect,
        image: Arc<RgbaImage>,
        alpha: f32,
    },
    /// Neutral fill for a tile that is missing or failed
    Placeholder { rect: MapRect, alpha: f32 },
}

impl DrawCommand {
    pub fn rect(&self) -> &MapRect {
        match self {
            Self::Image { rect, .. } | Self::Placeholder { rect, .. } => rect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scales {
    zoom: f64,
    content: f64,
}

pub struct FrameRenderer {
    source: Arc<dyn TileSource>,
    cache: Arc<TileCache>,
    loader: TileLoader,
    events: EventSender,
    frame_key: FrameKeyFn,
    scales: Mutex<Scales>,
    requested: Requests,
    hidden: AtomicBool,
    alpha: AtomicU32,
    placeholder_alpha: f32,
}

impl FrameRenderer {
    pub fn new(
        source: Arc<dyn TileSource>,
        loader: TileLoader,
        events: EventSender,
        frame_key: FrameKeyFn,
        placeholder_alpha: f32,
    ) -> Self {
        let cache = loader.cache().clone();
        Self {
            source,
            cache,
            loader,
            events,
            frame_key,
            scales: Mutex::new(Scales { zoom: 1.0, content: 1.0 }),
            requested: Arc::new(Mutex::new(HashMap::default())),
            hidden: AtomicBool::new(false),
            alpha: AtomicU32::new(1.0f32.to_bits()),
            placeholder_alpha,
        }
    }

    /// Whether every quadrant of `rect` has a cache entry for the current
    /// frame. Missing tiles are requested and announced with
    /// [`OverlayEvent::TileReady`] once they arrive. Must be called inside a
    /// tokio runtime for the requests to start.
    pub fn can_draw(&self, rect: &MapRect, zoom_scale: f64, content_scale: f64) -> bool {
        let Some(key) = self.current_key() else {
            return false;
        };
        if let Ok(mut scales) = self.scales.lock() {
            *scales = Scales {
                zoom: zoom_scale,
                content: content_scale,
            };
        }

        let zoom = zoom_level(zoom_scale, content_scale);
        let mut ready = true;
        for quadrant in rect.subdivided() {
            let url = self.quadrant_url(&quadrant, zoom, content_scale, &key);
            if self.cache.get(&url).is_none() {
                ready = false;
                self.request(url, *rect);
            }
        }
        ready
    }

    /// Draw commands for `rect` at the current frame; empty while hidden
    pub fn draw(&self, rect: &MapRect, zoom_scale: f64) -> Vec<DrawCommand> {
        if self.is_hidden() {
            return Vec::new();
        }
        let Some(key) = self.current_key() else {
            return Vec::new();
        };

        let content_scale = self.content_scale();
        let zoom = zoom_level(zoom_scale, content_scale);
        let alpha = self.alpha();
        rect.subdivided()
            .into_iter()
            .map(|quadrant| {
                let url = self.quadrant_url(&quadrant, zoom, content_scale, &key);
                match self.cache.get(&url) {
                    Some(CacheEntry::Image(image)) => DrawCommand::Image {
                        rect: quadrant,
                        image,
                        alpha,
                    },
                    _ => DrawCommand::Placeholder {
                        rect: quadrant,
                        alpha: self.placeholder_alpha,
                    },
                }
            })
            .collect()
    }

    /// Zoom scale recorded by the last `can_draw`
    pub fn zoom_scale(&self) -> f64 {
        self.scales.lock().map(|s| s.zoom).unwrap_or(1.0)
    }

    pub fn content_scale(&self) -> f64 {
        self.scales.lock().map(|s| s.content).unwrap_or(1.0)
    }

    /// Zoom level of the last drawn scale
    pub fn zoom_level(&self) -> u8 {
        zoom_level(self.zoom_scale(), self.content_scale())
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::Release);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    pub fn alpha(&self) -> f32 {
        f32::from_bits(self.alpha.load(Ordering::Acquire))
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.alpha.store(alpha.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    /// Tiles requested by `can_draw` that have not arrived yet
    pub fn pending_requests(&self) -> usize {
        self.requested.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Aborts every outstanding tile request. No `TileReady` is sent for
    /// them afterwards.
    pub fn cancel_requests(&self) {
        let Ok(mut requested) = self.requested.lock() else {
            return;
        };
        if !requested.is_empty() {
            log::debug!("cancelling {} renderer tile requests", requested.len());
        }
        // Dropping the handles aborts the downloads
        requested.clear();
    }

    fn current_key(&self) -> Option<String> {
        (self.frame_key)().filter(|key| !key.is_empty())
    }

    fn quadrant_url(&self, quadrant: &MapRect, zoom: u8, content_scale: f64, key: &str) -> String {
        let coord = TileCoord::from_map_point(quadrant.center(), zoom).with_scale(content_scale);
        self.source.url(coord, key)
    }

    fn request(&self, url: String, rect: MapRect) {
        if tokio::runtime::Handle::try_current().is_err() {
            log::warn!("no async runtime, cannot request {}", url);
            return;
        }
        let fresh = self
            .requested
            .lock()
            .map(|mut requested| {
                if requested.contains_key(&url) {
                    return false;
                }
                requested.insert(url.clone(), None);
                true
            })
            .unwrap_or(false);
        if !fresh {
            return;
        }

        let loader = self.loader.clone();
        let events = self.events.clone();
        let requested = self.requested.clone();
        let key = url.clone();
        let task = self.loader.context().spawn(async move {
            // Failed tiles are drawn as placeholders, so they redraw too
            let _ = loader.load(key.clone()).await;
            let Ok(mut requested) = requested.lock() else {
                return;
            };
            // A missing entry means the request was cancelled meanwhile
            let Some(handle) = requested.remove(&key) else {
                return;
            };
            if let Some(handle) = handle {
                handle.detach();
            }
            events.send(OverlayEvent::TileReady { rect });
        });

        if let Ok(mut requested) = self.requested.lock() {
            // A finished or cancelled task has already left the map
            if let Some(slot) = requested.get_mut(&url) {
                *slot = Some(task);
            }
        }
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        self.cancel_requests();
    }
}
