//! Tile addressing, caching, downloading and frame compositing.

pub mod addressing;
pub mod cache;
pub mod compositor;
pub mod loader;
pub mod progress;
pub mod renderer;
pub mod scheduler;
pub mod source;

// Re-exports for convenience
pub use addressing::{loop_zoom, tile_coordinates, zoom_level};
pub use cache::{CacheEntry, TileCache};
pub use compositor::composite;
pub use loader::TileLoader;
pub use progress::FetchProgress;
pub use renderer::{DrawCommand, FrameKeyFn, FrameRenderer};
pub use scheduler::{CompletionCallback, FetchRequest, FetchScheduler, FetchSummary, FrameCache};
pub use source::{LayerSource, LayerSpec, TileSource};
