//! # tileloop
//!
//! Fetches, caches, composites and animates time-series weather map tiles.
//!
//! The pipeline is made of small leaf components wired together by a
//! [`LoopOverlay`]: tile addressing turns a viewport into tile coordinates,
//! the valid-times poller keeps a [`TimeAxis`] current, the fetch scheduler
//! downloads every (tile, timestamp) pair into a shared [`TileCache`], the
//! compositor stitches each timestamp into one frame and the animation
//! driver loops through the frames on a timer.

pub mod animation;
pub mod context;
pub mod core;
pub mod events;
pub mod layers;
pub mod net;
pub mod overlay;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub mod time;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{LoopConfig, LoopProfile},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    viewport::{MapRect, PixelRect, Viewport},
};

pub use animation::{AnimationDriver, AnimationPhase, AnimationState};
pub use context::{LoopContext, LoopContextBuilder};
pub use events::OverlayEvent;
pub use layers::{BaseLayer, LayerCatalog, LayerGroup};
pub use net::{ApiKeyCredentials, ReqwestClient};
pub use overlay::LoopOverlay;
pub use tiles::{
    cache::{CacheEntry, TileCache},
    compositor::composite,
    progress::FetchProgress,
    renderer::{DrawCommand, FrameRenderer},
    scheduler::FetchScheduler,
    source::LayerSpec,
};
pub use time::{Frame, TimeAxis, ValidTimesPoller};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, LoopError>;

/// Errors produced by the tile loop pipeline.
///
/// Payloads are plain strings so that errors can be cloned into events and
/// cached as tile failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoopError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid server response{}: {reason}", http_status(.status))]
    InvalidServerResponse { status: Option<u16>, reason: String },

    #[error("Tile download failed for {url}: {reason}")]
    TileDownloadFailed { url: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoopError {
    pub(crate) fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidServerResponse {
            status: None,
            reason: reason.into(),
        }
    }

    /// Only configuration problems stop the pipeline; everything else fails a
    /// single poll or tile.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredentials(_) | Self::Config(_))
    }
}

impl From<serde_json::Error> for LoopError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(err.to_string())
    }
}

impl From<image::ImageError> for LoopError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Error type alias for convenience
pub type Error = LoopError;
