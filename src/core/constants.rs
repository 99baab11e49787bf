//! Core constants for the tile pyramid and the projected map-point space.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Zoom level at which one map point equals one tile pixel.
pub const MAP_POINT_ZOOM: u8 = 20;

/// Width (and height) of the whole world in map points: `256 * 2^20`.
pub const MAP_WORLD_SIZE: f64 = 268_435_456.0;

/// Deepest zoom level the tile servers publish.
pub const MAX_ZOOM_LEVEL: u8 = 22;

/// Separator used between layer components and between per-component timestamps.
pub const COMPONENT_SEPARATOR: char = ',';

/// Timestamp layout used by the tile server (UTC, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
