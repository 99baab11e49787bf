//! Viewport to tile-coordinate resolution

use crate::core::constants::{MAP_POINT_ZOOM, MAX_ZOOM_LEVEL};
use crate::core::geo::TileCoord;
use crate::core::viewport::{MapRect, Viewport};
use crate::prelude::HashSet;

/// Zoom level for a display scale.
///
/// `zoom_scale` is screen points per map point and `content_scale` the
/// device pixel density. High density screens request one extra level per
/// additional pixel of density.
pub fn zoom_level(zoom_scale: f64, content_scale: f64) -> u8 {
    let content_scale = if content_scale > 0.0 { content_scale } else { 1.0 };
    let ratio = zoom_scale / content_scale;
    if !(ratio > 0.0) || !ratio.is_finite() {
        return 0;
    }

    let level = (ratio.log2() + MAP_POINT_ZOOM as f64).floor() + (content_scale - 1.0);
    level.clamp(0.0, MAX_ZOOM_LEVEL as f64) as u8
}

/// Zoom used for prefetching animation frames
pub fn loop_zoom(zoom: u8, offset: u8) -> u8 {
    zoom.saturating_sub(offset)
}

/// Every tile whose footprint shares area with the viewport at `zoom`.
///
/// Columns outside the world wrap modulo the grid width and each wrapped
/// tile is returned once, in first-seen order (column-major, north to south).
/// Rows outside the world are dropped. Zooms deeper than the servers
/// publish are clamped.
pub fn tile_coordinates(viewport: &Viewport, zoom: u8) -> Vec<TileCoord> {
    if viewport.is_empty() {
        return Vec::new();
    }
    let zoom = zoom.min(MAX_ZOOM_LEVEL);

    let span = TileCoord::map_span(zoom);
    let width = TileCoord::world_width(zoom) as i64;

    let min_x = (viewport.min_x() / span).floor() as i64;
    let max_x = (viewport.max_x() / span).floor() as i64;
    let min_y = (viewport.min_y() / span).floor() as i64;
    let max_y = (viewport.max_y() / span).floor() as i64;

    let mut seen = HashSet::default();
    let mut tiles = Vec::new();

    for x in min_x..=max_x {
        for y in min_y..=max_y {
            if y < 0 || y >= width {
                continue;
            }

            let footprint = MapRect::new(x as f64 * span, y as f64 * span, span, span);
            if !footprint.intersects(viewport) {
                continue;
            }

            let wrapped_x = x.rem_euclid(width) as u32;
            if seen.insert((wrapped_x, y as u32)) {
                tiles.push(TileCoord::new(wrapped_x, y as u32, zoom));
            }
        }
    }

    tiles
}
