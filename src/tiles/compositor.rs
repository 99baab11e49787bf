//! Stitches the tiles of one frame into a single image clipped to the
//! viewport.

use crate::core::geo::TileCoord;
use crate::core::viewport::{MapRect, PixelRect, Viewport};
use crate::prelude::HashSet;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::Arc;

/// Position of a tile set inside its mosaic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicLayout {
    pub west: u32,
    pub north: u32,
    pub columns: u32,
    pub rows: u32,
    pub zoom: u8,
    /// Edge of one tile in pixels
    pub tile_size: u32,
}

impl MosaicLayout {
    /// Layout of a coordinate list as produced by tile addressing: the first
    /// coordinate is the north-west corner.
    pub fn from_coordinates(coordinates: &[TileCoord], tile_size: u32) -> Option<Self> {
        let first = coordinates.first()?;
        let columns: HashSet<u32> = coordinates.iter().map(|c| c.x).collect();
        let rows: HashSet<u32> = coordinates.iter().map(|c| c.y).collect();

        Some(Self {
            west: first.x,
            north: first.y,
            columns: columns.len() as u32,
            rows: rows.len() as u32,
            zoom: first.z,
            tile_size,
        })
    }

    /// Mosaic size in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.columns * self.tile_size, self.rows * self.tile_size)
    }

    /// Map-point area covered by the mosaic
    pub fn map_rect(&self) -> MapRect {
        let span = TileCoord::map_span(self.zoom);
        MapRect::new(
            self.west as f64 * span,
            self.north as f64 * span,
            self.columns as f64 * span,
            self.rows as f64 * span,
        )
    }

    /// Column of `x` counted from the west edge, wrapping past the
    /// antimeridian
    pub fn column(&self, x: u32) -> u32 {
        if x < self.west {
            x + TileCoord::world_width(self.zoom) - self.west
        } else {
            x - self.west
        }
    }

    pub fn row(&self, y: u32) -> u32 {
        y.saturating_sub(self.north)
    }

    pub fn clip(&self, viewport: &Viewport) -> PixelRect {
        let (width, height) = self.pixel_size();
        viewport
            .normalized()
            .clip_rect(&self.map_rect(), width as f64, height as f64)
    }
}

/// Draws every available tile into a canvas the size of the viewport's clip
/// rectangle, `tile_size` pixels per tile. Tiles `tile_for` cannot provide
/// are left transparent.
pub fn composite<F>(coordinates: &[TileCoord], viewport: &Viewport, tile_size: u32, tile_for: F) -> RgbaImage
where
    F: Fn(&TileCoord) -> Option<Arc<RgbaImage>>,
{
    let Some(layout) = MosaicLayout::from_coordinates(coordinates, tile_size) else {
        return RgbaImage::new(0, 0);
    };

    let clip = layout.clip(viewport);
    let width = clip.width.round().max(0.0) as u32;
    let height = clip.height.round().max(0.0) as u32;
    let mut canvas = RgbaImage::new(width, height);

    for coord in coordinates {
        let Some(tile) = tile_for(coord) else {
            continue;
        };
        let x = (layout.column(coord.x) * tile_size) as i64 - clip.x as i64;
        let y = (layout.row(coord.y) * tile_size) as i64 - clip.y as i64;

        if tile.dimensions() == (tile_size, tile_size) {
            imageops::overlay(&mut canvas, tile.as_ref(), x, y);
        } else {
            let resized = imageops::resize(tile.as_ref(), tile_size, tile_size, FilterType::Triangle);
            imageops::overlay(&mut canvas, &resized, x, y);
        }
    }

    canvas
}
