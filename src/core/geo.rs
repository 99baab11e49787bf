use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

use super::constants::{MAP_POINT_ZOOM, MAP_WORLD_SIZE, MAX_ZOOM_LEVEL, TILE_SIZE};
use super::viewport::MapRect;

/// Web Mercator latitude limit
const MAX_LATITUDE: f64 = 85.0511287798;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Forward projection into map-point space (origin at the north-west
    /// corner of the world, y growing southwards).
    pub fn to_map_point(&self) -> Point {
        let lat_rad = Self::clamp_lat(self.lat).to_radians();
        let x = (self.lng + 180.0) / 360.0 * MAP_WORLD_SIZE;
        let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * MAP_WORLD_SIZE;
        Point::new(x, y)
    }

    /// Inverse projection out of map-point space
    pub fn from_map_point(point: Point) -> Self {
        let lng = point.x / MAP_WORLD_SIZE * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * point.y / MAP_WORLD_SIZE))
            .sinh()
            .atan()
            .to_degrees();
        Self::new(lat, lng)
    }
}

/// Represents a point in map-point or pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }
}

/// One raster tile in the quad-tree pyramid.
///
/// `scale` is the content scale factor the tile was requested for (1.0 for
/// standard displays, 2.0 for high density ones). It does not change the
/// tile's geographic footprint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
    pub scale: f64,
}

impl PartialEq for TileCoord {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.z == other.z
            && self.scale.to_bits() == other.scale.to_bits()
    }
}

impl Eq for TileCoord {}

impl Hash for TileCoord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
        self.z.hash(state);
        self.scale.to_bits().hash(state);
    }
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self {
            x,
            y,
            z,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Number of tiles along one axis at zoom `z`, saturating past the
    /// deepest published zoom
    pub fn world_width(z: u8) -> u32 {
        1u32 << z.min(MAX_ZOOM_LEVEL)
    }

    /// Creates a tile coordinate from a LatLng and zoom level
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();
        let n = 2_f64.powi(zoom as i32);
        let max = Self::world_width(zoom) - 1;

        let lng = LatLng::wrap_lng(lat_lng.lng);
        let x = ((lng + 180.0) / 360.0 * n).floor().clamp(0.0, max as f64) as u32;
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
            .floor()
            .clamp(0.0, max as f64) as u32;

        Self::new(x, y, zoom)
    }

    /// Creates the tile containing a map point at the given zoom level,
    /// wrapping x around the antimeridian.
    pub fn from_map_point(point: Point, zoom: u8) -> Self {
        let span = Self::map_span(zoom);
        let width = Self::world_width(zoom) as i64;
        let x = ((point.x / span).floor() as i64).rem_euclid(width) as u32;
        let y = ((point.y / span).floor() as i64).clamp(0, width - 1) as u32;
        Self::new(x, y, zoom)
    }

    /// Converts tile coordinate to LatLng (northwest corner)
    pub fn to_lat_lng(&self) -> LatLng {
        let n = 2_f64.powi(self.z as i32);
        let lng = self.x as f64 / n * 360.0 - 180.0;
        let lat_rad = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan();
        LatLng::new(lat_rad.to_degrees(), lng)
    }

    /// Geographic bounds of the tile (inverse slippy-map formula)
    pub fn bounds(&self) -> LatLngBounds {
        let nw = self.to_lat_lng();
        let se = TileCoord::new(self.x + 1, self.y + 1, self.z).to_lat_lng();
        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }

    /// Size of one tile at zoom `z` measured in map points
    pub fn map_span(z: u8) -> f64 {
        let exponent = MAP_POINT_ZOOM as i32 - z as i32;
        TILE_SIZE as f64 * 2_f64.powi(exponent)
    }

    /// Footprint of the tile in map-point space
    pub fn map_rect(&self) -> MapRect {
        let span = Self::map_span(self.z);
        MapRect::new(self.x as f64 * span, self.y as f64 * span, span, span)
    }
}
