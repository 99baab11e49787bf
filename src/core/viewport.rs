use crate::core::constants::MAP_WORLD_SIZE;
use crate::core::geo::{LatLng, Point};
use serde::{Deserialize, Serialize};

/// Size of a region in map points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: f64,
    pub height: f64,
}

impl MapSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in projected map-point space.
///
/// The world spans `[0, MAP_WORLD_SIZE)` on both axes. A rectangle may extend
/// past the east edge of the world when it straddles the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRect {
    pub origin: Point,
    pub size: MapSize,
}

/// The currently visible map region
pub type Viewport = MapRect;

/// Rectangle in pixel space, used for clipping composited frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MapRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: MapSize::new(width, height),
        }
    }

    /// Builds the rectangle spanned by two geographic corners. When the
    /// south-west corner lies east of the north-east one the rectangle
    /// crosses the antimeridian and is extended past the world edge.
    pub fn from_coordinates(north_east: LatLng, south_west: LatLng) -> Self {
        let sw = south_west.to_map_point();
        let ne = north_east.to_map_point();
        let mut east = ne.x;
        if sw.x > ne.x {
            east += MAP_WORLD_SIZE;
        }
        Self::new(sw.x, ne.y, east - sw.x, sw.y - ne.y)
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn is_empty(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    /// True when the two rectangles share a region of non-zero area.
    /// Rectangles that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &MapRect) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    pub fn offset_by(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.origin.x + dx,
            self.origin.y + dy,
            self.size.width,
            self.size.height,
        )
    }

    /// Shifts the origin so that it lies inside the world on the x axis.
    pub fn normalized(&self) -> Self {
        let x = self.origin.x.rem_euclid(MAP_WORLD_SIZE);
        Self::new(x, self.origin.y, self.size.width, self.size.height)
    }

    /// Splits the rectangle into its four quadrants (NW, NE, SE, SW)
    pub fn subdivided(&self) -> [MapRect; 4] {
        let half_w = self.size.width * 0.5;
        let half_h = self.size.height * 0.5;
        let a = MapRect::new(self.origin.x, self.origin.y, half_w, half_h);
        [
            a,
            a.offset_by(half_w, 0.0),
            a.offset_by(half_w, half_h),
            a.offset_by(0.0, half_h),
        ]
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::from_map_point(Point::new(self.max_x(), self.min_y()))
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::from_map_point(Point::new(self.min_x(), self.max_y()))
    }

    pub fn north_west(&self) -> LatLng {
        LatLng::from_map_point(Point::new(self.min_x(), self.min_y()))
    }

    pub fn south_east(&self) -> LatLng {
        LatLng::from_map_point(Point::new(self.max_x(), self.max_y()))
    }

    /// Pixel sub-rectangle of an image covering `image_rect` that corresponds
    /// to this rectangle. The origin is floored to whole pixels.
    pub fn clip_rect(&self, image_rect: &MapRect, image_width: f64, image_height: f64) -> PixelRect {
        let clip_x = (self.min_x() - image_rect.min_x()) / image_rect.size.width * image_width;
        let clip_y = (self.min_y() - image_rect.min_y()) / image_rect.size.height * image_height;
        let x2 = (self.max_x() - image_rect.min_x()) / image_rect.size.width * image_width;
        let y2 = (self.max_y() - image_rect.min_y()) / image_rect.size.height * image_height;

        PixelRect {
            x: clip_x.floor(),
            y: clip_y.floor(),
            width: x2 - clip_x,
            height: y2 - clip_y,
        }
    }
}
