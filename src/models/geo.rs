//! Geographic primitives: coordinates, bounds and slippy-map tile maths.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Edge length of a raster tile in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Web-mercator latitude limit.
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Project to world pixel coordinates at the given zoom.
    pub fn project(&self, zoom: f64) -> (f64, f64) {
        let scale = TILE_SIZE * 2f64.powf(zoom);
        let lat = self.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (self.lng + 180.0) / 360.0 * scale;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
        (x, y)
    }

    /// Inverse of [`LatLng::project`].
    pub fn unproject(x: f64, y: f64, zoom: f64) -> Self {
        let scale = TILE_SIZE * 2f64.powf(zoom);
        let lng = x / scale * 360.0 - 180.0;
        let n = PI - 2.0 * PI * y / scale;
        let lat = n.sinh().atan().to_degrees();
        Self { lat, lng }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lng)
    }
}

/// An axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl LatLngBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::new(first.lat, first.lng, first.lat, first.lng);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Grow the box to include `point`.
    pub fn extend(&mut self, point: LatLng) {
        self.south = self.south.min(point.lat);
        self.north = self.north.max(point.lat);
        self.west = self.west.min(point.lng);
        self.east = self.east.max(point.lng);
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }

    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north, self.west)
    }

    pub fn south_east(&self) -> LatLng {
        LatLng::new(self.south, self.east)
    }
}

/// A slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile containing `point` at `zoom`.
    pub fn containing(point: LatLng, zoom: u8) -> Self {
        let n = 2f64.powi(zoom as i32);
        let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = ((point.lng + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - lat.tan().asinh() / PI) / 2.0 * n).floor();
        let max = n - 1.0;
        Self {
            z: zoom,
            x: x.clamp(0.0, max) as u32,
            y: y.clamp(0.0, max) as u32,
        }
    }

    /// Relative path of this tile inside a bundle: `{z}/{x}/{y}.png`.
    pub fn path(&self) -> String {
        format!("{}/{}/{}.png", self.z, self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRange {
    /// Tiles covering `bounds` at `zoom`.
    pub fn covering(bounds: &LatLngBounds, zoom: u8) -> Self {
        let a = TileCoord::containing(bounds.north_west(), zoom);
        let b = TileCoord::containing(bounds.south_east(), zoom);
        Self {
            z: zoom,
            x_min: a.x.min(b.x),
            x_max: a.x.max(b.x),
            y_min: a.y.min(b.y),
            y_max: a.y.max(b.y),
        }
    }

    /// Tiles visible in a `width` x `height` pixel viewport centred on `center`.
    pub fn viewport(center: LatLng, zoom: u8, width: u32, height: u32) -> Self {
        let (cx, cy) = center.project(zoom as f64);
        let max = (1u64 << zoom).saturating_sub(1) as f64;
        let to_tile = |pixel: f64| (pixel / TILE_SIZE).floor().clamp(0.0, max) as u32;
        let (half_w, half_h) = (width as f64 / 2.0, height as f64 / 2.0);
        Self {
            z: zoom,
            x_min: to_tile(cx - half_w),
            x_max: to_tile(cx + half_w),
            y_min: to_tile(cy - half_h),
            y_max: to_tile(cy + half_h),
        }
    }

    pub fn count(&self) -> usize {
        let width = (self.x_max - self.x_min + 1) as usize;
        let height = (self.y_max - self.y_min + 1) as usize;
        width * height
    }

    /// Column-major iteration (x outer, y inner).
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.x_min..=self.x_max)
            .flat_map(move |x| (self.y_min..=self.y_max).map(move |y| TileCoord::new(self.z, x, y)))
    }
}
