use std::f64::consts::PI;

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::{crs_geo::Crs, errors::Result, intersection::Intersection};

const MERCATOR_HALF_EXTENT: f64 = 20_037_508.342_789_244;

/// Rectangle tagged with the CRS its coordinates live in.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    #[shrinkwrap(main_field)]
    pub rect: Rect,
    pub crs: Crs,
}

impl GeoBounds {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, crs: Crs) -> Self {
        Self {
            rect: Rect::new(Coord { x: xmin, y: ymin }, Coord { x: xmax, y: ymax }),
            crs,
        }
    }

    pub fn geographic(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::new(xmin, ymin, xmax, ymax, Crs::Wgs84)
    }

    /// (xmin, ymin, xmax, ymax)
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        let (min, max) = (self.rect.min(), self.rect.max());
        (min.x, min.y, max.x, max.y)
    }

    pub fn center(&self) -> Coord {
        self.rect.center()
    }

    pub fn to_crs(&self, crs: &Crs) -> Result<Self> {
        Ok(Self {
            rect: self.crs.transform_bounds(crs, &self.rect)?,
            crs: *crs,
        })
    }

    pub fn to_geographic(&self) -> Result<Self> {
        self.to_crs(&Crs::Wgs84)
    }

    /// Whether both bounds overlap once expressed in `self`'s CRS.
    pub fn overlaps(&self, other: &GeoBounds) -> Result<bool> {
        let other = other.to_crs(&self.crs)?;
        Ok(self.rect.intersects(&other.rect))
    }

    pub fn contains_point(&self, coord: Coord) -> bool {
        let (min, max) = (self.rect.min(), self.rect.max());
        (min.x..=max.x).contains(&coord.x) && (min.y..=max.y).contains(&coord.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileIndex {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }
}

/// Tile pyramids the readers can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileMatrixSet {
    #[default]
    WebMercatorQuad,
    WorldCrs84Quad,
}

impl TileMatrixSet {
    pub fn crs(&self) -> Crs {
        match self {
            Self::WebMercatorQuad => Crs::WebMercator,
            Self::WorldCrs84Quad => Crs::Wgs84,
        }
    }

    /// Tile bounds in the pyramid's own CRS.
    pub fn bounds(&self, tile: TileIndex) -> GeoBounds {
        match self {
            Self::WebMercatorQuad => {
                let size = 2.0 * MERCATOR_HALF_EXTENT / 2f64.powi(tile.z.into());
                let xmin = -MERCATOR_HALF_EXTENT + tile.x as f64 * size;
                let ymax = MERCATOR_HALF_EXTENT - tile.y as f64 * size;
                GeoBounds::new(xmin, ymax - size, xmin + size, ymax, self.crs())
            }
            Self::WorldCrs84Quad => {
                let size = 180.0 / 2f64.powi(tile.z.into());
                let xmin = -180.0 + tile.x as f64 * size;
                let ymax = 90.0 - tile.y as f64 * size;
                GeoBounds::new(xmin, ymax - size, xmin + size, ymax, self.crs())
            }
        }
    }

    /// Tile bounds as longitude/latitude.
    pub fn geographic_bounds(&self, tile: TileIndex) -> GeoBounds {
        match self {
            Self::WebMercatorQuad => {
                let n = 2f64.powi(tile.z.into());
                let lon = |x: f64| x / n * 360.0 - 180.0;
                let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
                let (x, y) = (tile.x as f64, tile.y as f64);
                GeoBounds::geographic(lon(x), lat(y + 1.0), lon(x + 1.0), lat(y))
            }
            Self::WorldCrs84Quad => self.bounds(tile),
        }
    }

    /// Zooms whose matrix size overflows `u64` are never valid.
    pub fn is_valid(&self, tile: TileIndex) -> bool {
        let Some(n) = 1u64.checked_shl(tile.z.into()).filter(|&n| n != 0) else {
            return false;
        };
        let width = match self {
            Self::WebMercatorQuad => Some(n),
            Self::WorldCrs84Quad => n.checked_mul(2),
        };
        width.is_some_and(|width| u64::from(tile.x) < width) && u64::from(tile.y) < n
    }
}

/// Spatial metadata attached to an opened dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEnvelope {
    pub bounds: GeoBounds,
    pub minzoom: u8,
    pub maxzoom: u8,
}

impl SpatialEnvelope {
    pub fn new(bounds: GeoBounds, minzoom: u8, maxzoom: u8) -> Self {
        Self {
            bounds,
            minzoom,
            maxzoom,
        }
    }

    /// Geographic bounds when the envelope CRS can be converted in-crate.
    pub fn geographic_bounds(&self) -> Option<GeoBounds> {
        self.bounds.to_geographic().ok()
    }

    /// Dataset center + minzoom.
    pub fn center(&self) -> (f64, f64, u8) {
        let center = self
            .geographic_bounds()
            .unwrap_or(self.bounds)
            .center();
        (center.x, center.y, self.minzoom)
    }
}
