use serde::{Deserialize, Serialize};

use super::{
    bounds::{GeoBounds, TileIndex, TileMatrixSet},
    image::{BandStatistics, ImageData, Info, PointData},
    reference::DatasetReference,
};
use crate::errors::Result;

pub const DEFAULT_TILE_SIZE: usize = 256;
pub const DEFAULT_MAX_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
}

/// Parameters passed through to every single-band read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub nodata: Option<f64>,
    pub resampling: Option<Resampling>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub max_size: Option<usize>,
    pub hist_bins: Option<usize>,
}

impl ReadOptions {
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = Some(resampling);
        self
    }

    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Fill the parameters the caller left unset from band-level defaults.
    pub fn with_defaults(&self, defaults: &BandDefaults) -> Self {
        Self {
            nodata: self.nodata.or(defaults.nodata),
            resampling: self.resampling.or(defaults.resampling),
            ..self.clone()
        }
    }

    /// (height, width) of a tile read.
    pub fn tile_shape(&self) -> (usize, usize) {
        (
            self.height.unwrap_or(DEFAULT_TILE_SIZE),
            self.width.unwrap_or(DEFAULT_TILE_SIZE),
        )
    }

    /// (height, width) of a whole-dataset read of `size` (width, height),
    /// fitting the longest side in `max_size` unless both sides are given.
    pub fn preview_shape(&self, size: (usize, usize)) -> (usize, usize) {
        if let (Some(width), Some(height)) = (self.width, self.height) {
            return (height, width);
        }
        let max_size = self.max_size.unwrap_or(DEFAULT_MAX_SIZE) as f64;
        let (width, height) = (size.0.max(1) as f64, size.1.max(1) as f64);
        let ratio = (max_size / width.max(height)).min(1.);
        (
            self.height.unwrap_or(((height * ratio).round() as usize).max(1)),
            self.width.unwrap_or(((width * ratio).round() as usize).max(1)),
        )
    }
}

/// Read parameters a catalog declares for one band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandDefaults {
    pub nodata: Option<f64>,
    pub resampling: Option<Resampling>,
}

impl BandDefaults {
    pub const NONE: Self = Self {
        nodata: None,
        resampling: None,
    };

    pub const fn nodata(nodata: f64) -> Self {
        Self {
            nodata: Some(nodata),
            resampling: None,
        }
    }

    /// Bit-packed quality bands: nearest neighbour with a sentinel nodata.
    pub const fn quality(nodata: f64) -> Self {
        Self {
            nodata: Some(nodata),
            resampling: Some(Resampling::Nearest),
        }
    }
}

/// Per-pixel conversion applied to every value read from a band.
pub trait BandHook: Send + Sync {
    fn convert(&self, band: &str, value: f64) -> f64;
}

/// Opens single-band rasters; decoding, reprojection and resampling live behind it.
pub trait RasterReader: Send + Sync {
    fn open(&self, reference: &DatasetReference) -> Result<Box<dyn RasterDataset>>;
}

/// An opened single-band raster. Dropping it releases the underlying handle.
pub trait RasterDataset: Send {
    fn info(&self) -> Result<Info>;

    fn statistics(&self, options: &ReadOptions) -> Result<BandStatistics>;

    fn tile(&self, tms: TileMatrixSet, tile: TileIndex, options: &ReadOptions) -> Result<ImageData>;

    fn part(&self, bbox: &GeoBounds, options: &ReadOptions) -> Result<ImageData>;

    fn preview(&self, options: &ReadOptions) -> Result<ImageData>;

    fn point(&self, lon: f64, lat: f64, options: &ReadOptions) -> Result<PointData>;
}
