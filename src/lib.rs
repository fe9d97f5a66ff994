//! Scene-id driven readers for public earth-observation buckets.
//!
//! A scene id such as `LC08_L2SP_001062_20201031_20201106_02_T2` is parsed
//! by its family's grammar, the layout of the hosting bucket turns the
//! parsed fields into object keys, and the band rasters behind those keys
//! are read in parallel and stacked into one [`ImageData`].

pub mod components;
pub mod config;
pub mod crs_geo;
pub mod errors;
pub mod intersection;
pub mod sensors;

#[cfg(feature = "gdal")]
pub mod backends;

#[cfg(test)]
mod testing;

pub use components::{
    bounds::{GeoBounds, SpatialEnvelope, TileIndex, TileMatrixSet},
    image::{BandStatistics, ImageData, Info, PointData},
    mosaic::{MosaicOptions, PixelSelection},
    reader::{ReadOptions, Resampling},
    scene::{BandRequest, Collaborators, SceneReader},
};
pub use config::ReaderConfig;
pub use crs_geo::Crs;
pub use errors::{PdsError, Result};
pub use sensors::{collection_for_scene, open, DemMosaic};
