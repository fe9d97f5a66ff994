//! Copernicus global DEM, stored as one Cloud Optimized GeoTIFF per
//! 1 x 1 degree cell and read as a mosaic.

use std::sync::Arc;

use geo::Coord;
use indexmap::IndexMap;
use log::{debug, info};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    components::{
        bounds::{GeoBounds, SpatialEnvelope, TileIndex, TileMatrixSet},
        image::{BandStatistics, ImageData, Info, PointData},
        mosaic::{mosaic_reader, MosaicOptions},
        reader::{RasterReader, ReadOptions},
        reference::DatasetReference,
        scene::Collaborators,
    },
    config::ReaderConfig,
    crs_geo::Crs,
    errors::{PdsError, Result},
};

/// One resolution of the DEM grid.
#[derive(Debug)]
pub struct DemGrid {
    pub name: &'static str,
    pub bucket: &'static str,
    /// Arc-second code in the file names (`10` for 30 m, `30` for 90 m).
    pub code: &'static str,
    pub minzoom: u8,
    pub maxzoom: u8,
    /// Lon/lat of the cell describing the whole grid.
    pub statistics_cell: (f64, f64),
}

pub static COPERNICUS_DEM_30: DemGrid = DemGrid {
    name: "copernicus-dem-30m",
    bucket: "copernicus-dem-30m",
    code: "10",
    minzoom: 7,
    maxzoom: 8,
    statistics_cell: (6., 0.),
};

pub static COPERNICUS_DEM_90: DemGrid = DemGrid {
    name: "copernicus-dem-90m",
    bucket: "copernicus-dem-90m",
    code: "30",
    minzoom: 6,
    maxzoom: 7,
    statistics_cell: (-164., -90.),
};

impl DemGrid {
    /// Name of the cell holding `lon`/`lat`: hemisphere from the sign,
    /// degrees from the truncated magnitude.
    pub fn cell_name(&self, lon: f64, lat: f64) -> String {
        let north_south = if lat >= 0. { 'N' } else { 'S' };
        let east_west = if lon < 0. { 'W' } else { 'E' };
        format!(
            "Copernicus_DSM_COG_{}_{north_south}{:02}_00_{east_west}{:03}_00_DEM",
            self.code,
            lat.abs().floor() as u32,
            lon.abs().floor() as u32,
        )
    }

    pub fn cell(&self, bucket: &str, lon: f64, lat: f64) -> DatasetReference {
        let name = self.cell_name(lon, lat);
        DatasetReference::s3(bucket, format!("{name}/{name}.tif"))
    }
}

/// Global DEM reader: every operation enumerates candidate cells and
/// reads them through [`mosaic_reader`].
pub struct DemMosaic {
    grid: &'static DemGrid,
    bucket: String,
    envelope: SpatialEnvelope,
    tms: TileMatrixSet,
    threads: usize,
    options: MosaicOptions,
    raster: Arc<dyn RasterReader>,
    pool: ThreadPool,
}

impl std::fmt::Debug for DemMosaic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemMosaic")
            .field("grid", &self.grid.name)
            .field("bucket", &self.bucket)
            .field("envelope", &self.envelope)
            .field("tms", &self.tms)
            .field("threads", &self.threads)
            .field("options", &self.options)
            .finish()
    }
}

impl DemMosaic {
    pub fn open(grid: &'static DemGrid, collaborators: &Collaborators, config: &ReaderConfig) -> Result<Self> {
        let envelope = SpatialEnvelope::new(
            GeoBounds::geographic(-180., -90., 180., 90.),
            config.minzoom.unwrap_or(grid.minzoom),
            config.maxzoom.unwrap_or(grid.maxzoom),
        );
        let pool = ThreadPoolBuilder::new().num_threads(config.concurrency).build()?;
        let mosaic = Self {
            grid,
            bucket: config.bucket.clone().unwrap_or_else(|| grid.bucket.to_string()),
            envelope,
            tms: config.tile_matrix_set,
            threads: config.concurrency,
            options: MosaicOptions::default(),
            raster: Arc::clone(&collaborators.raster),
            pool,
        };
        info!("opened {mosaic:?}");
        Ok(mosaic)
    }

    pub fn with_mosaic_options(mut self, options: MosaicOptions) -> Self {
        self.options = options;
        self
    }

    pub fn envelope(&self) -> &SpatialEnvelope {
        &self.envelope
    }

    pub fn center(&self) -> (f64, f64, u8) {
        self.envelope.center()
    }

    /// Static description; no cell is opened.
    pub fn info(&self) -> Info {
        Info {
            bounds: self.envelope.bounds,
            crs: Crs::Wgs84,
            minzoom: self.envelope.minzoom,
            maxzoom: self.envelope.maxzoom,
            band_descriptions: vec![("b1".into(), String::new())],
            dtype: "float32".into(),
            nodata: None,
            width: 0,
            height: 0,
        }
    }

    /// Statistics of the grid's representative cell only.
    pub fn statistics(&self, options: &ReadOptions) -> Result<IndexMap<String, BandStatistics>> {
        let (lon, lat) = self.grid.statistics_cell;
        let reference = self.grid.cell(&self.bucket, lon, lat);
        debug!("statistics from {reference}");
        let statistics = self.raster.open(&reference)?.statistics(options)?;
        Ok(IndexMap::from([("b1".to_string(), statistics)]))
    }

    pub fn assets_for_point(&self, lon: f64, lat: f64) -> Vec<DatasetReference> {
        vec![self.grid.cell(&self.bucket, lon, lat)]
    }

    /// Every cell touched by `bbox`, edges included, longitude-major.
    pub fn assets_for_bbox(&self, bbox: &GeoBounds) -> Result<Vec<DatasetReference>> {
        let (xmin, ymin, xmax, ymax) = bbox.to_geographic()?.as_tuple();
        let (xmin, xmax) = (xmin.floor() as i32, xmax.floor() as i32);
        let (ymin, ymax) = (ymin.floor() as i32, ymax.floor() as i32);
        Ok((xmin..=xmax)
            .flat_map(|lon| (ymin..=ymax).map(move |lat| (lon, lat)))
            .map(|(lon, lat)| self.grid.cell(&self.bucket, f64::from(lon), f64::from(lat)))
            .collect())
    }

    pub fn assets_for_tile(&self, tile: TileIndex) -> Result<Vec<DatasetReference>> {
        self.assets_for_bbox(&self.tms.geographic_bounds(tile))
    }

    pub fn tile(&self, tile: TileIndex, options: &ReadOptions) -> Result<ImageData> {
        if !self.tms.is_valid(tile) {
            return Err(PdsError::TileOutsideBounds {
                x: tile.x,
                y: tile.y,
                z: tile.z,
            });
        }
        let assets = self.assets_for_tile(tile)?;
        let tms = self.tms;
        let image = mosaic_reader(&self.pool, &assets, self.threads, self.options, |asset| {
            Ok(self
                .raster
                .open(asset)?
                .tile(tms, tile, options)?
                .with_assets(vec![asset.to_string()]))
        })?;
        Ok(image.with_bounds(tms.bounds(tile)))
    }

    pub fn part(&self, bbox: &GeoBounds, options: &ReadOptions) -> Result<ImageData> {
        let assets = self.assets_for_bbox(bbox)?;
        let image = mosaic_reader(&self.pool, &assets, self.threads, self.options, |asset| {
            Ok(self
                .raster
                .open(asset)?
                .part(bbox, options)?
                .with_assets(vec![asset.to_string()]))
        })?;
        Ok(image.with_bounds(*bbox))
    }

    pub fn point(&self, lon: f64, lat: f64, options: &ReadOptions) -> Result<PointData> {
        if !self.envelope.bounds.contains_point(Coord { x: lon, y: lat }) {
            return Err(PdsError::PointOutsideBounds { lon, lat });
        }
        let assets = self.assets_for_point(lon, lat);
        mosaic_reader(&self.pool, &assets, self.threads, self.options, |asset| {
            Ok(self
                .raster
                .open(asset)?
                .point(lon, lat, options)?
                .with_assets(vec![asset.to_string()]))
        })
    }
}
