//! GDAL implementation of the raster collaborator.
//!
//! Reads are window reads in the dataset's own CRS; requests in another
//! CRS are mapped to a pixel window of the source grid, not warped.

use geo::{AffineTransform, Coord};
use gdal::{
    errors::GdalError,
    raster::{RasterBand, ResampleAlg},
    Dataset as GdalDataset, Metadata as GdalMetadata,
};
use log::debug;
use ndarray::Array3;

use crate::{
    components::{
        bounds::{GeoBounds, TileIndex, TileMatrixSet},
        image::{BandStatistics, ImageData, Info, PointData},
        reader::{RasterDataset, RasterReader, ReadOptions, Resampling},
        reference::DatasetReference,
    },
    crs_geo::Crs,
    errors::{PdsError, Result},
};

const TILE_SIZE: f64 = 256.;
const EQUATOR_METERS: f64 = 40_075_016.685_578_5;

fn affine_from_gdal(gdal_transform: [f64; 6]) -> AffineTransform {
    AffineTransform::new(
        gdal_transform[1],
        gdal_transform[2],
        gdal_transform[0],
        gdal_transform[4],
        gdal_transform[5],
        gdal_transform[3],
    )
}

fn resample_alg(resampling: Resampling) -> ResampleAlg {
    match resampling {
        Resampling::Nearest => ResampleAlg::NearestNeighbour,
        Resampling::Bilinear => ResampleAlg::Bilinear,
        Resampling::Cubic => ResampleAlg::Cubic,
        Resampling::CubicSpline => ResampleAlg::CubicSpline,
        Resampling::Lanczos => ResampleAlg::Lanczos,
        Resampling::Average => ResampleAlg::Average,
        Resampling::Mode => ResampleAlg::Mode,
    }
}

/// GDAL messages meaning the object is not there, whatever the filesystem.
const MISSING_OBJECT: &[&str] = &[
    "does not exist",
    "No such file",
    "HTTP response code: 404",
];

/// Whether an open failure means the object is absent rather than broken.
fn is_missing_object(error: &GdalError) -> bool {
    let message = match error {
        GdalError::NullPointer { msg, .. } => msg,
        GdalError::CplError { msg, .. } => msg,
        _ => return false,
    };
    MISSING_OBJECT.iter().any(|pattern| message.contains(pattern))
}

/// Opens object references through GDAL's `/vsis3/`-style virtual paths.
#[derive(Debug, Default)]
pub struct GdalReader;

impl RasterReader for GdalReader {
    fn open(&self, reference: &DatasetReference) -> Result<Box<dyn RasterDataset>> {
        let path = reference.vsi_path();
        debug!("gdal open {path}");
        let dataset = GdalDataset::open(&path).map_err(|error| {
            if is_missing_object(&error) {
                debug!("{path} not found: {error}");
                PdsError::ObjectNotFound {
                    bucket: reference.bucket.clone(),
                    key: reference.key.clone(),
                }
            } else {
                error.into()
            }
        })?;
        let crs = dataset
            .spatial_ref()
            .and_then(|srs| srs.auth_code())
            .map(|code| Crs::epsg(code as u32))
            .unwrap_or(Crs::Wgs84);
        let transform = affine_from_gdal(dataset.geo_transform()?);
        Ok(Box::new(GdalRaster {
            name: reference.to_string(),
            dataset,
            crs,
            transform,
        }))
    }
}

/// One opened single-band dataset.
pub struct GdalRaster {
    name: String,
    dataset: GdalDataset,
    crs: Crs,
    transform: AffineTransform,
}

impl std::fmt::Debug for GdalRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdalRaster")
            .field("name", &self.name)
            .field("crs", &self.crs)
            .field("size", &self.dataset.raster_size())
            .finish()
    }
}

/// Pixel window `(col, row, width, height)` clipped to the raster.
type Window = (isize, isize, usize, usize);

impl GdalRaster {
    fn band(&self) -> Result<RasterBand> {
        Ok(self.dataset.rasterband(1)?)
    }

    fn bounds(&self) -> GeoBounds {
        let (width, height) = self.dataset.raster_size();
        let corner = |col: f64, row: f64| self.transform.apply(Coord { x: col, y: row });
        let (a, b) = (corner(0., 0.), corner(width as f64, height as f64));
        GeoBounds::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y), self.crs)
    }

    fn pixel(&self, coord: Coord) -> Option<Coord> {
        self.transform.inverse().map(|inverse| inverse.apply(coord))
    }

    /// Pixel window covering `bbox`, or `None` when it misses the raster.
    fn window(&self, bbox: &GeoBounds) -> Result<Option<Window>> {
        let bbox = bbox.to_crs(&self.crs)?;
        let (Some(a), Some(b)) = (self.pixel(bbox.rect.min()), self.pixel(bbox.rect.max())) else {
            return Ok(None);
        };
        let (width, height) = self.dataset.raster_size();
        let col_min = a.x.min(b.x).floor().max(0.);
        let row_min = a.y.min(b.y).floor().max(0.);
        let col_max = a.x.max(b.x).ceil().min(width as f64);
        let row_max = a.y.max(b.y).ceil().min(height as f64);
        if col_max <= col_min || row_max <= row_min {
            return Ok(None);
        }
        Ok(Some((
            col_min as isize,
            row_min as isize,
            (col_max - col_min) as usize,
            (row_max - row_min) as usize,
        )))
    }

    fn read(&self, window: Window, shape: (usize, usize), options: &ReadOptions) -> Result<ImageData> {
        let (col, row, width, height) = window;
        let band = self.band()?;
        let buffer = band.read_as::<f64>(
            (col, row),
            (width, height),
            (shape.1, shape.0),
            options.resampling.map(resample_alg),
        )?;
        let array = Array3::from_shape_vec((1, shape.0, shape.1), buffer.data().to_vec())?;
        let nodata = options.nodata.or(band.no_data_value());
        ImageData::from_array(array, nodata, vec!["b1".into()])
    }

    /// Web Mercator zooms matching the native and the overview resolution.
    fn zooms(&self) -> (u8, u8) {
        let (width, height) = self.dataset.raster_size();
        let mut resolution = self.transform.a().abs();
        if self.crs.is_geographic() {
            resolution *= EQUATOR_METERS / 360.;
        }
        let zoom = |resolution: f64| (EQUATOR_METERS / (TILE_SIZE * resolution)).log2().clamp(0., 24.);
        let maxzoom = zoom(resolution).ceil();
        let minzoom = zoom(resolution * width.max(height) as f64 / TILE_SIZE).floor();
        (minzoom.min(maxzoom) as u8, maxzoom as u8)
    }
}

impl RasterDataset for GdalRaster {
    fn info(&self) -> Result<Info> {
        let band = self.band()?;
        let (minzoom, maxzoom) = self.zooms();
        let (width, height) = self.dataset.raster_size();
        let band_descriptions = (1..=self.dataset.raster_count())
            .map(|index| {
                let description = self.dataset.rasterband(index)?.description()?;
                Ok((format!("b{index}"), description))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Info {
            bounds: self.bounds(),
            crs: self.crs,
            minzoom,
            maxzoom,
            band_descriptions,
            dtype: band.band_type().name().to_lowercase(),
            nodata: band.no_data_value(),
            width,
            height,
        })
    }

    fn statistics(&self, options: &ReadOptions) -> Result<BandStatistics> {
        let image = self.preview(options)?;
        Ok(image
            .statistics(options.hist_bins)
            .into_values()
            .next()
            .unwrap_or_default())
    }

    fn tile(&self, tms: TileMatrixSet, tile: TileIndex, options: &ReadOptions) -> Result<ImageData> {
        let window = self
            .window(&tms.bounds(tile))?
            .ok_or(PdsError::TileOutsideBounds {
                x: tile.x,
                y: tile.y,
                z: tile.z,
            })?;
        self.read(window, options.tile_shape(), options)
    }

    fn part(&self, bbox: &GeoBounds, options: &ReadOptions) -> Result<ImageData> {
        let window = self
            .window(bbox)?
            .ok_or_else(|| PdsError::OutsideBounds(format!("bbox {:?} is outside {}", bbox.as_tuple(), self.name)))?;
        self.read(window, options.preview_shape((window.2, window.3)), options)
    }

    fn preview(&self, options: &ReadOptions) -> Result<ImageData> {
        let (width, height) = self.dataset.raster_size();
        self.read((0, 0, width, height), options.preview_shape((width, height)), options)
    }

    fn point(&self, lon: f64, lat: f64, options: &ReadOptions) -> Result<PointData> {
        let outside = PdsError::PointOutsideBounds { lon, lat };
        let coord = self.crs.from_geographic(Coord { x: lon, y: lat })?;
        let pixel = self.pixel(coord).ok_or(outside)?;
        let (width, height) = self.dataset.raster_size();
        if !(0. ..width as f64).contains(&pixel.x) || !(0. ..height as f64).contains(&pixel.y) {
            return Err(PdsError::PointOutsideBounds { lon, lat });
        }
        let image = self.read((pixel.x as isize, pixel.y as isize, 1, 1), (1, 1), options)?;
        PointData::new(
            vec![image.array[[0, 0, 0]]],
            vec![image.mask[[0, 0]]],
            image.band_names,
            (lon, lat),
        )
    }
}
