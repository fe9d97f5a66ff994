//! In-memory collaborators for unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use geo::Coord;
use ndarray::{Array2, Array3};
use serde_json::Value;

use crate::{
    components::{
        bounds::{GeoBounds, TileIndex, TileMatrixSet},
        fetch::{not_found, ObjectFetch},
        image::{BandStatistics, ImageData, Info, PointData},
        reader::{RasterDataset, RasterReader, ReadOptions},
        reference::DatasetReference,
    },
    errors::{PdsError, Result},
    intersection::Intersection,
};

const PREVIEW_SIZE: (usize, usize) = (4, 4);

#[derive(Debug, Clone, Copy)]
struct MockBand {
    value: f64,
    masked_rows: usize,
    bounds: GeoBounds,
    zooms: (u8, u8),
}

/// Every band is a constant raster; reads are recorded with their options.
#[derive(Default)]
pub struct MockReader {
    bands: HashMap<String, MockBand>,
    failures: HashSet<String>,
    calls: Arc<Mutex<Vec<(String, ReadOptions)>>>,
}

impl MockReader {
    pub fn with_band(self, url: &str, value: f64) -> Self {
        self.with_raster(url, value, 0, GeoBounds::geographic(-180., -90., 180., 90.))
    }

    /// Band whose first `masked_rows` rows hold no data, covering `bounds`.
    pub fn with_raster(mut self, url: &str, value: f64, masked_rows: usize, bounds: GeoBounds) -> Self {
        self.bands.insert(
            url.into(),
            MockBand {
                value,
                masked_rows,
                bounds,
                zooms: (0, 24),
            },
        );
        self
    }

    pub fn with_zooms(mut self, url: &str, minzoom: u8, maxzoom: u8) -> Self {
        if let Some(band) = self.bands.get_mut(url) {
            band.zooms = (minzoom, maxzoom);
        }
        self
    }

    /// Opening `url` fails with a decoder error.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.failures.insert(url.into());
        self
    }

    pub fn calls(&self) -> Vec<(String, ReadOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl RasterReader for MockReader {
    fn open(&self, reference: &DatasetReference) -> Result<Box<dyn RasterDataset>> {
        let url = reference.to_string();
        if self.failures.contains(&url) {
            return Err(PdsError::upstream(std::io::Error::other(format!("cannot decode {url}"))));
        }
        let band = *self
            .bands
            .get(&url)
            .ok_or_else(|| not_found(&reference.bucket, &reference.key))?;
        Ok(Box::new(MockDataset {
            url,
            band,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct MockDataset {
    url: String,
    band: MockBand,
    calls: Arc<Mutex<Vec<(String, ReadOptions)>>>,
}

impl MockDataset {
    fn record(&self, options: &ReadOptions) {
        self.calls.lock().unwrap().push((self.url.clone(), options.clone()));
    }

    fn image(&self, (height, width): (usize, usize), options: &ReadOptions) -> Result<ImageData> {
        let mut mask = Array2::from_elem((height, width), options.nodata != Some(self.band.value));
        for row in 0..self.band.masked_rows.min(height) {
            mask.row_mut(row).fill(false);
        }
        ImageData::new(
            Array3::from_elem((1, height, width), self.band.value),
            mask,
            vec!["b1".into()],
        )
    }
}

impl RasterDataset for MockDataset {
    fn info(&self) -> Result<Info> {
        Ok(Info {
            bounds: self.band.bounds,
            crs: self.band.bounds.crs,
            minzoom: self.band.zooms.0,
            maxzoom: self.band.zooms.1,
            band_descriptions: vec![("b1".into(), String::new())],
            dtype: "uint16".into(),
            nodata: None,
            width: PREVIEW_SIZE.1,
            height: PREVIEW_SIZE.0,
        })
    }

    fn statistics(&self, options: &ReadOptions) -> Result<BandStatistics> {
        let image = self.preview(options)?;
        Ok(image.statistics(options.hist_bins).into_values().next().unwrap_or_default())
    }

    fn tile(&self, tms: TileMatrixSet, tile: TileIndex, options: &ReadOptions) -> Result<ImageData> {
        self.record(options);
        if !self.band.bounds.rect.intersects(&tms.geographic_bounds(tile).rect) {
            return Err(PdsError::TileOutsideBounds {
                x: tile.x,
                y: tile.y,
                z: tile.z,
            });
        }
        self.image(options.tile_shape(), options)
    }

    fn part(&self, bbox: &GeoBounds, options: &ReadOptions) -> Result<ImageData> {
        self.record(options);
        self.band.bounds.rect.intersection(&bbox.to_geographic()?.rect)?;
        self.image(options.preview_shape(PREVIEW_SIZE), options)
    }

    fn preview(&self, options: &ReadOptions) -> Result<ImageData> {
        self.record(options);
        self.image(options.preview_shape(PREVIEW_SIZE), options)
    }

    fn point(&self, lon: f64, lat: f64, options: &ReadOptions) -> Result<PointData> {
        self.record(options);
        if !self.band.bounds.contains_point(Coord { x: lon, y: lat }) {
            return Err(PdsError::PointOutsideBounds { lon, lat });
        }
        let valid = self.band.masked_rows == 0 && options.nodata != Some(self.band.value);
        PointData::new(vec![self.band.value], vec![valid], vec!["b1".into()], (lon, lat))
    }
}

/// Object store backed by a map; every fetch is recorded.
#[derive(Default)]
pub struct MockFetch {
    objects: HashMap<(String, String), Bytes>,
    calls: Mutex<Vec<(String, String, bool)>>,
}

impl MockFetch {
    pub fn with_object(mut self, bucket: &str, key: &str, body: impl Into<Bytes>) -> Self {
        self.objects.insert((bucket.into(), key.into()), body.into());
        self
    }

    pub fn with_json(self, bucket: &str, key: &str, json: &Value) -> Self {
        let body = json.to_string();
        self.with_object(bucket, key, body)
    }

    pub fn calls(&self) -> Vec<(String, String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ObjectFetch for MockFetch {
    fn fetch(&self, bucket: &str, key: &str, request_pays: bool) -> Result<Bytes> {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.into(), key.into(), request_pays));
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }
}
