use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{concatenate, Array2, Array3, ArrayView2, Axis, ErrorKind, ShapeError, Zip};
use serde::Serialize;

use super::bounds::GeoBounds;
use crate::{crs_geo::Crs, errors::Result};

const DEFAULT_BINS: usize = 10;

fn incompatible() -> ShapeError {
    ShapeError::from_kind(ErrorKind::IncompatibleShape)
}

/// Stacked `(bands, height, width)` pixels with one shared validity mask.
///
/// `mask` is `true` where every band holds data.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub array: Array3<f64>,
    pub mask: Array2<bool>,
    pub band_names: Vec<String>,
    pub bounds: Option<GeoBounds>,
    pub assets: Vec<String>,
}

impl ImageData {
    pub fn new(array: Array3<f64>, mask: Array2<bool>, band_names: Vec<String>) -> Result<Self> {
        let (count, height, width) = array.dim();
        if count != band_names.len() || mask.dim() != (height, width) {
            return Err(incompatible().into());
        }
        Ok(Self {
            array,
            mask,
            band_names,
            bounds: None,
            assets: Vec::new(),
        })
    }

    /// Mask derived from a nodata value: pixels equal to it in any band are invalid.
    pub fn from_array(array: Array3<f64>, nodata: Option<f64>, band_names: Vec<String>) -> Result<Self> {
        let (_, height, width) = array.dim();
        let mut mask = Array2::from_elem((height, width), true);
        if let Some(nodata) = nodata {
            for band in array.outer_iter() {
                Zip::from(&mut mask)
                    .and(&band)
                    .for_each(|valid, &value| *valid &= value != nodata && !value.is_nan());
            }
        }
        Self::new(array, mask, band_names)
    }

    pub fn with_bounds(mut self, bounds: GeoBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_assets(mut self, assets: Vec<String>) -> Self {
        self.assets = assets;
        self
    }

    pub fn count(&self) -> usize {
        self.array.dim().0
    }

    pub fn height(&self) -> usize {
        self.array.dim().1
    }

    pub fn width(&self) -> usize {
        self.array.dim().2
    }

    pub fn band(&self, name: &str) -> Option<ArrayView2<f64>> {
        self.band_names
            .iter()
            .position(|band| band == name)
            .map(|index| self.array.index_axis(Axis(0), index))
    }

    /// Every pixel valid.
    pub fn is_full(&self) -> bool {
        self.mask.iter().all(|&valid| valid)
    }

    /// Stack single reads in order; a pixel stays valid only if valid everywhere.
    pub fn stack(images: Vec<ImageData>) -> Result<Self> {
        let first = images.first().ok_or_else(incompatible)?;
        let mut mask = first.mask.clone();
        for image in &images[1..] {
            if image.mask.dim() != mask.dim() {
                return Err(incompatible().into());
            }
            Zip::from(&mut mask)
                .and(&image.mask)
                .for_each(|valid, &other| *valid &= other);
        }
        let views = images.iter().map(|image| image.array.view()).collect_vec();
        let array = concatenate(Axis(0), &views)?;
        let bounds = first.bounds;
        let band_names = images.iter().flat_map(|image| image.band_names.clone()).collect();
        let assets = images
            .iter()
            .flat_map(|image| image.assets.clone())
            .unique()
            .collect();
        let mut stacked = Self::new(array, mask, band_names)?.with_assets(assets);
        stacked.bounds = bounds;
        Ok(stacked)
    }

    /// Name a single-band read after the catalog band it came from.
    pub fn relabel(mut self, band: &str, asset: String) -> Result<Self> {
        if self.count() != 1 {
            return Err(incompatible().into());
        }
        self.band_names = vec![band.into()];
        self.assets = vec![asset];
        Ok(self)
    }

    /// Keep only the first `count` bands.
    pub fn truncate(mut self, count: usize) -> Result<Self> {
        if count == 0 || count > self.count() {
            return Err(incompatible().into());
        }
        self.array = self.array.slice_axis(Axis(0), (0..count).into()).to_owned();
        self.band_names.truncate(count);
        Ok(self)
    }

    /// Per-band statistics over valid pixels.
    pub fn statistics(&self, bins: Option<usize>) -> IndexMap<String, BandStatistics> {
        self.band_names
            .iter()
            .zip(self.array.outer_iter())
            .map(|(name, band)| {
                let values = band
                    .iter()
                    .zip(self.mask.iter())
                    .filter_map(|(&value, &valid)| valid.then_some(value))
                    .collect_vec();
                let masked = band.len() - values.len();
                (name.clone(), BandStatistics::from_values(values, masked, bins))
            })
            .collect()
    }
}

/// Values of every requested band at one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointData {
    pub values: Vec<f64>,
    pub mask: Vec<bool>,
    pub band_names: Vec<String>,
    pub coordinates: (f64, f64),
    pub assets: Vec<String>,
}

impl PointData {
    pub fn new(values: Vec<f64>, mask: Vec<bool>, band_names: Vec<String>, coordinates: (f64, f64)) -> Result<Self> {
        if values.len() != mask.len() || values.len() != band_names.len() {
            return Err(incompatible().into());
        }
        Ok(Self {
            values,
            mask,
            band_names,
            coordinates,
            assets: Vec::new(),
        })
    }

    pub fn with_assets(mut self, assets: Vec<String>) -> Self {
        self.assets = assets;
        self
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_full(&self) -> bool {
        self.mask.iter().all(|&valid| valid)
    }

    pub fn stack(points: Vec<PointData>) -> Result<Self> {
        let first = points.first().ok_or_else(incompatible)?;
        let coordinates = first.coordinates;
        let mut stacked = Self::new(Vec::new(), Vec::new(), Vec::new(), coordinates)?;
        for point in points {
            stacked.values.extend(point.values);
            stacked.mask.extend(point.mask);
            stacked.band_names.extend(point.band_names);
            stacked.assets.extend(point.assets);
        }
        stacked.assets = stacked.assets.into_iter().unique().collect();
        Ok(stacked)
    }

    pub fn relabel(mut self, band: &str, asset: String) -> Result<Self> {
        if self.count() != 1 {
            return Err(incompatible().into());
        }
        self.band_names = vec![band.into()];
        self.assets = vec![asset];
        Ok(self)
    }

    pub fn truncate(mut self, count: usize) -> Result<Self> {
        if count == 0 || count > self.count() {
            return Err(incompatible().into());
        }
        self.values.truncate(count);
        self.mask.truncate(count);
        self.band_names.truncate(count);
        Ok(self)
    }
}

/// Dataset description as reported by the raster collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub bounds: GeoBounds,
    pub crs: Crs,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub band_descriptions: Vec<(String, String)>,
    pub dtype: String,
    pub nodata: Option<f64>,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub counts: Vec<f64>,
    pub edges: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: f64,
    pub sum: f64,
    pub std: f64,
    pub median: f64,
    pub majority: f64,
    pub minority: f64,
    pub unique: f64,
    pub histogram: Histogram,
    pub valid_percent: f64,
    pub masked_pixels: f64,
    pub valid_pixels: f64,
    pub percentile_2: f64,
    pub percentile_98: f64,
}

impl BandStatistics {
    pub fn from_values(mut values: Vec<f64>, masked: usize, bins: Option<usize>) -> Self {
        values.retain(|value| !value.is_nan());
        let total = values.len() + masked;
        let valid_percent = if total == 0 {
            0.
        } else {
            100. * values.len() as f64 / total as f64
        };
        if values.is_empty() {
            return Self {
                masked_pixels: masked as f64,
                valid_percent,
                ..Default::default()
            };
        }
        values.sort_by(f64::total_cmp);

        let count = values.len() as f64;
        let sum: f64 = values.iter().sum();
        let mean = sum / count;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        let (min, max) = (values[0], values[values.len() - 1]);

        let counts = values.iter().dedup_with_count().collect_vec();
        let majority = counts
            .iter()
            .fold((0, min), |best, &(n, &value)| if n > best.0 { (n, value) } else { best })
            .1;
        let minority = counts
            .iter()
            .fold((usize::MAX, min), |best, &(n, &value)| if n < best.0 { (n, value) } else { best })
            .1;

        Self {
            min,
            max,
            mean,
            count,
            sum,
            std: variance.sqrt(),
            median: percentile(&values, 50.),
            majority,
            minority,
            unique: counts.len() as f64,
            histogram: histogram(&values, bins.unwrap_or(DEFAULT_BINS).max(1)),
            valid_percent,
            masked_pixels: masked as f64,
            valid_pixels: count,
            percentile_2: percentile(&values, 2.),
            percentile_98: percentile(&values, 98.),
        }
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100. * (sorted.len() - 1) as f64;
    let (low, high) = (rank.floor() as usize, rank.ceil() as usize);
    sorted[low] + (sorted[high] - sorted[low]) * (rank - low as f64)
}

fn histogram(sorted: &[f64], bins: usize) -> Histogram {
    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    let width = if max > min { (max - min) / bins as f64 } else { 1. };
    let mut counts = vec![0.; bins];
    for value in sorted {
        let bin = (((value - min) / width) as usize).min(bins - 1);
        counts[bin] += 1.;
    }
    let edges = (0..=bins).map(|i| min + width * i as f64).collect();
    Histogram { counts, edges }
}
