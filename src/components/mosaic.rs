use log::debug;
use ndarray::{Axis, Zip};
use rayon::{prelude::*, ThreadPool};
use serde::{Deserialize, Serialize};

use super::{
    image::{ImageData, PointData},
    reference::DatasetReference,
};
use crate::errors::{PdsError, Result};

/// How overlapping candidates fill the mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelSelection {
    /// Keep the first valid value; stop once every pixel is valid.
    #[default]
    First,
    Highest,
    Lowest,
}

impl PixelSelection {
    fn pick(self, current: f64, other: f64) -> f64 {
        match self {
            Self::First => current,
            Self::Highest => current.max(other),
            Self::Lowest => current.min(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicOptions {
    /// Try candidates from last to first.
    pub reverse: bool,
    pub selection: PixelSelection,
}

/// Read results that can be layered on top of each other.
pub trait Mosaicable: Sized + Send {
    fn is_full(&self) -> bool;

    /// Fold `other` into `self`; `self` holds the higher priority data.
    fn merge(&mut self, other: Self, selection: PixelSelection) -> Result<()>;
}

fn merge_pixel(values: &mut [f64], valid: &mut bool, other: &[f64], other_valid: bool, selection: PixelSelection) {
    if !other_valid {
        return;
    }
    if *valid {
        for (value, other) in values.iter_mut().zip(other) {
            *value = selection.pick(*value, *other);
        }
    } else {
        values.copy_from_slice(other);
        *valid = true;
    }
}

impl Mosaicable for ImageData {
    fn is_full(&self) -> bool {
        ImageData::is_full(self)
    }

    fn merge(&mut self, other: Self, selection: PixelSelection) -> Result<()> {
        if other.array.dim() != self.array.dim() {
            return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        Zip::from(self.array.lanes_mut(Axis(0)))
            .and(&mut self.mask)
            .and(other.array.lanes(Axis(0)))
            .and(&other.mask)
            .for_each(|mut values, valid, others, &other_valid| {
                let mut merged = values.to_vec();
                merge_pixel(&mut merged, valid, &others.to_vec(), other_valid, selection);
                values
                    .iter_mut()
                    .zip(merged)
                    .for_each(|(value, merged)| *value = merged);
            });
        self.assets.extend(other.assets);
        Ok(())
    }
}

impl Mosaicable for PointData {
    fn is_full(&self) -> bool {
        PointData::is_full(self)
    }

    fn merge(&mut self, other: Self, selection: PixelSelection) -> Result<()> {
        if other.count() != self.count() {
            return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        for ((value, valid), (other, other_valid)) in self
            .values
            .iter_mut()
            .zip(self.mask.iter_mut())
            .zip(other.values.iter().zip(&other.mask))
        {
            merge_pixel(std::slice::from_mut(value), valid, &[*other], *other_valid, selection);
        }
        self.assets.extend(other.assets);
        Ok(())
    }
}

/// Read `assets` in priority order, `threads` at a time, and layer the results.
///
/// Candidates failing with an expected absence (outside bounds, missing
/// object) are skipped; any other failure aborts the read. With
/// [`PixelSelection::First`] reading stops as soon as the mosaic is full.
pub fn mosaic_reader<T, F>(
    pool: &ThreadPool,
    assets: &[DatasetReference],
    threads: usize,
    options: MosaicOptions,
    read: F,
) -> Result<T>
where
    T: Mosaicable,
    F: Fn(&DatasetReference) -> Result<T> + Sync,
{
    let mut ordered = assets.iter().collect::<Vec<_>>();
    if options.reverse {
        ordered.reverse();
    }
    let mut mosaic: Option<T> = None;
    for chunk in ordered.chunks(threads.max(1)) {
        let results = pool.install(|| chunk.par_iter().map(|asset| read(asset)).collect::<Vec<_>>());
        for (asset, result) in chunk.iter().zip(results) {
            match result {
                Ok(data) => match mosaic.as_mut() {
                    Some(mosaic) => mosaic.merge(data, options.selection)?,
                    None => mosaic = Some(data),
                },
                Err(error) if error.is_expected_absence() => debug!("skipping {asset}: {error}"),
                Err(error) => return Err(error),
            }
        }
        if options.selection == PixelSelection::First && mosaic.as_ref().is_some_and(T::is_full) {
            break;
        }
    }
    mosaic.ok_or_else(|| {
        PdsError::OutsideBounds(format!("no data found in {} candidate assets", assets.len()))
    })
}
