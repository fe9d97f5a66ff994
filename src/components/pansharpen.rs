use ndarray::{Axis, Zip};

use super::image::{ImageData, PointData};
use crate::errors::{PdsError, Result};

pub const DEFAULT_WEIGHT: f64 = 0.2;

/// Brovey ratio for one pixel: `pan / ((sum(bands[..n-1]) + bands[n-1] * w) / (n - 1 + w))`.
fn ratio(values: impl ExactSizeIterator<Item = f64>, pan: f64, weight: f64) -> f64 {
    let count = values.len();
    let weighted: f64 = values
        .enumerate()
        .map(|(i, value)| if i + 1 == count { value * weight } else { value })
        .sum();
    pan / (weighted / (count as f64 - 1. + weight))
}

/// Sharpen every band with the last one, a panchromatic read, then drop it.
///
/// Negative or undefined results clip to zero.
pub fn brovey(image: ImageData, weight: f64) -> Result<ImageData> {
    let count = image.count();
    if count < 2 {
        return Err(PdsError::Pansharpen(count));
    }
    let mut sharpened = image;
    let (mut colors, pan) = sharpened.array.view_mut().split_at(Axis(0), count - 1);
    let pan = pan.index_axis_move(Axis(0), 0);
    Zip::from(colors.lanes_mut(Axis(0)))
        .and(&pan)
        .for_each(|mut lane, &pan| {
            let ratio = ratio(lane.iter().copied(), pan, weight);
            lane.mapv_inplace(|value| (value * ratio).max(0.));
        });
    sharpened.truncate(count - 1)
}

pub fn brovey_point(point: PointData, weight: f64) -> Result<PointData> {
    let count = point.count();
    if count < 2 {
        return Err(PdsError::Pansharpen(count));
    }
    let mut sharpened = point;
    let pan = sharpened.values[count - 1];
    let ratio = ratio(sharpened.values[..count - 1].iter().copied(), pan, weight);
    for value in &mut sharpened.values[..count - 1] {
        *value = (*value * ratio).max(0.);
    }
    sharpened.truncate(count - 1)
}
