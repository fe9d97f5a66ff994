use std::collections::HashMap;

use indexmap::IndexMap;

use super::mtl;
use crate::{components::reader::BandHook, errors::Result};

const REFLECTANCE_BANDS: [&str; 9] = ["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B9"];
const THERMAL_BANDS: [&str; 2] = ["B10", "B11"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Conversion {
    /// `10000 * (m * dn + a) / sin(sun elevation)`
    Reflectance { mult: f64, add: f64 },
    /// `k2 / ln(k1 / (m * dn + a) + 1)`, in Kelvin.
    BrightnessTemperature { mult: f64, add: f64, k1: f64, k2: f64 },
}

/// Digital numbers to top-of-atmosphere reflectance (x 10000) or brightness
/// temperature, driven by the scene's MTL coefficients.
///
/// A DN of 0 is nodata and stays 0. Bands without coefficients pass through.
#[derive(Debug, Clone, PartialEq)]
pub struct TopOfAtmosphere {
    sun_elevation: f64,
    conversions: HashMap<String, Conversion>,
}

impl TopOfAtmosphere {
    pub fn from_mtl(properties: &IndexMap<String, String>) -> Result<Self> {
        let sun_elevation = mtl::number(properties, "IMAGE_ATTRIBUTES.SUN_ELEVATION")?;
        let value = |key: String| mtl::number(properties, &key).ok();
        let mut conversions = HashMap::new();
        for band in REFLECTANCE_BANDS {
            let number = &band[1..];
            let mult = value(format!("RADIOMETRIC_RESCALING.REFLECTANCE_MULT_BAND_{number}"));
            let add = value(format!("RADIOMETRIC_RESCALING.REFLECTANCE_ADD_BAND_{number}"));
            if let (Some(mult), Some(add)) = (mult, add) {
                conversions.insert(band.to_string(), Conversion::Reflectance { mult, add });
            }
        }
        for band in THERMAL_BANDS {
            let number = &band[1..];
            let coefficients = (
                value(format!("RADIOMETRIC_RESCALING.RADIANCE_MULT_BAND_{number}")),
                value(format!("RADIOMETRIC_RESCALING.RADIANCE_ADD_BAND_{number}")),
                value(format!("TIRS_THERMAL_CONSTANTS.K1_CONSTANT_BAND_{number}")),
                value(format!("TIRS_THERMAL_CONSTANTS.K2_CONSTANT_BAND_{number}")),
            );
            if let (Some(mult), Some(add), Some(k1), Some(k2)) = coefficients {
                conversions.insert(
                    band.to_string(),
                    Conversion::BrightnessTemperature { mult, add, k1, k2 },
                );
            }
        }
        Ok(Self {
            sun_elevation,
            conversions,
        })
    }
}

impl BandHook for TopOfAtmosphere {
    fn convert(&self, band: &str, value: f64) -> f64 {
        if value == 0. {
            return 0.;
        }
        match self.conversions.get(band) {
            Some(Conversion::Reflectance { mult, add }) => {
                let reflectance = (mult * value + add) / self.sun_elevation.to_radians().sin();
                (10000. * reflectance).clamp(0., f64::from(u16::MAX)).trunc()
            }
            Some(Conversion::BrightnessTemperature { mult, add, k1, k2 }) => {
                k2 / (k1 / (mult * value + add) + 1.).ln()
            }
            None => value,
        }
    }
}
