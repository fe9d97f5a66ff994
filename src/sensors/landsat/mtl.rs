use indexmap::IndexMap;

use crate::{
    components::bounds::GeoBounds,
    errors::{PdsError, Result},
};

/// Flatten an MTL document into `GROUP.KEY` entries, keyed by the innermost group.
///
/// Quoted values are unquoted; `END`, blank and malformed lines are skipped.
pub fn parse(text: &str) -> IndexMap<String, String> {
    let mut groups: Vec<&str> = Vec::new();
    let mut properties = IndexMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "GROUP" => groups.push(value),
            "END_GROUP" => {
                groups.pop();
            }
            key => {
                let group = groups.last().copied().unwrap_or_default();
                properties.insert(format!("{group}.{key}"), value.trim_matches('"').to_string());
            }
        }
    }
    properties
}

pub fn number(properties: &IndexMap<String, String>, key: &str) -> Result<f64> {
    properties
        .get(key)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| PdsError::metadata("MTL", key))
}

/// Scene footprint from the product corner coordinates.
pub fn bounds(properties: &IndexMap<String, String>) -> Result<GeoBounds> {
    let corner = |name: &str| number(properties, &format!("PRODUCT_METADATA.CORNER_{name}_PRODUCT"));
    Ok(GeoBounds::geographic(
        corner("LL_LON")?.min(corner("UL_LON")?),
        corner("LL_LAT")?.min(corner("LR_LAT")?),
        corner("UR_LON")?.max(corner("LR_LON")?),
        corner("UL_LAT")?.max(corner("UR_LAT")?),
    ))
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"GROUP = L1_METADATA_FILE
  GROUP = METADATA_FILE_INFO
    ORIGIN = "Image courtesy of the U.S. Geological Survey"
    LANDSAT_PRODUCT_ID = "LC08_L1TP_016037_20170813_20170814_01_RT"
  END_GROUP = METADATA_FILE_INFO
  GROUP = PRODUCT_METADATA
    CORNER_UL_LAT_PRODUCT = 33.70384
    CORNER_UL_LON_PRODUCT = -80.55516
    CORNER_UR_LAT_PRODUCT = 33.71012
    CORNER_UR_LON_PRODUCT = -78.08690
    CORNER_LL_LAT_PRODUCT = 31.57989
    CORNER_LL_LON_PRODUCT = -80.53524
    CORNER_LR_LAT_PRODUCT = 31.58562
    CORNER_LR_LON_PRODUCT = -78.10638
  END_GROUP = PRODUCT_METADATA
  GROUP = IMAGE_ATTRIBUTES
    SUN_ELEVATION = 30.0
  END_GROUP = IMAGE_ATTRIBUTES
  GROUP = RADIOMETRIC_RESCALING
    RADIANCE_MULT_BAND_10 = 3.3420E-04
    RADIANCE_ADD_BAND_10 = 0.10000
    REFLECTANCE_MULT_BAND_4 = 2.0000E-05
    REFLECTANCE_ADD_BAND_4 = -0.100000
  END_GROUP = RADIOMETRIC_RESCALING
  GROUP = TIRS_THERMAL_CONSTANTS
    K1_CONSTANT_BAND_10 = 774.8853
    K2_CONSTANT_BAND_10 = 1321.0789
  END_GROUP = TIRS_THERMAL_CONSTANTS
END_GROUP = L1_METADATA_FILE
END
"#;
