//! Sensor families: scene grammars, bucket layouts and the registry
//! picking a layout from a bare scene id.

use crate::{
    components::{
        collection::Collection,
        scene::{Collaborators, SceneReader},
    },
    config::ReaderConfig,
    errors::{PdsError, Result},
};

pub mod cbers;
pub mod copernicus;
pub mod landsat;
pub mod modis;
pub mod sentinel1;
pub mod sentinel2;

pub use cbers::CBERS4;
pub use copernicus::{DemGrid, DemMosaic, COPERNICUS_DEM_30, COPERNICUS_DEM_90};
pub use landsat::{LANDSAT8_C1, LANDSAT_C2};
pub use modis::{MODIS_ASTRAEA, MODIS_PDS};
pub use sentinel1::SENTINEL1;
pub use sentinel2::{SENTINEL2_COG, SENTINEL2_L1C, SENTINEL2_L2A};

/// Default layout for a scene id, chosen from the id alone.
pub fn collection_for_scene(raw: &str) -> Result<&'static Collection> {
    if cbers::GRAMMAR.matches(raw) {
        return Ok(&CBERS4);
    }
    if landsat::GRAMMAR.matches(raw) {
        let fields = landsat::GRAMMAR.parse(raw)?;
        return Ok(match fields.field("collection_number")? {
            "02" => &LANDSAT_C2,
            _ => &LANDSAT8_C1,
        });
    }
    if sentinel1::GRAMMAR.matches(raw) {
        return Ok(&SENTINEL1);
    }
    if sentinel2::GRAMMAR.matches(raw) {
        let fields = sentinel2::GRAMMAR.parse(raw)?;
        return match fields.field("processing_level")? {
            "L2A" => Ok(&SENTINEL2_COG),
            "L1C" => Ok(&SENTINEL2_L1C),
            level => Err(PdsError::unsupported(sentinel2::GRAMMAR.name, level)),
        };
    }
    if modis::GRAMMAR.matches(raw) {
        let fields = modis::GRAMMAR.parse(raw)?;
        if modis::astraea_product(fields.field("product")?) {
            return Ok(&MODIS_ASTRAEA);
        }
        return Ok(&MODIS_PDS);
    }
    Err(PdsError::invalid_scene_id("any", raw))
}

/// Open `raw` with its default layout.
pub fn open(raw: &str, collaborators: &Collaborators, config: &ReaderConfig) -> Result<SceneReader> {
    SceneReader::open(collection_for_scene(raw)?, raw, collaborators, config)
}
