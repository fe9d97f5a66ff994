//! Sentinel-2 scenes: JPEG2000 tiles on `sentinel-s2-l1c`/`sentinel-s2-l2a`
//! and the L2A Cloud Optimized GeoTIFF mirror on `sentinel-cogs`.

use regex::Regex;

use crate::{
    components::{
        catalog::BandCatalog,
        collection::{
            geometry_bounds, no_band_fields, no_defaults, nodata_zero, pad_band_number, stac_assets, stac_bbox, BandFields, Collection,
            OpenContext, SceneMetadata,
        },
        grammar::{insert_date, raw, strip_zeros, RawFields, SceneFields, SceneGrammar},
    },
    crs_geo::Crs,
    errors::{PdsError, Result},
};

pub const L1C_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B09", "B11", "B12", "B8A",
];
pub const L2A_BANDS: &[&str] = L1C_BANDS;
/// Scene classification and atmospheric products of the L2A JPEG2000 tiles.
pub const L2A_PRODUCTS: &[&str] = &["AOT", "SCL", "WVP"];

/// Resolution tiers of the L2A JPEG2000 layout, finest first.
const L2A_BAND_TIERS: &[(&str, &[&str])] = &[
    ("10", &["B02", "B03", "B04", "B08"]),
    ("20", &["B02", "B03", "B04", "B05", "B06", "B07", "B08", "B11", "B12", "B8A"]),
    ("60", L1C_BANDS),
];
const L2A_PRODUCT_TIERS: &[(&str, &[&str])] = &[
    ("10", &["AOT", "WVP"]),
    ("20", &["AOT", "SCL", "WVP"]),
    ("60", &["AOT", "SCL", "WVP"]),
];

/// STAC >= 1.0.0 names the COG assets by common name.
const COMMON_NAMES: &[(&str, &str)] = &[
    ("B01", "coastal"),
    ("B02", "blue"),
    ("B03", "green"),
    ("B04", "red"),
    ("B05", "rededge1"),
    ("B06", "rededge2"),
    ("B07", "rededge3"),
    ("B08", "nir"),
    ("B8A", "nir08"),
    ("B09", "nir09"),
    ("B11", "swir16"),
    ("B12", "swir22"),
];
const LEGACY_STAC_VERSION: &str = "1.0.0-beta.2";
const MANIFEST_BAND_PATTERN: &str = "^B[0-9][0-9A]$";

fn derive(fields: &mut RawFields) -> Result<()> {
    fields.entry("num".into()).or_insert_with(|| "0".into());
    let scene = format!(
        "S{}{}_{}{}{}_{}{}{}_{}_{}",
        raw(fields, "sensor")?,
        raw(fields, "satellite")?,
        raw(fields, "utm")?,
        raw(fields, "lat")?,
        raw(fields, "sq")?,
        raw(fields, "acquisition_year")?,
        raw(fields, "acquisition_month")?,
        raw(fields, "acquisition_day")?,
        raw(fields, "num")?,
        raw(fields, "processing_level")?,
    );
    let utm_zone = strip_zeros(raw(fields, "utm")?);
    let month = strip_zeros(raw(fields, "acquisition_month")?);
    let day = strip_zeros(raw(fields, "acquisition_day")?);
    let level_lower = raw(fields, "processing_level")?.to_lowercase();
    fields.insert("scene".into(), scene);
    insert_date(fields)?;
    fields.insert("utm_zone".into(), utm_zone);
    fields.insert("month".into(), month);
    fields.insert("day".into(), day);
    fields.insert("level_lower".into(), level_lower);
    Ok(())
}

pub static GRAMMAR: SceneGrammar = SceneGrammar::new(
    "sentinel2",
    &[
        concat!(
            r"^S(?P<sensor>2)(?P<satellite>[AB])_(?P<processing_level>L[0-2][ABC])_",
            r"(?P<acquisition_year>[0-9]{4})(?P<acquisition_month>[0-9]{2})(?P<acquisition_day>[0-9]{2})_",
            r"(?P<utm>[0-9]{2})(?P<lat>[A-Z])(?P<sq>[A-Z]{2})_(?P<num>[0-9])$"
        ),
        concat!(
            r"^S(?P<sensor>2)(?P<satellite>[AB])_(?P<utm>[0-9]{2})(?P<lat>[A-Z])(?P<sq>[A-Z]{2})_",
            r"(?P<acquisition_year>[0-9]{4})(?P<acquisition_month>[0-9]{2})(?P<acquisition_day>[0-9]{2})_",
            r"(?P<num>[0-9])_(?P<processing_level>L[0-2][ABC])$"
        ),
        concat!(
            r"^S(?P<sensor>2)(?P<satellite>[AB])_(?P<processing_level>L[0-2][ABC])_",
            r"(?P<acquisition_year>[0-9]{4})(?P<acquisition_month>[0-9]{2})(?P<acquisition_day>[0-9]{2})_",
            r"(?P<utm>[0-9]{2})(?P<lat>[A-Z])(?P<sq>[A-Z]{2})$"
        ),
    ],
    derive,
);

fn require_level(collection: &Collection, fields: &SceneFields, level: &str) -> Result<()> {
    match fields.field("processing_level")? {
        found if found == level => Ok(()),
        found => Err(PdsError::unsupported(collection.name, found)),
    }
}

/// Tile footprint and UTM CRS from `tileInfo.json`.
fn tile_info(ctx: &OpenContext) -> Result<SceneMetadata> {
    let (key, info) = ctx.fetch_json("{prefix}/tileInfo.json")?;
    let geometry = &info["tileDataGeometry"];
    let code = geometry["crs"]["properties"]["name"]
        .as_str()
        .and_then(|name| name.rsplit(':').next())
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| PdsError::metadata(&key, "tileDataGeometry.crs"))?;
    Ok(SceneMetadata {
        bounds: Some(geometry_bounds(&key, geometry, Crs::epsg(code))?),
        ..Default::default()
    })
}

fn validate_l1c(fields: &SceneFields) -> Result<()> {
    require_level(&SENTINEL2_L1C, fields, "L1C")
}

fn l1c_catalog(_: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(L1C_BANDS))
}

pub static SENTINEL2_L1C: Collection = Collection {
    name: "sentinel2-l1c",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "sentinel-s2-l1c",
    request_pays: true,
    prefix: "tiles/{utm_zone}/{lat}/{sq}/{acquisition_year}/{month}/{day}/{num}",
    band_key: "{prefix}/{band}.jp2",
    minzoom: 8,
    maxzoom: 14,
    pan_band: None,
    validate: validate_l1c,
    metadata: tile_info,
    catalog: l1c_catalog,
    normalize: pad_band_number,
    band_fields: no_band_fields,
    band_defaults: nodata_zero,
    hook: None,
};

/// Resolution tier of an L2A band: spectral bands use their finest tier,
/// products their own table.
pub fn resolution(band: &str) -> Result<&'static str> {
    let tiers = if band.starts_with('B') {
        L2A_BAND_TIERS
    } else {
        L2A_PRODUCT_TIERS
    };
    tiers
        .iter()
        .find(|(_, bands)| bands.contains(&band))
        .map(|(tier, _)| *tier)
        .ok_or_else(|| PdsError::MissingResolution(band.into()))
}

fn validate_l2a(fields: &SceneFields) -> Result<()> {
    require_level(&SENTINEL2_L2A, fields, "L2A")
}

fn l2a_catalog(_: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(L2A_BANDS).chain(L2A_PRODUCTS))
}

fn l2a_band_fields(_: &SceneFields, band: &str) -> Result<BandFields> {
    Ok(vec![("resolution", resolution(band)?.into())])
}

pub static SENTINEL2_L2A: Collection = Collection {
    name: "sentinel2-l2a",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "sentinel-s2-l2a",
    request_pays: true,
    prefix: "tiles/{utm_zone}/{lat}/{sq}/{acquisition_year}/{month}/{day}/{num}",
    band_key: "{prefix}/R{resolution}m/{band}.jp2",
    minzoom: 8,
    maxzoom: 14,
    pan_band: None,
    validate: validate_l2a,
    metadata: tile_info,
    catalog: l2a_catalog,
    normalize: pad_band_number,
    band_fields: l2a_band_fields,
    band_defaults: nodata_zero,
    hook: None,
};

fn validate_cog(fields: &SceneFields) -> Result<()> {
    require_level(&SENTINEL2_COG, fields, "L2A")
}

/// STAC item of the scene: bbox, asset keys and STAC version.
fn stac_item(ctx: &OpenContext) -> Result<SceneMetadata> {
    let (key, item) = ctx.fetch_json("{prefix}/{scene}.json")?;
    let mut metadata = SceneMetadata {
        bounds: Some(stac_bbox(&key, &item)?),
        assets: stac_assets(&item),
        ..Default::default()
    };
    if let Some(version) = item["stac_version"].as_str() {
        metadata.properties.insert("stac_version".into(), version.into());
    }
    Ok(metadata)
}

/// Canonical bands announced by the STAC item, or its `Bxx` assets when
/// none of the canonical keys appear.
fn cog_catalog(_: &SceneFields, metadata: &SceneMetadata) -> Result<BandCatalog> {
    let canonical: Vec<(&str, &str)> = match metadata.properties.get("stac_version").map(String::as_str) {
        Some(LEGACY_STAC_VERSION) => L2A_BANDS.iter().map(|band| (*band, *band)).collect(),
        _ => COMMON_NAMES.to_vec(),
    };
    let pattern = Regex::new(MANIFEST_BAND_PATTERN)?;
    Ok(BandCatalog::from_manifest(&canonical, &metadata.assets, &pattern))
}

pub static SENTINEL2_COG: Collection = Collection {
    name: "sentinel2-cog",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "sentinel-cogs",
    request_pays: false,
    prefix: "sentinel-s2-{level_lower}-cogs/{utm_zone}/{lat}/{sq}/{acquisition_year}/{month}/{scene}",
    band_key: "{prefix}/{band}.tif",
    minzoom: 8,
    maxzoom: 14,
    pan_band: None,
    validate: validate_cog,
    metadata: stac_item,
    catalog: cog_catalog,
    normalize: pad_band_number,
    band_fields: no_band_fields,
    band_defaults: no_defaults,
    hook: None,
};
