use std::f64::consts::PI;

use crate::{
    components::{
        bounds::GeoBounds,
        catalog::BandCatalog,
        collection::{no_defaults, pad_band_number, BandFields, Collection, OpenContext, SceneMetadata},
        grammar::{raw, RawFields, SceneFields, SceneGrammar},
    },
    crs_geo::{Crs, SINUSOIDAL_RADIUS},
    errors::{PdsError, Result},
};

const MCD43A4_BANDS: &[&str] = &[
    "B01", "B01qa", "B02", "B02qa", "B03", "B03qa", "B04", "B04qa", "B05", "B05qa", "B06", "B06qa", "B07", "B07qa",
];
const MOD09GQ_BANDS: &[&str] = &["B01", "B02", "granule", "numobs", "obscov", "obsnum", "orbit", "qc"];
const MOD09GA_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "geoflags", "granule", "numobs1km", "numobs500m", "obscov",
    "obsnum", "orbit", "qc500m", "qscan", "range", "senaz", "senzen", "solaz", "solzen", "state",
];
const ASTRAEA_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B09", "B10", "B11", "B12",
];

const PDS_PRODUCTS: &[(&str, &[&str])] = &[
    ("MCD43A4", MCD43A4_BANDS),
    ("MOD09GQ", MOD09GQ_BANDS),
    ("MYD09GQ", MOD09GQ_BANDS),
    ("MOD09GA", MOD09GA_BANDS),
    ("MYD09GA", MOD09GA_BANDS),
];
const ASTRAEA_PRODUCTS: &[(&str, &[&str])] = &[
    ("MCD43A4", MCD43A4_BANDS),
    ("MOD11A1", ASTRAEA_BANDS),
    ("MYD11A1", ASTRAEA_BANDS),
    ("MOD13A1", ASTRAEA_BANDS),
    ("MYD13A1", ASTRAEA_BANDS),
];

/// Land surface temperature layers, in band order.
const LST_PREFIXES: [&str; 12] = [
    "LSTD_", "QCD_", "DVT_", "DVA_", "LSTN_", "QCN_", "NVT_", "NVA_", "E31_", "E32_", "CDC_", "CNC_",
];
/// Vegetation index layers, in band order.
const VI_PREFIXES: [&str; 12] = [
    "NDVI_", "EVI_", "VIQ_", "RR_", "NIRR_", "BR_", "MIRR_", "VZA_", "SZA_", "RAA_", "CDOY_", "PR_",
];

/// MODLAND sinusoidal grid: 36 x 18 tiles of 10 degrees at the equator.
const GRID_COLUMNS: f64 = 36.;
const GRID_ROWS: f64 = 18.;

fn derive(fields: &mut RawFields) -> Result<()> {
    let scene = format!(
        "{}.A{}.h{}v{}.{}.{}{}{}",
        raw(fields, "product")?,
        raw(fields, "date")?,
        raw(fields, "horizontal_grid")?,
        raw(fields, "vertical_grid")?,
        raw(fields, "version")?,
        raw(fields, "processing_year")?,
        raw(fields, "processing_doy")?,
        raw(fields, "processing_time")?,
    );
    fields.insert("scene".into(), scene);
    Ok(())
}

pub static GRAMMAR: SceneGrammar = SceneGrammar::new(
    "modis",
    &[concat!(
        r"^(?P<product>M[COY]D[0-9]{2}[A-Z0-9]{2})\.A(?P<date>[0-9]{7})\.",
        r"h(?P<horizontal_grid>[0-9]{2})v(?P<vertical_grid>[0-9]{2})\.(?P<version>[0-9]{3})\.",
        r"(?P<processing_year>[0-9]{4})(?P<processing_doy>[0-9]{3})(?P<processing_time>[0-9]{6})$"
    )],
    derive,
);

/// Geographic bounds of MODLAND tile `h`/`v`.
pub fn tile_bounds(horizontal: u32, vertical: u32) -> Result<GeoBounds> {
    let size = 2. * PI * SINUSOIDAL_RADIUS / GRID_COLUMNS;
    let xmin = -GRID_COLUMNS / 2. * size + f64::from(horizontal) * size;
    let ymax = GRID_ROWS / 2. * size - f64::from(vertical) * size;
    let (lon_min, lat_min, lon_max, lat_max) =
        GeoBounds::new(xmin, ymax - size, xmin + size, ymax, Crs::Sinusoidal)
            .to_geographic()?
            .as_tuple();
    Ok(GeoBounds::geographic(
        lon_min.max(-180.),
        lat_min.max(-90.),
        lon_max.min(180.),
        lat_max.min(90.),
    ))
}

fn grid_cell(fields: &SceneFields) -> Result<(u32, u32)> {
    let number = |key: &str| -> Result<u32> {
        fields
            .field(key)?
            .parse()
            .map_err(|_| PdsError::metadata("scene fields", key))
    };
    Ok((number("horizontal_grid")?, number("vertical_grid")?))
}

/// Footprint from the grid cell; no side-channel document.
fn metadata(ctx: &OpenContext) -> Result<SceneMetadata> {
    let (horizontal, vertical) = grid_cell(ctx.fields)?;
    Ok(SceneMetadata {
        bounds: Some(tile_bounds(horizontal, vertical)?),
        ..Default::default()
    })
}

fn product_bands(
    collection: &Collection,
    products: &[(&str, &'static [&'static str])],
    fields: &SceneFields,
) -> Result<&'static [&'static str]> {
    let product = fields.field("product")?;
    products
        .iter()
        .find(|(name, _)| *name == product)
        .map(|(_, bands)| *bands)
        .ok_or_else(|| PdsError::unsupported(collection.name, product))
}

fn pds_bands(fields: &SceneFields) -> Result<&'static [&'static str]> {
    product_bands(&MODIS_PDS, PDS_PRODUCTS, fields)
}

fn validate_pds(fields: &SceneFields) -> Result<()> {
    pds_bands(fields).map(|_| ())
}

fn pds_catalog(fields: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(pds_bands(fields)?))
}

fn no_band_prefix(_: &SceneFields, _: &str) -> Result<BandFields> {
    Ok(vec![("band_prefix", String::new())])
}

pub static MODIS_PDS: Collection = Collection {
    name: "modis-pds",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "modis-pds",
    request_pays: false,
    prefix: "{product}.{version}/{horizontal_grid}/{vertical_grid}/{date}",
    band_key: "{prefix}/{scene}_{band_prefix}{band}.TIF",
    minzoom: 4,
    maxzoom: 9,
    pan_band: None,
    validate: validate_pds,
    metadata,
    catalog: pds_catalog,
    normalize: pad_band_number,
    band_fields: no_band_prefix,
    band_defaults: no_defaults,
    hook: None,
};

pub fn astraea_product(product: &str) -> bool {
    ASTRAEA_PRODUCTS.iter().any(|(name, _)| *name == product)
}

fn astraea_bands(fields: &SceneFields) -> Result<&'static [&'static str]> {
    product_bands(&MODIS_ASTRAEA, ASTRAEA_PRODUCTS, fields)
}

fn validate_astraea(fields: &SceneFields) -> Result<()> {
    astraea_bands(fields).map(|_| ())
}

fn astraea_catalog(fields: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(astraea_bands(fields)?))
}

/// MOD11A1/MOD13A1 files carry the layer name before the band.
fn astraea_band_prefix(fields: &SceneFields, band: &str) -> Result<BandFields> {
    let prefixes = match fields.field("product")? {
        "MOD11A1" | "MYD11A1" => Some(&LST_PREFIXES),
        "MOD13A1" | "MYD13A1" => Some(&VI_PREFIXES),
        _ => None,
    };
    let prefix = match prefixes {
        Some(prefixes) => ASTRAEA_BANDS
            .iter()
            .position(|valid| *valid == band)
            .map(|index| prefixes[index])
            .ok_or_else(|| PdsError::unsupported(MODIS_ASTRAEA.name, band))?,
        None => "",
    };
    Ok(vec![("band_prefix", prefix.into())])
}

pub static MODIS_ASTRAEA: Collection = Collection {
    name: "modis-astraea",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "astraea-opendata",
    request_pays: false,
    prefix: "{product}.{version}/{horizontal_grid}/{vertical_grid}/{date}",
    band_key: "{prefix}/{scene}_{band_prefix}{band}.TIF",
    minzoom: 4,
    maxzoom: 9,
    pan_band: None,
    validate: validate_astraea,
    metadata,
    catalog: astraea_catalog,
    normalize: pad_band_number,
    band_fields: astraea_band_prefix,
    band_defaults: no_defaults,
    hook: None,
};
