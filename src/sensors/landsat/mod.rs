//! Landsat collection 1 (Landsat 8 on `landsat-pds`) and collection 2
//! (every sensor on `usgs-landsat`).

use std::sync::Arc;

use crate::{
    components::{
        catalog::BandCatalog,
        collection::{keep_band, no_band_fields, stac_bbox, Collection, OpenContext, SceneMetadata},
        grammar::{insert_date, raw, RawFields, SceneFields, SceneGrammar},
        reader::{BandDefaults, BandHook},
    },
    errors::{PdsError, Result},
};

pub mod mtl;
pub mod toa;

pub use toa::TopOfAtmosphere;

/// (sensor letter, satellite) -> product family name used in bucket keys.
const SENSORS: &[(&str, &str, &str)] = &[
    ("C", "08", "oli-tirs"),
    ("C", "09", "oli-tirs"),
    ("O", "08", "oli"),
    ("O", "09", "oli"),
    ("T", "08", "tirs"),
    ("T", "09", "tirs"),
    ("E", "07", "etm"),
    ("T", "04", "tm"),
    ("T", "05", "tm"),
    ("M", "01", "mss"),
    ("M", "02", "mss"),
    ("M", "03", "mss"),
    ("M", "04", "mss"),
    ("M", "05", "mss"),
];

fn derive(fields: &mut RawFields) -> Result<()> {
    let scene = format!(
        "L{}{}_{}_{}{}_{}{}{}_{}{}{}_{}_{}",
        raw(fields, "sensor")?,
        raw(fields, "satellite")?,
        raw(fields, "processing_level")?,
        raw(fields, "path")?,
        raw(fields, "row")?,
        raw(fields, "acquisition_year")?,
        raw(fields, "acquisition_month")?,
        raw(fields, "acquisition_day")?,
        raw(fields, "processing_year")?,
        raw(fields, "processing_month")?,
        raw(fields, "processing_day")?,
        raw(fields, "collection_number")?,
        raw(fields, "collection_category")?,
    );
    fields.insert("scene".into(), scene);
    insert_date(fields)?;

    let level = raw(fields, "processing_level")?[1..2].to_string();
    fields.insert("processing_level_num".into(), level);

    let (sensor, satellite) = (raw(fields, "sensor")?, raw(fields, "satellite")?);
    let sensor_name = SENSORS
        .iter()
        .find(|(letter, number, _)| *letter == sensor && *number == satellite)
        .map(|(_, _, name)| *name)
        .ok_or_else(|| PdsError::unsupported(GRAMMAR.name, format!("L{sensor}{satellite}")))?;
    fields.insert("sensor_name".into(), sensor_name.into());

    let category = match raw(fields, "collection_category")? {
        "A1" => "albers",
        _ => "standard",
    };
    fields.insert("category".into(), category.into());
    Ok(())
}

pub static GRAMMAR: SceneGrammar = SceneGrammar::new(
    "landsat",
    &[concat!(
        r"^L(?P<sensor>[COTEM])(?P<satellite>0[0-9])_(?P<processing_level>L[0-9][A-Z]{2})_",
        r"(?P<path>[0-9]{3})(?P<row>[0-9]{3})_",
        r"(?P<acquisition_year>[0-9]{4})(?P<acquisition_month>[0-9]{2})(?P<acquisition_day>[0-9]{2})_",
        r"(?P<processing_year>[0-9]{4})(?P<processing_month>[0-9]{2})(?P<processing_day>[0-9]{2})_",
        r"(?P<collection_number>[0-9]{2})_(?P<collection_category>T1|T2|RT|A1)$"
    )],
    derive,
);

const OLI_TIRS_L1_BANDS: &[&str] = &[
    "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B9", "B10", "B11", "QA_PIXEL", "QA_RADSAT",
];
const OLI_L1_BANDS: &[&str] = &["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B9", "QA_PIXEL", "QA_RADSAT"];
const TIRS_L1_BANDS: &[&str] = &["B10", "B11", "QA_PIXEL", "QA_RADSAT"];
const ETM_L1_BANDS: &[&str] = &[
    "B1", "B2", "B3", "B4", "B5", "B6_VCID_1", "B6_VCID_2", "B7", "B8", "QA_PIXEL", "QA_RADSAT",
];
const TM_L1_BANDS: &[&str] = &["B1", "B2", "B3", "B4", "B5", "B6", "B7", "QA_PIXEL", "QA_RADSAT"];
const MSS_L1_BANDS: &[&str] = &["B4", "B5", "B6", "B7", "QA_PIXEL", "QA_RADSAT"];

pub const OLI_SR_BANDS: &[&str] = &[
    "QA_PIXEL", "QA_RADSAT", "SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7", "SR_QA_AEROSOL",
];
pub const TIRS_ST_BANDS: &[&str] = &[
    "ST_ATRAN", "ST_B10", "ST_CDIST", "ST_DRAD", "ST_EMIS", "ST_EMSD", "ST_QA", "ST_TRAD", "ST_URAD",
];
pub const TM_SR_BANDS: &[&str] = &[
    "QA_PIXEL", "QA_RADSAT", "SR_ATMOS_OPACITY", "SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7", "SR_CLOUD_QA",
];
pub const TM_ST_BANDS: &[&str] = &[
    "ST_ATRAN", "ST_B6", "ST_CDIST", "ST_DRAD", "ST_EMIS", "ST_EMSD", "ST_QA", "ST_TRAD", "ST_URAD",
];

/// Level-2 surface reflectance group, optional surface temperature group
/// and the thermal band number of a sensor.
struct Level2 {
    sr: &'static [&'static str],
    st: Option<&'static [&'static str]>,
    thermal: &'static str,
}

fn level2(sensor_name: &str) -> Option<Level2> {
    match sensor_name {
        "oli-tirs" => Some(Level2 {
            sr: OLI_SR_BANDS,
            st: Some(TIRS_ST_BANDS),
            thermal: "B10",
        }),
        "oli" => Some(Level2 {
            sr: OLI_SR_BANDS,
            st: None,
            thermal: "B10",
        }),
        "etm" | "tm" => Some(Level2 {
            sr: TM_SR_BANDS,
            st: Some(TM_ST_BANDS),
            thermal: "B6",
        }),
        _ => None,
    }
}

fn collection2_bands(fields: &SceneFields) -> Result<BandCatalog> {
    let sensor_name = fields.field("sensor_name")?;
    if fields.field("processing_level_num")? == "1" {
        let table = match sensor_name {
            "oli-tirs" => OLI_TIRS_L1_BANDS,
            "oli" => OLI_L1_BANDS,
            "tirs" => TIRS_L1_BANDS,
            "etm" => ETM_L1_BANDS,
            "tm" => TM_L1_BANDS,
            _ => MSS_L1_BANDS,
        };
        return Ok(BandCatalog::from_table(table));
    }
    let level2 = level2(sensor_name).ok_or_else(|| {
        PdsError::unsupported(LANDSAT_C2.name, format!("level-2 {sensor_name}"))
    })?;
    let catalog = BandCatalog::from_table(level2.sr);
    Ok(match level2.st {
        Some(st) if fields.field("processing_level")? == "L2SP" => catalog.chain(st),
        _ => catalog,
    })
}

fn validate_collection2(fields: &SceneFields) -> Result<()> {
    if fields.field("collection_number")? != "02" {
        return Err(PdsError::unsupported(
            LANDSAT_C2.name,
            format!("collection {}", fields.field("collection_number")?),
        ));
    }
    collection2_bands(fields).map(|_| ())
}

/// WGS84 bbox of the STAC item (surface reflectance item on level 2).
fn collection2_metadata(ctx: &OpenContext) -> Result<SceneMetadata> {
    let template = match ctx.fields.field("processing_level_num")? {
        "1" => "{prefix}/{scene}_stac.json",
        _ => "{prefix}/{scene}_SR_stac.json",
    };
    let (key, item) = ctx.fetch_json(template)?;
    Ok(SceneMetadata {
        bounds: Some(stac_bbox(&key, &item)?),
        ..Default::default()
    })
}

fn collection2_catalog(fields: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    collection2_bands(fields)
}

/// On level 2, `B5` means `SR_B5` and the thermal band means `ST_B10`/`ST_B6`.
fn collection2_normalize(fields: &SceneFields, band: &str) -> String {
    let short = band.len() > 1 && band.starts_with('B') && band[1..].chars().all(|c| c.is_ascii_digit());
    if !short || fields.lookup("processing_level_num") != Some("2") {
        return band.into();
    }
    let thermal = fields
        .lookup("sensor_name")
        .and_then(level2)
        .map(|level2| level2.thermal);
    match thermal {
        Some(thermal) if thermal == band => format!("ST_{band}"),
        _ => format!("SR_{band}"),
    }
}

fn collection2_defaults(band: &str) -> BandDefaults {
    if band.starts_with("QA_") {
        BandDefaults::quality(1.)
    } else {
        BandDefaults::NONE
    }
}

pub static LANDSAT_C2: Collection = Collection {
    name: "landsat-c2",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "usgs-landsat",
    request_pays: true,
    prefix: "collection02/level-{processing_level_num}/{category}/{sensor_name}/{acquisition_year}/{path}/{row}/{scene}",
    band_key: "{prefix}/{scene}_{band}.TIF",
    minzoom: 5,
    maxzoom: 12,
    pan_band: Some("B8"),
    validate: validate_collection2,
    metadata: collection2_metadata,
    catalog: collection2_catalog,
    normalize: collection2_normalize,
    band_fields: no_band_fields,
    band_defaults: collection2_defaults,
    hook: None,
};

const LANDSAT8_C1_BANDS: &[&str] = &[
    "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B9", "B10", "B11", "BQA",
];

fn validate_collection1(fields: &SceneFields) -> Result<()> {
    let id = format!(
        "L{}{} collection {}",
        fields.field("sensor")?,
        fields.field("satellite")?,
        fields.field("collection_number")?
    );
    match id.as_str() {
        "LC08 collection 01" => Ok(()),
        _ => Err(PdsError::unsupported(LANDSAT8_C1.name, id)),
    }
}

/// Footprint and radiometric coefficients from the MTL text file.
fn collection1_metadata(ctx: &OpenContext) -> Result<SceneMetadata> {
    let bytes = ctx.fetch("{prefix}/{scene}_MTL.txt")?;
    let properties = mtl::parse(&String::from_utf8_lossy(&bytes));
    Ok(SceneMetadata {
        bounds: Some(mtl::bounds(&properties)?),
        properties,
        ..Default::default()
    })
}

fn collection1_catalog(_: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(LANDSAT8_C1_BANDS))
}

fn collection1_defaults(band: &str) -> BandDefaults {
    match band {
        "BQA" => BandDefaults::quality(1.),
        _ => BandDefaults::nodata(0.),
    }
}

fn top_of_atmosphere(metadata: &SceneMetadata) -> Result<Arc<dyn BandHook>> {
    Ok(Arc::new(TopOfAtmosphere::from_mtl(&metadata.properties)?))
}

pub static LANDSAT8_C1: Collection = Collection {
    name: "landsat8-c1",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "landsat-pds",
    request_pays: false,
    prefix: "c1/L8/{path}/{row}/{scene}",
    band_key: "{prefix}/{scene}_{band}.TIF",
    minzoom: 7,
    maxzoom: 12,
    pan_band: Some("B8"),
    validate: validate_collection1,
    metadata: collection1_metadata,
    catalog: collection1_catalog,
    normalize: keep_band,
    band_fields: no_band_fields,
    band_defaults: collection1_defaults,
    hook: Some(top_of_atmosphere),
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{
            bounds::{GeoBounds, TileIndex},
            reader::ReadOptions,
            scene::{BandRequest, Collaborators, SceneReader},
        },
        config::ReaderConfig,
        testing::{MockFetch, MockReader},
    };
    use rstest::rstest;
    use serde_json::json;

    const L2SP: &str = "LC08_L2SP_001062_20201031_20201106_02_T2";
    const L2SP_PREFIX: &str = "collection02/level-2/standard/oli-tirs/2020/001/062/LC08_L2SP_001062_20201031_20201106_02_T2/LC08_L2SP_001062_20201031_20201106_02_T2";
    const C1: &str = "LC08_L1TP_016037_20170813_20170814_01_RT";

    fn pairs(scene: &str) -> Vec<(String, String)> {
        GRAMMAR.parse(scene).unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[rstest]
    fn parse_l2sp() {
        let expected = [
            ("sensor", "C"),
            ("satellite", "08"),
            ("processing_level", "L2SP"),
            ("path", "001"),
            ("row", "062"),
            ("acquisition_year", "2020"),
            ("acquisition_month", "10"),
            ("acquisition_day", "31"),
            ("processing_year", "2020"),
            ("processing_month", "11"),
            ("processing_day", "06"),
            ("collection_number", "02"),
            ("collection_category", "T2"),
            ("scene", L2SP),
            ("date", "2020-10-31"),
            ("processing_level_num", "2"),
            ("sensor_name", "oli-tirs"),
            ("category", "standard"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));
        assert_eq!(pairs(L2SP), expected);
        assert_eq!(pairs(L2SP), pairs(L2SP));
    }

    #[rstest]
    #[case("LT05_L2SP_014032_20111018_20200820_02_T1", "tm")]
    #[case("LE07_L2SR_123067_20201030_20201126_02_T1", "etm")]
    #[case("LM05_L1GS_176025_20120901_20200820_02_T2", "mss")]
    #[case("LO08_L1GT_214107_20201031_20201106_02_T2", "oli")]
    fn sensor_names(#[case] scene: &str, #[case] sensor: &str) {
        assert_eq!(GRAMMAR.parse(scene).unwrap().field("sensor_name").unwrap(), sensor);
    }

    #[rstest]
    fn unmapped_sensor_fails() {
        assert!(matches!(
            GRAMMAR.parse("LE08_L1TP_016037_20170813_20170814_01_RT"),
            Err(PdsError::UnsupportedVariant { .. })
        ));
        assert!(matches!(
            GRAMMAR.parse("LC08_L1TP_016037_20170813_20170814_01_XX"),
            Err(PdsError::InvalidSceneId { .. })
        ));
    }

    #[rstest]
    #[case(L2SP, [OLI_SR_BANDS, TIRS_ST_BANDS].concat())]
    #[case("LC08_L2SR_122108_20201031_20201106_02_T2", OLI_SR_BANDS.to_vec())]
    #[case("LT05_L2SP_014032_20111018_20200820_02_T1", [TM_SR_BANDS, TM_ST_BANDS].concat())]
    #[case("LE07_L2SR_123067_20201030_20201126_02_T1", TM_SR_BANDS.to_vec())]
    #[case("LC08_L1TP_016037_20170813_20170814_02_RT", OLI_TIRS_L1_BANDS.to_vec())]
    fn collection2_catalogs(#[case] scene: &str, #[case] expected: Vec<&str>) {
        let fields = GRAMMAR.parse(scene).unwrap();
        assert_eq!(collection2_bands(&fields).unwrap().as_slice(), expected.as_slice());
    }

    #[rstest]
    fn mss_has_no_level2() {
        let fields = GRAMMAR.parse("LM05_L2SP_176025_20120901_20200820_02_T2").unwrap();
        assert!(matches!(validate_collection2(&fields), Err(PdsError::UnsupportedVariant { .. })));
    }

    #[rstest]
    #[case("SR_B5", "SR_B5")]
    #[case("B5", "SR_B5")]
    #[case("B10", "ST_B10")]
    #[case("QA_PIXEL", "QA_PIXEL")]
    fn level2_aliases(#[case] band: &str, #[case] expected: &str) {
        let fields = GRAMMAR.parse(L2SP).unwrap();
        let catalog = collection2_bands(&fields).unwrap();
        assert_eq!(
            LANDSAT_C2.url(&fields, &catalog, band).unwrap().to_string(),
            format!("s3://usgs-landsat/{L2SP_PREFIX}_{expected}.TIF")
        );
    }

    #[test_log::test]
    fn collection2_reader() {
        let fetch = MockFetch::default().with_json(
            "usgs-landsat",
            &format!("{L2SP_PREFIX}_SR_stac.json"),
            &json!({"bbox": [-46.2, -5.5, -44.3, -3.6]}),
        );
        let fetch = Arc::new(fetch);
        let raster = MockReader::default()
            .with_band(&format!("s3://usgs-landsat/{L2SP_PREFIX}_QA_PIXEL.TIF"), 1.)
            .with_band(&format!("s3://usgs-landsat/{L2SP_PREFIX}_SR_B4.TIF"), 7.);
        let raster = Arc::new(raster);
        let collaborators = Collaborators::new(raster.clone(), fetch.clone());
        let reader = SceneReader::open(&LANDSAT_C2, L2SP, &collaborators, &ReaderConfig::default()).unwrap();
        assert_eq!(reader.envelope().bounds.as_tuple(), (-46.2, -5.5, -44.3, -3.6));
        assert_eq!((reader.envelope().minzoom, reader.envelope().maxzoom), (5, 12));
        assert_eq!(
            fetch.calls(),
            vec![("usgs-landsat".to_string(), format!("{L2SP_PREFIX}_SR_stac.json"), true)]
        );

        let image = reader
            .preview(&BandRequest::bands(["B4", "QA_PIXEL"]), &ReadOptions::default())
            .unwrap();
        assert_eq!(image.band_names, vec!["SR_B4", "QA_PIXEL"]);
        // QA_PIXEL holds its own nodata value everywhere.
        assert!(!image.mask.iter().any(|&valid| valid));
    }

    #[rstest]
    fn missing_stac_item() {
        let collaborators = Collaborators::new(Arc::new(MockReader::default()), Arc::new(MockFetch::default()));
        let error = SceneReader::open(&LANDSAT_C2, L2SP, &collaborators, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(error, PdsError::ObjectNotFound { .. }));
    }

    #[rstest]
    fn collection1_url() {
        let fields = GRAMMAR.parse(C1).unwrap();
        validate_collection1(&fields).unwrap();
        let catalog = collection1_catalog(&fields, &SceneMetadata::default()).unwrap();
        assert_eq!(
            LANDSAT8_C1.url(&fields, &catalog, "B4").unwrap().to_string(),
            format!("s3://landsat-pds/c1/L8/016/037/{C1}/{C1}_B4.TIF")
        );
        assert!(matches!(
            validate_collection1(&GRAMMAR.parse(L2SP).unwrap()),
            Err(PdsError::UnsupportedVariant { .. })
        ));
    }

    #[test_log::test]
    fn collection1_reader_converts_to_toa() {
        let prefix = format!("c1/L8/016/037/{C1}/{C1}");
        let fetch = MockFetch::default().with_object("landsat-pds", &format!("{prefix}_MTL.txt"), mtl::SAMPLE);
        let b4 = format!("s3://landsat-pds/{prefix}_B4.TIF");
        let bqa = format!("s3://landsat-pds/{prefix}_BQA.TIF");
        let raster = Arc::new(
            MockReader::default()
                .with_raster(&b4, 10000., 0, GeoBounds::geographic(-80.6, 31.5, -78.0, 33.8))
                .with_raster(&bqa, 2720., 0, GeoBounds::geographic(-80.6, 31.5, -78.0, 33.8)),
        );
        let collaborators = Collaborators::new(raster.clone(), Arc::new(fetch));
        let reader = SceneReader::open(&LANDSAT8_C1, C1, &collaborators, &ReaderConfig::default()).unwrap();
        assert_eq!(reader.envelope().bounds.as_tuple(), (-80.55516, 31.57989, -78.0869, 33.71012));

        let point = reader
            .point(-79.5, 32.5, &BandRequest::bands(["B4", "BQA"]), &ReadOptions::default())
            .unwrap();
        assert!((point.values[0] - 2000.).abs() <= 1.);
        assert_eq!(point.values[1], 2720.);

        let calls = raster.calls();
        assert!(calls.iter().any(|(url, options)| url == &bqa && options.nodata == Some(1.)));
        assert!(calls.iter().any(|(url, options)| url == &b4 && options.nodata == Some(0.)));

        assert!(matches!(
            reader.tile(TileIndex::new(1, 1, 1), &BandRequest::bands(["B4"]), &ReadOptions::default()),
            Err(PdsError::TileOutsideBounds { .. })
        ));
    }
}
