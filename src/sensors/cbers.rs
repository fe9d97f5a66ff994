use crate::{
    components::{
        catalog::BandCatalog,
        collection::{no_defaults, BandFields, Collection, OpenContext, SceneMetadata},
        grammar::{insert_date, raw, RawFields, SceneFields, SceneGrammar},
        scene::BandRequest,
    },
    errors::{PdsError, Result},
};

/// Band layout of one CBERS-4 camera.
#[derive(Debug)]
pub struct Instrument {
    pub name: &'static str,
    pub bands: &'static [&'static str],
    /// Band whose dataset describes the scene footprint.
    pub reference_band: &'static str,
    pub rgb: [&'static str; 3],
}

pub const INSTRUMENTS: &[Instrument] = &[
    Instrument {
        name: "MUX",
        bands: &["B5", "B6", "B7", "B8"],
        reference_band: "B6",
        rgb: ["B7", "B6", "B5"],
    },
    Instrument {
        name: "AWFI",
        bands: &["B13", "B14", "B15", "B16"],
        reference_band: "B14",
        rgb: ["B15", "B14", "B13"],
    },
    Instrument {
        name: "PAN10M",
        bands: &["B2", "B3", "B4"],
        reference_band: "B4",
        rgb: ["B3", "B4", "B2"],
    },
    Instrument {
        name: "PAN5M",
        bands: &["B1"],
        reference_band: "B1",
        rgb: ["B1", "B1", "B1"],
    },
];

fn derive(fields: &mut RawFields) -> Result<()> {
    let scene = format!(
        "{}_{}_{}_{}{}{}_{}_{}_{}",
        raw(fields, "satellite")?,
        raw(fields, "mission")?,
        raw(fields, "instrument")?,
        raw(fields, "acquisition_year")?,
        raw(fields, "acquisition_month")?,
        raw(fields, "acquisition_day")?,
        raw(fields, "path")?,
        raw(fields, "row")?,
        raw(fields, "processing_level")?,
    );
    fields.insert("scene".into(), scene);
    insert_date(fields)
}

pub static GRAMMAR: SceneGrammar = SceneGrammar::new(
    "cbers",
    &[concat!(
        r"^(?P<satellite>CBERS)_(?P<mission>4)_(?P<instrument>[A-Z0-9]+)_",
        r"(?P<acquisition_year>[0-9]{4})(?P<acquisition_month>[0-9]{2})(?P<acquisition_day>[0-9]{2})_",
        r"(?P<path>[0-9]{3})_(?P<row>[0-9]{3})_(?P<processing_level>L[0-9])$"
    )],
    derive,
);

pub fn instrument(fields: &SceneFields) -> Result<&'static Instrument> {
    let name = fields.field("instrument")?;
    INSTRUMENTS
        .iter()
        .find(|instrument| instrument.name == name)
        .ok_or_else(|| PdsError::unsupported(CBERS4.name, name))
}

/// The camera's true-colour band triplet.
pub fn rgb_request(fields: &SceneFields) -> Result<BandRequest> {
    Ok(BandRequest::bands(instrument(fields)?.rgb))
}

fn validate(fields: &SceneFields) -> Result<()> {
    instrument(fields).map(|_| ())
}

/// Footprint and zoom range come from the reference band itself.
fn metadata(ctx: &OpenContext) -> Result<SceneMetadata> {
    let reference = ctx.band_reference(instrument(ctx.fields)?.reference_band)?;
    let info = ctx.raster.open(&reference)?.info()?;
    Ok(SceneMetadata {
        bounds: Some(info.bounds),
        minzoom: Some(info.minzoom),
        maxzoom: Some(info.maxzoom),
        ..Default::default()
    })
}

fn catalog(fields: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(instrument(fields)?.bands))
}

/// File names spell bands `BAND5`; accept that form too.
fn normalize(_: &SceneFields, band: &str) -> String {
    match band.strip_prefix("BAND") {
        Some(number) => format!("B{number}"),
        None => band.into(),
    }
}

fn band_fields(_: &SceneFields, band: &str) -> Result<BandFields> {
    Ok(vec![("band_number", band.trim_start_matches('B').into())])
}

pub static CBERS4: Collection = Collection {
    name: "cbers4",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "cbers-pds",
    request_pays: false,
    prefix: "CBERS4/{instrument}/{path}/{row}/{scene}",
    band_key: "{prefix}/{scene}_BAND{band_number}.tif",
    minzoom: 8,
    maxzoom: 12,
    pan_band: None,
    validate,
    metadata,
    catalog,
    normalize,
    band_fields,
    band_defaults: no_defaults,
    hook: None,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        components::{
            bounds::GeoBounds,
            reader::ReadOptions,
            scene::{Collaborators, SceneReader},
        },
        config::ReaderConfig,
        testing::{MockFetch, MockReader},
    };
    use rstest::rstest;

    const MUX: &str = "CBERS_4_MUX_20171121_057_094_L2";
    const MUX_BAND: &str = "s3://cbers-pds/CBERS4/MUX/057/094/CBERS_4_MUX_20171121_057_094_L2/CBERS_4_MUX_20171121_057_094_L2_BAND";

    #[rstest]
    fn parse_mux() {
        let fields = GRAMMAR.parse(MUX).unwrap();
        let pairs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("satellite", "CBERS"),
                ("mission", "4"),
                ("instrument", "MUX"),
                ("acquisition_year", "2017"),
                ("acquisition_month", "11"),
                ("acquisition_day", "21"),
                ("path", "057"),
                ("row", "094"),
                ("processing_level", "L2"),
                ("scene", MUX),
                ("date", "2017-11-21"),
            ]
        );
    }

    #[rstest]
    #[case(MUX, &["B5", "B6", "B7", "B8"])]
    #[case("CBERS_4_AWFI_20170420_146_129_L2", &["B13", "B14", "B15", "B16"])]
    #[case("CBERS_4_PAN10M_20170427_161_109_L4", &["B2", "B3", "B4"])]
    #[case("CBERS_4_PAN5M_20170425_153_114_L4", &["B1"])]
    fn catalogs(#[case] scene: &str, #[case] bands: &[&str]) {
        let fields = GRAMMAR.parse(scene).unwrap();
        let catalog = catalog(&fields, &SceneMetadata::default()).unwrap();
        assert_eq!(catalog.as_slice(), bands);
        assert_eq!(catalog, super::catalog(&fields, &SceneMetadata::default()).unwrap());
    }

    #[rstest]
    #[case("B5")]
    #[case("BAND5")]
    fn golden_url(#[case] band: &str) {
        let fields = GRAMMAR.parse(MUX).unwrap();
        let catalog = catalog(&fields, &SceneMetadata::default()).unwrap();
        assert_eq!(
            CBERS4.url(&fields, &catalog, band).unwrap().to_string(),
            "s3://cbers-pds/CBERS4/MUX/057/094/CBERS_4_MUX_20171121_057_094_L2/CBERS_4_MUX_20171121_057_094_L2_BAND5.tif"
        );
    }

    #[rstest]
    fn invalid_inputs() {
        assert!(matches!(GRAMMAR.parse("CBERS_4_MUX_20171121_057_094"), Err(PdsError::InvalidSceneId { .. })));
        let fields = GRAMMAR.parse("CBERS_4_HRC_20171121_057_094_L2").unwrap();
        assert!(matches!(validate(&fields), Err(PdsError::UnsupportedVariant { .. })));

        let fields = GRAMMAR.parse(MUX).unwrap();
        let catalog = catalog(&fields, &SceneMetadata::default()).unwrap();
        assert!(matches!(CBERS4.url(&fields, &catalog, "B1"), Err(PdsError::InvalidBandName { .. })));
    }

    #[rstest]
    fn rgb_preset_is_in_catalog() {
        for instrument in INSTRUMENTS {
            assert!(instrument.bands.contains(&instrument.reference_band));
            assert!(instrument.rgb.iter().all(|band| instrument.bands.contains(band)));
        }
    }

    #[test_log::test]
    fn envelope_from_reference_band() {
        let reference = format!("{MUX_BAND}6.tif");
        let reference = reference.as_str();
        let raster = MockReader::default()
            .with_raster(reference, 1., 0, GeoBounds::geographic(53.3, 4.1, 54.5, 5.2))
            .with_zooms(reference, 8, 12);
        let collaborators = Collaborators::new(Arc::new(raster), Arc::new(MockFetch::default()));
        let reader = SceneReader::open(&CBERS4, MUX, &collaborators, &ReaderConfig::default()).unwrap();
        assert_eq!(reader.envelope().bounds.as_tuple(), (53.3, 4.1, 54.5, 5.2));
        assert_eq!((reader.envelope().minzoom, reader.envelope().maxzoom), (8, 12));
        assert_eq!(reader.bands().as_slice(), ["B5", "B6", "B7", "B8"]);
    }

    #[test_log::test]
    fn rgb_preview_reads_preset_bands() {
        let reference = format!("{MUX_BAND}6.tif");
        let raster = MockReader::default()
            .with_raster(&reference, 6., 0, GeoBounds::geographic(53.3, 4.1, 54.5, 5.2))
            .with_band(&format!("{MUX_BAND}5.tif"), 5.)
            .with_band(&format!("{MUX_BAND}7.tif"), 7.);
        let collaborators = Collaborators::new(Arc::new(raster), Arc::new(MockFetch::default()));
        let reader = SceneReader::open(&CBERS4, MUX, &collaborators, &ReaderConfig::default()).unwrap();

        let request = rgb_request(reader.fields()).unwrap();
        let image = reader.preview(&request, &ReadOptions::default()).unwrap();
        assert_eq!(image.band_names, vec!["B7", "B6", "B5"]);
    }
}
