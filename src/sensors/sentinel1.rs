use crate::{
    components::{
        catalog::BandCatalog,
        collection::{accept_all, geometry_bounds, no_band_fields, nodata_zero, Collection, OpenContext, SceneMetadata},
        grammar::{insert_date, raw, strip_zeros, RawFields, SceneFields, SceneGrammar},
    },
    crs_geo::Crs,
    errors::{PdsError, Result},
};

fn derive(fields: &mut RawFields) -> Result<()> {
    let start = raw(fields, "start")?.to_string();
    let scene = [
        format!("S1{}", raw(fields, "satellite")?),
        raw(fields, "beam")?.to_string(),
        format!("{}{}", raw(fields, "product")?, raw(fields, "resolution")?),
        format!(
            "{}{}{}",
            raw(fields, "processing_level")?,
            raw(fields, "product_class")?,
            raw(fields, "polarisation")?
        ),
        start.clone(),
        raw(fields, "stop")?.to_string(),
        raw(fields, "absolute_orbit")?.to_string(),
        raw(fields, "mission_task")?.to_string(),
        raw(fields, "product_id")?.to_string(),
    ]
    .join("_");
    let beam_lower = raw(fields, "beam")?.to_lowercase();

    fields.insert("acquisition_year".into(), start[0..4].into());
    fields.insert("acquisition_month".into(), start[4..6].into());
    fields.insert("acquisition_day".into(), start[6..8].into());
    fields.insert("scene".into(), scene);
    insert_date(fields)?;
    fields.insert("month".into(), strip_zeros(&start[4..6]));
    fields.insert("day".into(), strip_zeros(&start[6..8]));
    fields.insert("beam_lower".into(), beam_lower);
    Ok(())
}

pub static GRAMMAR: SceneGrammar = SceneGrammar::new(
    "sentinel1",
    &[concat!(
        r"^S1(?P<satellite>[AB])_(?P<beam>IW|EW)_(?P<product>[A-Z]{3})(?P<resolution>[FHM])_",
        r"(?P<processing_level>[0-9])(?P<product_class>[SA])(?P<polarisation>SH|SV|DH|DV|HH|HV|VV|VH)_",
        r"(?P<start>[0-9]{8}T[0-9]{6})_(?P<stop>[0-9]{8}T[0-9]{6})_",
        r"(?P<absolute_orbit>[0-9]{6})_(?P<mission_task>[0-9A-Z]{6})_(?P<product_id>[0-9A-Z]{4})$"
    )],
    derive,
);

fn polarisations(fields: &SceneFields) -> Result<&'static [&'static str]> {
    Ok(match fields.field("polarisation")? {
        "DV" => &["vv", "vh"],
        "DH" => &["hh", "hv"],
        "SV" | "VV" => &["vv"],
        "SH" | "HH" => &["hh"],
        "VH" => &["vh"],
        "HV" => &["hv"],
        other => return Err(PdsError::unsupported(SENTINEL1.name, format!("polarisation {other}"))),
    })
}

/// Footprint of `productInfo.json`.
fn metadata(ctx: &OpenContext) -> Result<SceneMetadata> {
    let (key, info) = ctx.fetch_json("{prefix}/productInfo.json")?;
    Ok(SceneMetadata {
        bounds: Some(geometry_bounds(&key, &info["footprint"], Crs::Wgs84)?),
        ..Default::default()
    })
}

fn catalog(fields: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
    Ok(BandCatalog::from_table(polarisations(fields)?))
}

fn normalize(_: &SceneFields, band: &str) -> String {
    band.to_lowercase()
}

pub static SENTINEL1: Collection = Collection {
    name: "sentinel1",
    grammar: &GRAMMAR,
    scheme: "s3",
    bucket: "sentinel-s1-l1c",
    request_pays: true,
    prefix: "{product}/{acquisition_year}/{month}/{day}/{beam}/{polarisation}/{scene}",
    band_key: "{prefix}/measurement/{beam_lower}-{band}.tiff",
    minzoom: 8,
    maxzoom: 14,
    pan_band: None,
    validate: accept_all,
    metadata,
    catalog,
    normalize,
    band_fields: no_band_fields,
    band_defaults: nodata_zero,
    hook: None,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        components::{
            reader::ReadOptions,
            scene::{BandRequest, Collaborators, SceneReader},
        },
        config::ReaderConfig,
        testing::{MockFetch, MockReader},
    };
    use rstest::rstest;
    use serde_json::json;

    const SCENE: &str = "S1A_IW_GRDH_1SDV_20180716T004042_20180716T004107_022812_02792A_FD5B";
    const PREFIX: &str = "GRD/2018/7/16/IW/DV/S1A_IW_GRDH_1SDV_20180716T004042_20180716T004107_022812_02792A_FD5B";

    #[rstest]
    fn parse_grd() {
        let expected = [
            ("satellite", "A"),
            ("beam", "IW"),
            ("product", "GRD"),
            ("resolution", "H"),
            ("processing_level", "1"),
            ("product_class", "S"),
            ("polarisation", "DV"),
            ("start", "20180716T004042"),
            ("stop", "20180716T004107"),
            ("absolute_orbit", "022812"),
            ("mission_task", "02792A"),
            ("product_id", "FD5B"),
            ("acquisition_year", "2018"),
            ("acquisition_month", "07"),
            ("acquisition_day", "16"),
            ("scene", SCENE),
            ("date", "2018-07-16"),
            ("month", "7"),
            ("day", "16"),
            ("beam_lower", "iw"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));
        let pairs = |scene: &str| {
            GRAMMAR.parse(scene).unwrap().iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>()
        };
        assert_eq!(pairs(SCENE), expected);
        assert_eq!(pairs(SCENE), pairs(SCENE));
    }

    #[rstest]
    #[case("1SDV", &["vv", "vh"])]
    #[case("1SDH", &["hh", "hv"])]
    #[case("1SSV", &["vv"])]
    #[case("1SSH", &["hh"])]
    fn catalog_from_polarisation(#[case] code: &str, #[case] bands: &[&str]) {
        let fields = GRAMMAR.parse(&SCENE.replace("1SDV", code)).unwrap();
        assert_eq!(catalog(&fields, &SceneMetadata::default()).unwrap().as_slice(), bands);
    }

    #[rstest]
    #[case("vv")]
    #[case("VV")]
    fn golden_url(#[case] band: &str) {
        let fields = GRAMMAR.parse(SCENE).unwrap();
        let catalog = catalog(&fields, &SceneMetadata::default()).unwrap();
        assert_eq!(
            SENTINEL1.url(&fields, &catalog, band).unwrap().to_string(),
            format!("s3://sentinel-s1-l1c/{PREFIX}/measurement/iw-vv.tiff")
        );
        assert!(matches!(
            SENTINEL1.url(&fields, &catalog, "hh"),
            Err(PdsError::InvalidBandName { .. })
        ));
    }

    #[rstest]
    fn invalid_ids() {
        for id in [
            "S1C_IW_GRDH_1SDV_20180716T004042_20180716T004107_022812_02792A_FD5B",
            "S1A_SM_GRDH_1SDV_20180716T004042_20180716T004107_022812_02792A_FD5B",
            "S1A_IW_GRDH_1SDV_20180716T004042_20180716T004107_022812_02792A",
        ] {
            assert!(matches!(GRAMMAR.parse(id), Err(PdsError::InvalidSceneId { .. })), "{id}");
        }
    }

    #[test_log::test]
    fn footprint_bounds_and_nodata() {
        let footprint = json!({
            "footprint": {
                "type": "Polygon",
                "coordinates": [[[-122.0, 36.9], [-119.1, 37.3], [-118.7, 35.6], [-121.5, 35.2], [-122.0, 36.9]]]
            }
        });
        let fetch = MockFetch::default().with_json("sentinel-s1-l1c", &format!("{PREFIX}/productInfo.json"), &footprint);
        let vv = format!("s3://sentinel-s1-l1c/{PREFIX}/measurement/iw-vv.tiff");
        let raster = Arc::new(MockReader::default().with_band(&vv, 0.));
        let collaborators = Collaborators::new(raster.clone(), Arc::new(fetch));
        let reader = SceneReader::open(&SENTINEL1, SCENE, &collaborators, &ReaderConfig::default()).unwrap();
        assert_eq!(reader.envelope().bounds.as_tuple(), (-122.0, 35.2, -118.7, 37.3));
        assert_eq!((reader.envelope().minzoom, reader.envelope().maxzoom), (8, 14));

        let image = reader.preview(&BandRequest::bands(["VV"]), &ReadOptions::default()).unwrap();
        assert_eq!(image.band_names, vec!["vv"]);
        assert!(!image.is_full());
        assert_eq!(raster.calls()[0].1.nodata, Some(0.));
    }
}
