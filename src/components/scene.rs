use std::sync::Arc;

use geo::Coord;
use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use super::{
    bounds::{GeoBounds, SpatialEnvelope, TileIndex, TileMatrixSet},
    cache::CachedFetch,
    catalog::BandCatalog,
    collection::{Collection, OpenContext, SceneMetadata},
    expression::Expression,
    fetch::ObjectFetch,
    grammar::SceneFields,
    image::{BandStatistics, ImageData, Info, PointData},
    pansharpen,
    reader::{BandHook, RasterDataset, RasterReader, ReadOptions},
    reference::DatasetReference,
};
use crate::{
    config::ReaderConfig,
    errors::{PdsError, Result},
    intersection::Intersection,
};

/// External services a reader delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub raster: Arc<dyn RasterReader>,
    pub fetch: Arc<dyn ObjectFetch>,
}

impl Collaborators {
    pub fn new(raster: Arc<dyn RasterReader>, fetch: Arc<dyn ObjectFetch>) -> Self {
        Self { raster, fetch }
    }

    /// Put `fetch` behind a [`CachedFetch`] of `config.cache_capacity`
    /// entries, shared by every reader opened with these collaborators.
    pub fn cached(raster: Arc<dyn RasterReader>, fetch: Arc<dyn ObjectFetch>, config: &ReaderConfig) -> Self {
        Self::new(raster, Arc::new(CachedFetch::from_config(fetch, config)))
    }
}

/// Which bands a multi-band operation reads.
///
/// An expression takes precedence over an explicit band list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandRequest {
    pub bands: Vec<String>,
    pub expression: Option<String>,
    pub pan: bool,
}

impl BandRequest {
    pub fn bands<I, S>(bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bands: bands.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Default::default()
        }
    }

    /// Append the panchromatic band and sharpen the others with it.
    pub fn with_pan(mut self) -> Self {
        self.pan = true;
        self
    }
}

/// A [`BandRequest`] checked against one scene's catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    /// Normalized catalog bands, in request order.
    pub bands: Vec<String>,
    pub pan: Option<String>,
    pub expression: Option<Expression>,
}

impl ResolvedRequest {
    /// Bands to read: the requested ones, then the panchromatic band.
    pub fn reads(&self) -> Vec<String> {
        self.bands.iter().cloned().chain(self.pan.clone()).collect()
    }
}

/// One opened scene of a [`Collection`].
///
/// Every multi-band operation fans out one single-band read per band on a
/// dedicated pool, stacks the results in request order, then optionally
/// pansharpens and applies the band-math expression.
pub struct SceneReader {
    collection: &'static Collection,
    fields: SceneFields,
    catalog: BandCatalog,
    metadata: SceneMetadata,
    envelope: SpatialEnvelope,
    bucket: String,
    tms: TileMatrixSet,
    pansharpen_weight: f64,
    raster: Arc<dyn RasterReader>,
    hook: Option<Arc<dyn BandHook>>,
    pool: ThreadPool,
}

impl std::fmt::Debug for SceneReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneReader")
            .field("collection", &self.collection.name)
            .field("scene", &self.fields.lookup("scene"))
            .field("bucket", &self.bucket)
            .field("bands", &self.catalog.len())
            .field("bounds", &self.envelope.bounds.as_tuple())
            .finish()
    }
}

impl SceneReader {
    pub fn open(
        collection: &'static Collection,
        scene_id: &str,
        collaborators: &Collaborators,
        config: &ReaderConfig,
    ) -> Result<Self> {
        let fields = collection.grammar.parse(scene_id)?;
        (collection.validate)(&fields)?;
        let bucket = config
            .bucket
            .clone()
            .unwrap_or_else(|| collection.bucket.to_string());
        let metadata = (collection.metadata)(&OpenContext {
            collection,
            fields: &fields,
            bucket: &bucket,
            fetch: collaborators.fetch.as_ref(),
            raster: collaborators.raster.as_ref(),
        })?;
        let catalog = (collection.catalog)(&fields, &metadata)?;
        let envelope = SpatialEnvelope::new(
            metadata
                .bounds
                .unwrap_or(GeoBounds::geographic(-180., -90., 180., 90.)),
            config
                .minzoom
                .or(metadata.minzoom)
                .unwrap_or(collection.minzoom),
            config
                .maxzoom
                .or(metadata.maxzoom)
                .unwrap_or(collection.maxzoom),
        );
        let hook = collection.hook.map(|build| build(&metadata)).transpose()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .build()?;
        let reader = Self {
            collection,
            fields,
            catalog,
            metadata,
            envelope,
            bucket,
            tms: config.tile_matrix_set,
            pansharpen_weight: config.pansharpen_weight,
            raster: Arc::clone(&collaborators.raster),
            hook,
            pool,
        };
        info!("opened {reader:?}");
        Ok(reader)
    }

    /// Replace (or remove) the per-pixel conversion applied to every read.
    pub fn with_hook(mut self, hook: Option<Arc<dyn BandHook>>) -> Self {
        self.hook = hook;
        self
    }

    pub fn collection(&self) -> &'static Collection {
        self.collection
    }

    pub fn fields(&self) -> &SceneFields {
        &self.fields
    }

    pub fn bands(&self) -> &BandCatalog {
        &self.catalog
    }

    pub fn metadata(&self) -> &SceneMetadata {
        &self.metadata
    }

    pub fn envelope(&self) -> &SpatialEnvelope {
        &self.envelope
    }

    pub fn center(&self) -> (f64, f64, u8) {
        self.envelope.center()
    }

    pub fn url(&self, band: &str) -> Result<DatasetReference> {
        self.collection
            .url_in(&self.bucket, &self.fields, &self.catalog, band)
    }

    pub fn resolve(&self, request: &BandRequest) -> Result<ResolvedRequest> {
        let normalize = |band: &str| (self.collection.normalize)(&self.fields, band);
        let (bands, expression) = match &request.expression {
            Some(source) => {
                if !request.bands.is_empty() {
                    warn!("both expression and bands passed, bands ignored");
                }
                let expression = Expression::parse(source)?.rename_bands(normalize);
                (expression.bands(), Some(expression))
            }
            None => (request.bands.iter().map(|band| normalize(band)).collect(), None),
        };
        if bands.is_empty() {
            return Err(PdsError::MissingBands);
        }
        for band in &bands {
            self.catalog.ensure(band)?;
        }
        let pan = match (request.pan, self.collection.pan_band) {
            (false, _) => None,
            (true, Some(pan)) if self.catalog.contains(pan) => Some(pan.to_string()),
            (true, _) => {
                warn!("{} has no panchromatic band, pan ignored", self.collection.name);
                None
            }
        };
        Ok(ResolvedRequest {
            bands,
            pan,
            expression,
        })
    }

    /// Band-level description merged into one: bounds and zooms from the
    /// scene, dtype and nodata from the first band.
    pub fn info(&self, request: &BandRequest) -> Result<Info> {
        let request = self.resolve(request)?;
        let infos = self.read_bands(&request.bands, &ReadOptions::default(), |_, _, dataset, _| {
            dataset.info()
        })?;
        let first = infos.first().ok_or(PdsError::MissingBands)?;
        let band_descriptions = request
            .bands
            .iter()
            .zip(&infos)
            .map(|(band, info)| {
                let description = info
                    .band_descriptions
                    .first()
                    .map(|(_, description)| description.clone())
                    .unwrap_or_default();
                (band.clone(), description)
            })
            .collect();
        Ok(Info {
            bounds: self.envelope.bounds,
            crs: self.envelope.bounds.crs,
            minzoom: self.envelope.minzoom,
            maxzoom: self.envelope.maxzoom,
            band_descriptions,
            dtype: first.dtype.clone(),
            nodata: first.nodata,
            width: first.width,
            height: first.height,
        })
    }

    /// Per-band statistics; expressions are evaluated on a preview first.
    ///
    /// With a hook, statistics are computed from the converted preview so
    /// every field is in the converted unit.
    pub fn statistics(
        &self,
        request: &BandRequest,
        options: &ReadOptions,
    ) -> Result<IndexMap<String, BandStatistics>> {
        let request = self.resolve(request)?;
        if request.expression.is_some() {
            let image = self.read_image(&request, options, |dataset, options| dataset.preview(options))?;
            return Ok(image.statistics(options.hist_bins));
        }
        let statistics = self.read_bands(&request.bands, options, |band, _, dataset, options| match &self.hook {
            Some(hook) => {
                let mut image = dataset.preview(options)?;
                image.array.mapv_inplace(|value| hook.convert(band, value));
                Ok(image
                    .statistics(options.hist_bins)
                    .into_values()
                    .next()
                    .unwrap_or_default())
            }
            None => dataset.statistics(options),
        })?;
        Ok(request.bands.into_iter().zip(statistics).collect())
    }

    pub fn tile(&self, tile: TileIndex, request: &BandRequest, options: &ReadOptions) -> Result<ImageData> {
        let request = self.resolve(request)?;
        if !self.tile_exists(tile) {
            return Err(PdsError::TileOutsideBounds {
                x: tile.x,
                y: tile.y,
                z: tile.z,
            });
        }
        let tms = self.tms;
        let image = self.read_image(&request, options, |dataset, options| {
            dataset.tile(tms, tile, options)
        })?;
        Ok(image.with_bounds(tms.bounds(tile)))
    }

    pub fn part(&self, bbox: &GeoBounds, request: &BandRequest, options: &ReadOptions) -> Result<ImageData> {
        let request = self.resolve(request)?;
        if let (Some(scene), Ok(bbox)) = (self.envelope.geographic_bounds(), bbox.to_geographic()) {
            if !scene.rect.intersects(&bbox.rect) {
                return Err(PdsError::OutsideBounds(format!(
                    "bbox {:?} is outside {} bounds",
                    bbox.as_tuple(),
                    self.collection.name
                )));
            }
        }
        let image = self.read_image(&request, options, |dataset, options| dataset.part(bbox, options))?;
        Ok(image.with_bounds(*bbox))
    }

    pub fn preview(&self, request: &BandRequest, options: &ReadOptions) -> Result<ImageData> {
        let request = self.resolve(request)?;
        self.read_image(&request, options, |dataset, options| dataset.preview(options))
    }

    pub fn point(&self, lon: f64, lat: f64, request: &BandRequest, options: &ReadOptions) -> Result<PointData> {
        let request = self.resolve(request)?;
        if let Some(scene) = self.envelope.geographic_bounds() {
            if !scene.contains_point(Coord { x: lon, y: lat }) {
                return Err(PdsError::PointOutsideBounds { lon, lat });
            }
        }
        let points = self.read_bands(&request.reads(), options, |band, reference, dataset, options| {
            let mut point = dataset.point(lon, lat, options)?.relabel(band, reference.to_string())?;
            if let Some(hook) = &self.hook {
                point.values.iter_mut().for_each(|value| *value = hook.convert(band, *value));
            }
            Ok(point)
        })?;
        let mut point = PointData::stack(points)?;
        if request.pan.is_some() {
            point = pansharpen::brovey_point(point, self.pansharpen_weight)?;
        }
        match &request.expression {
            Some(expression) => expression.evaluate_point(&point),
            None => Ok(point),
        }
    }

    fn tile_exists(&self, tile: TileIndex) -> bool {
        if !self.tms.is_valid(tile) {
            return false;
        }
        match self.envelope.geographic_bounds() {
            Some(scene) => scene
                .rect
                .intersects(&self.tms.geographic_bounds(tile).rect),
            None => true,
        }
    }

    /// One single-band read per band on the reader's pool, in band order.
    fn read_bands<T, F>(&self, bands: &[String], options: &ReadOptions, read: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&str, &DatasetReference, &dyn RasterDataset, &ReadOptions) -> Result<T> + Sync,
    {
        self.pool.install(|| {
            bands
                .par_iter()
                .map(|band| {
                    let reference = self.url(band)?;
                    let options = options.with_defaults(&(self.collection.band_defaults)(band));
                    debug!("reading {band} from {reference}");
                    let dataset = self.raster.open(&reference)?;
                    read(band, &reference, dataset.as_ref(), &options)
                })
                .collect()
        })
    }

    fn read_image<F>(&self, request: &ResolvedRequest, options: &ReadOptions, read: F) -> Result<ImageData>
    where
        F: Fn(&dyn RasterDataset, &ReadOptions) -> Result<ImageData> + Sync,
    {
        let images = self.read_bands(&request.reads(), options, |band, reference, dataset, options| {
            let mut image = read(dataset, options)?.relabel(band, reference.to_string())?;
            if let Some(hook) = &self.hook {
                image.array.mapv_inplace(|value| hook.convert(band, value));
            }
            Ok(image)
        })?;
        let mut image = ImageData::stack(images)?;
        if request.pan.is_some() {
            image = pansharpen::brovey(image, self.pansharpen_weight)?;
        }
        match &request.expression {
            Some(expression) => expression.evaluate(&image),
            None => Ok(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{
            catalog::BandCatalog,
            collection::{accept_all, no_band_fields, no_defaults},
            grammar::{RawFields, SceneGrammar},
            reader::BandDefaults,
        },
        testing::{MockFetch, MockReader},
    };
    use approx::assert_abs_diff_eq;
    use rstest::{fixture, rstest};

    fn add_scene(fields: &mut RawFields) -> crate::errors::Result<()> {
        let scene = format!("DEMO_{}", fields["tile"]);
        fields.insert("scene".into(), scene);
        Ok(())
    }

    static DEMO: SceneGrammar = SceneGrammar::new("demo", &[r"^DEMO_(?P<tile>\d{3})$"], add_scene);

    fn demo_metadata(_: &OpenContext) -> Result<SceneMetadata> {
        Ok(SceneMetadata {
            bounds: Some(GeoBounds::geographic(10., 10., 11., 11.)),
            ..Default::default()
        })
    }

    fn fetched_metadata(ctx: &OpenContext) -> Result<SceneMetadata> {
        let (_, item) = ctx.fetch_json("{prefix}/item.json")?;
        let maxzoom = item["maxzoom"].as_u64().map(|zoom| zoom as u8);
        Ok(SceneMetadata {
            maxzoom,
            ..demo_metadata(ctx)?
        })
    }

    fn demo_catalog(_: &SceneFields, _: &SceneMetadata) -> Result<BandCatalog> {
        Ok(BandCatalog::from_table(&["B1", "B2", "B3", "QA"]))
    }

    fn lower_to_upper(_: &SceneFields, band: &str) -> String {
        band.to_uppercase()
    }

    fn qa_defaults(band: &str) -> BandDefaults {
        match band {
            "QA" => BandDefaults::quality(1.),
            _ => BandDefaults::NONE,
        }
    }

    struct Double;

    impl BandHook for Double {
        fn convert(&self, _: &str, value: f64) -> f64 {
            value * 2.
        }
    }

    /// Affine like a radiance-to-reflectance rescale.
    struct Rescale;

    impl BandHook for Rescale {
        fn convert(&self, _: &str, value: f64) -> f64 {
            value * 0.5 + 10.
        }
    }

    static COLLECTION: Collection = Collection {
        name: "demo",
        grammar: &DEMO,
        scheme: "s3",
        bucket: "demo-bucket",
        request_pays: false,
        prefix: "tiles/{tile}",
        band_key: "{prefix}/{scene}_{band}.tif",
        minzoom: 3,
        maxzoom: 9,
        pan_band: Some("B3"),
        validate: accept_all,
        metadata: demo_metadata,
        catalog: demo_catalog,
        normalize: lower_to_upper,
        band_fields: no_band_fields,
        band_defaults: qa_defaults,
        hook: None,
    };

    static FETCHING: Collection = Collection {
        name: "demo-fetching",
        grammar: &DEMO,
        scheme: "s3",
        bucket: "demo-bucket",
        request_pays: false,
        prefix: "tiles/{tile}",
        band_key: "{prefix}/{scene}_{band}.tif",
        minzoom: 3,
        maxzoom: 9,
        pan_band: None,
        validate: accept_all,
        metadata: fetched_metadata,
        catalog: demo_catalog,
        normalize: lower_to_upper,
        band_fields: no_band_fields,
        band_defaults: no_defaults,
        hook: None,
    };

    fn url(band: &str) -> String {
        format!("s3://demo-bucket/tiles/042/DEMO_042_{band}.tif")
    }

    #[fixture]
    fn raster() -> Arc<MockReader> {
        Arc::new(
            MockReader::default()
                .with_band(&url("B1"), 1.)
                .with_band(&url("B2"), 2.)
                .with_band(&url("B3"), 4.)
                .with_band(&url("QA"), 8.),
        )
    }

    fn open(raster: &Arc<MockReader>) -> SceneReader {
        let collaborators = Collaborators::new(raster.clone(), Arc::new(MockFetch::default()));
        SceneReader::open(&COLLECTION, "DEMO_042", &collaborators, &ReaderConfig::default().with_concurrency(2))
            .unwrap()
    }

    #[rstest]
    fn open_sets_envelope(raster: Arc<MockReader>) {
        let reader = open(&raster);
        assert_eq!(reader.envelope().minzoom, 3);
        assert_eq!(reader.center(), (10.5, 10.5, 3));
        assert_eq!(reader.url("b1").unwrap().to_string(), url("B1"));
    }

    #[rstest]
    fn invalid_scene_fails_before_any_read(raster: Arc<MockReader>) {
        let collaborators = Collaborators::new(raster.clone(), Arc::new(MockFetch::default()));
        let error = SceneReader::open(&COLLECTION, "DEMO_42", &collaborators, &ReaderConfig::default());
        assert!(matches!(error, Err(PdsError::InvalidSceneId { .. })));
        assert!(raster.calls().is_empty());
    }

    #[test_log::test]
    fn tile_stacks_in_request_order() {
        let raster = raster();
        let reader = open(&raster);
        let image = reader
            .tile(TileIndex::new(540, 483, 10), &BandRequest::bands(["b3", "B1", "B2"]), &ReadOptions::default())
            .unwrap();
        assert_eq!(image.band_names, vec!["B3", "B1", "B2"]);
        assert_eq!(image.array[[0, 0, 0]], 4.);
        assert_eq!(image.array[[1, 0, 0]], 1.);
        assert_eq!(image.assets, vec![url("B3"), url("B1"), url("B2")]);
    }

    #[rstest]
    fn expression_wins_over_bands(raster: Arc<MockReader>) {
        let reader = open(&raster);
        let request = BandRequest {
            bands: vec!["B1".into()],
            expression: Some("b3/b2,B1+1".into()),
            pan: false,
        };
        let image = reader
            .tile(TileIndex::new(540, 483, 10), &request, &ReadOptions::default())
            .unwrap();
        assert_eq!(image.band_names, vec!["b3/b2", "B1+1"]);
        assert_eq!(image.array[[0, 1, 1]], 2.);
        assert_eq!(image.array[[1, 1, 1]], 2.);
    }

    #[rstest]
    #[case(BandRequest::default())]
    #[case(BandRequest::expression(" , "))]
    fn missing_bands(raster: Arc<MockReader>, #[case] request: BandRequest) {
        let reader = open(&raster);
        assert!(matches!(reader.preview(&request, &ReadOptions::default()), Err(PdsError::MissingBands)));
    }

    #[rstest]
    fn invalid_band_lists_catalog(raster: Arc<MockReader>) {
        let reader = open(&raster);
        match reader.resolve(&BandRequest::bands(["B9"])) {
            Err(PdsError::InvalidBandName { band, valid }) => {
                assert_eq!(band, "B9");
                assert_eq!(valid, vec!["B1", "B2", "B3", "QA"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[rstest]
    fn outside_tile_and_point(raster: Arc<MockReader>) {
        let reader = open(&raster);
        let request = BandRequest::bands(["B1"]);
        assert!(matches!(
            reader.tile(TileIndex::new(0, 0, 10), &request, &ReadOptions::default()),
            Err(PdsError::TileOutsideBounds { x: 0, y: 0, z: 10 })
        ));
        assert!(matches!(
            reader.tile(TileIndex::new(0, 0, 64), &request, &ReadOptions::default()),
            Err(PdsError::TileOutsideBounds { z: 64, .. })
        ));
        assert!(matches!(
            reader.point(0., 0., &request, &ReadOptions::default()),
            Err(PdsError::PointOutsideBounds { .. })
        ));
        assert!(raster.calls().is_empty());
    }

    #[rstest]
    fn band_defaults_reach_reads(raster: Arc<MockReader>) {
        let reader = open(&raster);
        reader
            .preview(&BandRequest::bands(["QA", "B1"]), &ReadOptions::default())
            .unwrap();
        let calls = raster.calls();
        let qa = calls.iter().find(|(url, _)| url.ends_with("QA.tif")).unwrap();
        let b1 = calls.iter().find(|(url, _)| url.ends_with("B1.tif")).unwrap();
        assert_eq!(qa.1.nodata, Some(1.));
        assert_eq!(b1.1.nodata, None);

        raster.clear_calls();
        reader
            .preview(&BandRequest::bands(["QA"]), &ReadOptions::default().with_nodata(0.))
            .unwrap();
        assert_eq!(raster.calls()[0].1.nodata, Some(0.));
    }

    #[rstest]
    fn pan_appends_and_sharpens(raster: Arc<MockReader>) {
        let reader = open(&raster);
        let image = reader
            .preview(&BandRequest::bands(["B1", "B2"]).with_pan(), &ReadOptions::default())
            .unwrap();
        assert_eq!(image.band_names, vec!["B1", "B2"]);
        let ratio = 4. / ((1. + 2. * 0.2) / 1.2);
        assert_abs_diff_eq!(image.array[[0, 0, 0]], ratio, epsilon = 1e-9);
        assert_eq!(raster.calls().len(), 3);
    }

    #[rstest]
    fn failing_band_fails_the_operation() {
        let raster = Arc::new(
            MockReader::default()
                .with_band(&url("B1"), 1.)
                .with_failure(&url("B2")),
        );
        let reader = open(&raster);
        let result = reader.preview(&BandRequest::bands(["B1", "B2"]), &ReadOptions::default());
        assert!(matches!(result, Err(PdsError::Upstream(_))));
    }

    #[rstest]
    fn hook_applies_to_values_and_statistics(raster: Arc<MockReader>) {
        let reader = open(&raster).with_hook(Some(Arc::new(Double)));
        let point = reader
            .point(10.5, 10.5, &BandRequest::bands(["B2"]), &ReadOptions::default())
            .unwrap();
        assert_eq!(point.values, vec![4.]);
        let statistics = reader
            .statistics(&BandRequest::bands(["B2"]), &ReadOptions::default())
            .unwrap();
        assert_eq!(statistics["B2"].max, 4.);
    }

    #[rstest]
    fn hooked_statistics_share_one_unit() {
        let raster = Arc::new(MockReader::default().with_raster(
            &url("B1"),
            4.,
            1,
            GeoBounds::geographic(10., 10., 11., 11.),
        ));
        let reader = open(&raster).with_hook(Some(Arc::new(Rescale)));
        let statistics = reader
            .statistics(&BandRequest::bands(["B1"]), &ReadOptions::default())
            .unwrap();
        let b1 = &statistics["B1"];
        assert_eq!((b1.min, b1.max), (12., 12.));
        assert_eq!(b1.mean, 12.);
        assert_eq!(b1.majority, 12.);
        assert_eq!(b1.minority, 12.);
        assert_eq!(b1.std, 0.);
        assert_eq!(b1.sum, 12. * b1.valid_pixels);
        assert!(b1.min <= b1.mean && b1.mean <= b1.max);
        assert!(b1.masked_pixels > 0.);
    }

    #[rstest]
    fn statistics_with_expression(raster: Arc<MockReader>) {
        let reader = open(&raster);
        let statistics = reader
            .statistics(&BandRequest::expression("B3-B1"), &ReadOptions::default())
            .unwrap();
        assert_eq!(statistics.keys().collect::<Vec<_>>(), vec!["B3-B1"]);
        assert_eq!(statistics["B3-B1"].mean, 3.);
    }

    #[rstest]
    fn info_merges_bands(raster: Arc<MockReader>) {
        let reader = open(&raster);
        let info = reader.info(&BandRequest::bands(["B1", "QA"])).unwrap();
        assert_eq!(info.band_descriptions.iter().map(|(band, _)| band.as_str()).collect::<Vec<_>>(), vec!["B1", "QA"]);
        assert_eq!(info.bounds.as_tuple(), (10., 10., 11., 11.));
        assert_eq!((info.minzoom, info.maxzoom), (3, 9));
    }

    #[rstest]
    fn config_overrides_bucket_and_zoom(raster: Arc<MockReader>) {
        let collaborators = Collaborators::new(raster.clone(), Arc::new(MockFetch::default()));
        let config = ReaderConfig {
            maxzoom: Some(12),
            ..ReaderConfig::default().with_bucket("mirror")
        };
        let reader = SceneReader::open(&COLLECTION, "DEMO_042", &collaborators, &config).unwrap();
        assert_eq!(reader.envelope().maxzoom, 12);
        assert_eq!(reader.url("B1").unwrap().bucket, "mirror");
    }

    #[rstest]
    fn cached_collaborators_fetch_metadata_once(raster: Arc<MockReader>) {
        let fetch = Arc::new(MockFetch::default().with_json(
            "demo-bucket",
            "tiles/042/item.json",
            &serde_json::json!({"maxzoom": 11}),
        ));
        let config = ReaderConfig {
            cache_capacity: 8,
            ..ReaderConfig::default().with_concurrency(1)
        };
        let collaborators = Collaborators::cached(raster.clone(), fetch.clone(), &config);
        for _ in 0..3 {
            let reader = SceneReader::open(&FETCHING, "DEMO_042", &collaborators, &config).unwrap();
            assert_eq!(reader.envelope().maxzoom, 11);
        }
        assert_eq!(fetch.calls(), vec![("demo-bucket".to_string(), "tiles/042/item.json".to_string(), false)]);
    }
}
