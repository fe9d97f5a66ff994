use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use super::{
    bounds::GeoBounds,
    catalog::BandCatalog,
    fetch::ObjectFetch,
    grammar::{SceneFields, SceneGrammar},
    reader::{BandDefaults, BandHook, RasterReader},
    reference::DatasetReference,
    template,
};
use crate::{
    crs_geo::Crs,
    errors::{PdsError, Result},
};

/// Extra template fields resolved per band (resolution tier, filename prefix).
pub type BandFields = Vec<(&'static str, String)>;

/// What an opened scene learned from its side-channel documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMetadata {
    pub bounds: Option<GeoBounds>,
    pub minzoom: Option<u8>,
    pub maxzoom: Option<u8>,
    /// Asset keys of a per-scene manifest, in manifest order.
    pub assets: Vec<String>,
    pub properties: IndexMap<String, String>,
}

/// Storage layout of one public dataset, expressed as data.
///
/// A scene grammar may back several collections (e.g. Sentinel-2 JPEG2000
/// and COG buckets); everything collection-specific is a table, a template
/// or a plain function.
pub struct Collection {
    pub name: &'static str,
    pub grammar: &'static SceneGrammar,
    pub scheme: &'static str,
    pub bucket: &'static str,
    pub request_pays: bool,
    /// Template over scene fields.
    pub prefix: &'static str,
    /// Template over scene fields, `{prefix}`, `{band}` and the band fields.
    pub band_key: &'static str,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub pan_band: Option<&'static str>,
    pub validate: fn(&SceneFields) -> Result<()>,
    pub metadata: fn(&OpenContext) -> Result<SceneMetadata>,
    pub catalog: fn(&SceneFields, &SceneMetadata) -> Result<BandCatalog>,
    pub normalize: fn(&SceneFields, &str) -> String,
    pub band_fields: fn(&SceneFields, &str) -> Result<BandFields>,
    pub band_defaults: fn(&str) -> BandDefaults,
    pub hook: Option<fn(&SceneMetadata) -> Result<Arc<dyn BandHook>>>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Collection {
    pub fn prefix(&self, fields: &SceneFields) -> Result<String> {
        template::render(self.prefix, |field| fields.lookup(field))
    }

    /// Render `template` over the scene fields plus `{prefix}`.
    pub fn render(&self, fields: &SceneFields, template: &str) -> Result<String> {
        let prefix = self.prefix(fields)?;
        template::render(template, |field| match field {
            "prefix" => Some(prefix.as_str()),
            field => fields.lookup(field),
        })
    }

    /// Key of an already normalized band, without catalog membership check.
    pub fn render_key(&self, fields: &SceneFields, band: &str) -> Result<String> {
        let extra = (self.band_fields)(fields, band)?;
        let prefix = self.prefix(fields)?;
        template::render(self.band_key, |field| match field {
            "prefix" => Some(prefix.as_str()),
            "band" => Some(band),
            field => extra
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, value)| value.as_str())
                .or_else(|| fields.lookup(field)),
        })
    }

    /// Normalize, check against the catalog, then render the band key.
    pub fn key(&self, fields: &SceneFields, catalog: &BandCatalog, band: &str) -> Result<String> {
        let band = (self.normalize)(fields, band);
        catalog.ensure(&band)?;
        self.render_key(fields, &band)
    }

    pub fn url(&self, fields: &SceneFields, catalog: &BandCatalog, band: &str) -> Result<DatasetReference> {
        self.url_in(self.bucket, fields, catalog, band)
    }

    pub fn url_in(
        &self,
        bucket: &str,
        fields: &SceneFields,
        catalog: &BandCatalog,
        band: &str,
    ) -> Result<DatasetReference> {
        let key = self.key(fields, catalog, band)?;
        debug!("{}: {band} -> {key}", self.name);
        Ok(DatasetReference::new(self.scheme, bucket, key))
    }
}

/// Collaborators available while a scene is being opened.
pub struct OpenContext<'a> {
    pub collection: &'a Collection,
    pub fields: &'a SceneFields,
    pub bucket: &'a str,
    pub fetch: &'a dyn ObjectFetch,
    pub raster: &'a dyn RasterReader,
}

impl OpenContext<'_> {
    pub fn render(&self, template: &str) -> Result<String> {
        self.collection.render(self.fields, template)
    }

    /// Fetch the side-channel object at `template` from the scene's bucket.
    pub fn fetch(&self, template: &str) -> Result<Bytes> {
        let key = self.render(template)?;
        self.fetch
            .fetch(self.bucket, &key, self.collection.request_pays)
    }

    pub fn fetch_json(&self, template: &str) -> Result<(String, Value)> {
        let key = self.render(template)?;
        let json = self
            .fetch
            .fetch_json(self.bucket, &key, self.collection.request_pays)?;
        Ok((key, json))
    }

    /// Reference of a catalog band, before the catalog exists.
    pub fn band_reference(&self, band: &str) -> Result<DatasetReference> {
        let key = self.collection.render_key(self.fields, band)?;
        Ok(DatasetReference::new(self.collection.scheme, self.bucket, key))
    }
}

/// `[xmin, ymin, xmax, ymax]` of a STAC item.
pub fn stac_bbox(object: &str, item: &Value) -> Result<GeoBounds> {
    let bbox = item["bbox"]
        .as_array()
        .map(|values| values.iter().filter_map(Value::as_f64).collect::<Vec<_>>())
        .filter(|values| values.len() == 4)
        .ok_or_else(|| PdsError::metadata(object, "bbox"))?;
    Ok(GeoBounds::geographic(bbox[0], bbox[1], bbox[2], bbox[3]))
}

/// Asset keys of a STAC item, in document order.
pub fn stac_assets(item: &Value) -> Vec<String> {
    item["assets"]
        .as_object()
        .map(|assets| assets.keys().cloned().collect())
        .unwrap_or_default()
}

/// Bounds of every coordinate pair found in a GeoJSON geometry.
pub fn geometry_bounds(object: &str, geometry: &Value, crs: Crs) -> Result<GeoBounds> {
    fn walk(value: &Value, bounds: &mut Option<(f64, f64, f64, f64)>) {
        let Some(values) = value.as_array() else {
            return;
        };
        match (values.first().and_then(Value::as_f64), values.get(1).and_then(Value::as_f64)) {
            (Some(x), Some(y)) => {
                let (xmin, ymin, xmax, ymax) = bounds.get_or_insert((x, y, x, y));
                *xmin = xmin.min(x);
                *ymin = ymin.min(y);
                *xmax = xmax.max(x);
                *ymax = ymax.max(y);
            }
            _ => values.iter().for_each(|value| walk(value, bounds)),
        }
    }
    let mut bounds = None;
    walk(&geometry["coordinates"], &mut bounds);
    let (xmin, ymin, xmax, ymax) = bounds.ok_or_else(|| PdsError::metadata(object, "coordinates"))?;
    Ok(GeoBounds::new(xmin, ymin, xmax, ymax, crs))
}

pub fn accept_all(_: &SceneFields) -> Result<()> {
    Ok(())
}

pub fn no_metadata(_: &OpenContext) -> Result<SceneMetadata> {
    Ok(SceneMetadata::default())
}

pub fn keep_band(_: &SceneFields, band: &str) -> String {
    band.into()
}

/// `B1` -> `B01`; longer names are already canonical.
pub fn pad_band_number(_: &SceneFields, band: &str) -> String {
    match band.strip_prefix('B') {
        Some(digit) if digit.len() == 1 && digit.chars().all(|c| c.is_ascii_digit()) => format!("B0{digit}"),
        _ => band.into(),
    }
}

pub fn no_band_fields(_: &SceneFields, _: &str) -> Result<BandFields> {
    Ok(Vec::new())
}

pub fn no_defaults(_: &str) -> BandDefaults {
    BandDefaults::NONE
}

pub fn nodata_zero(_: &str) -> BandDefaults {
    BandDefaults::nodata(0.)
}
