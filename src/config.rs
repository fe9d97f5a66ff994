use serde::{Deserialize, Serialize};

use crate::{
    components::{bounds::TileMatrixSet, pansharpen},
    errors::Result,
};

pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Reader settings, usually deserialized from JSON.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Worker threads used for per-band (and per-cell) reads.
    pub concurrency: usize,
    /// Entries kept by the side-channel object cache.
    pub cache_capacity: usize,
    /// Replaces the collection's bucket, e.g. for a mirror.
    pub bucket: Option<String>,
    pub minzoom: Option<u8>,
    pub maxzoom: Option<u8>,
    pub tile_matrix_set: TileMatrixSet,
    pub pansharpen_weight: f64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(4),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            bucket: None,
            minzoom: None,
            maxzoom: None,
            tile_matrix_set: TileMatrixSet::default(),
            pansharpen_weight: pansharpen::DEFAULT_WEIGHT,
        }
    }
}

impl ReaderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }
}
