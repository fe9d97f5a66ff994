use itertools::Itertools;

pub type Result<T> = std::result::Result<T, PdsError>;

/// Opaque failure raised by an object store or raster decoder.
pub type UpstreamError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum PdsError {
    #[error("Could not match {scene_id} as a {grammar} scene id")]
    InvalidSceneId { grammar: String, scene_id: String },
    #[error("{variant} is not supported by {collection}")]
    UnsupportedVariant { collection: String, variant: String },
    #[error("{band} is not valid.\nValid bands: ({})", .valid.iter().join(", "))]
    InvalidBandName { band: String, valid: Vec<String> },
    #[error("bands must be passed either via expression or bands options")]
    MissingBands,
    #[error("Couldn't find resolution for band {0}")]
    MissingResolution(String),
    #[error("Tile {z}/{x}/{y} is outside bounds")]
    TileOutsideBounds { x: u32, y: u32, z: u8 },
    #[error("Point ({lon}, {lat}) is outside bounds")]
    PointOutsideBounds { lon: f64, lat: f64 },
    #[error("{0}")]
    OutsideBounds(String),
    #[error("Object s3://{bucket}/{key} not found")]
    ObjectNotFound { bucket: String, key: String },
    #[error("Template {template} refers to unknown field {field}")]
    TemplateField { template: String, field: String },
    #[error("Invalid expression {expression}: {reason}")]
    Expression { expression: String, reason: String },
    #[error("Metadata {object} has no usable {key}")]
    Metadata { object: String, key: String },
    #[error("No coordinate transform available from {0}")]
    UnsupportedCrs(String),
    #[error("Pansharpening needs at least two bands, got {0}")]
    Pansharpen(usize),
    #[error(transparent)]
    Upstream(UpstreamError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[cfg(feature = "gdal")]
    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),
    #[cfg(feature = "proj")]
    #[error(transparent)]
    ProjCreate(#[from] proj::ProjCreateError),
    #[cfg(feature = "proj")]
    #[error(transparent)]
    Proj(#[from] proj::ProjError),
}

impl PdsError {
    pub fn invalid_scene_id(grammar: &str, scene_id: &str) -> Self {
        Self::InvalidSceneId {
            grammar: grammar.into(),
            scene_id: scene_id.into(),
        }
    }

    pub fn unsupported(collection: &str, variant: impl Into<String>) -> Self {
        Self::UnsupportedVariant {
            collection: collection.into(),
            variant: variant.into(),
        }
    }

    pub fn metadata(object: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Metadata {
            object: object.into(),
            key: key.into(),
        }
    }

    pub fn upstream<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Upstream(Box::new(error))
    }

    /// Failures a mosaic treats as "this candidate has no data here".
    pub fn is_expected_absence(&self) -> bool {
        matches!(
            self,
            Self::TileOutsideBounds { .. }
                | Self::PointOutsideBounds { .. }
                | Self::OutsideBounds(_)
                | Self::ObjectNotFound { .. }
        )
    }
}
