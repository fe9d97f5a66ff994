use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::{PdsError, Result};

/// Fully-qualified object storage locator (`scheme://bucket/key`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetReference {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl DatasetReference {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new("s3", bucket, key)
    }

    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || PdsError::metadata(url, "scheme://bucket/key");
        let (scheme, rest) = url.split_once("://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        if scheme.is_empty() || bucket.is_empty() || key.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(scheme, bucket, key))
    }

    /// Path understood by GDAL's virtual file systems.
    pub fn vsi_path(&self) -> String {
        match self.scheme.as_str() {
            "s3" => format!("/vsis3/{}/{}", self.bucket, self.key),
            "gs" => format!("/vsigs/{}/{}", self.bucket, self.key),
            "file" => format!("/{}/{}", self.bucket, self.key),
            "mem" => format!("/vsimem/{}/{}", self.bucket, self.key),
            scheme => format!("/vsicurl/{scheme}://{}/{}", self.bucket, self.key),
        }
    }

    /// File name with its extension.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl Display for DatasetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn display_and_parse() {
        let reference = DatasetReference::s3("cbers-pds", "CBERS4/MUX/a.tif");
        assert_eq!(reference.to_string(), "s3://cbers-pds/CBERS4/MUX/a.tif");
        assert_eq!(DatasetReference::parse(&reference.to_string()).unwrap(), reference);
        assert_eq!(reference.vsi_path(), "/vsis3/cbers-pds/CBERS4/MUX/a.tif");
        assert_eq!(reference.file_name(), "a.tif");
    }

    #[rstest]
    #[case(DatasetReference::new("gs", "gcp-public-data", "a/b.tif"), "/vsigs/gcp-public-data/a/b.tif")]
    #[case(DatasetReference::new("file", "tmp", "dem/cell.tif"), "/tmp/dem/cell.tif")]
    #[case(DatasetReference::new("mem", "dem", "cell.tif"), "/vsimem/dem/cell.tif")]
    #[case(DatasetReference::new("https", "example.com", "a.tif"), "/vsicurl/https://example.com/a.tif")]
    fn vsi_paths(#[case] reference: DatasetReference, #[case] path: &str) {
        assert_eq!(reference.vsi_path(), path);
    }

    #[rstest]
    #[case("cbers-pds/key")]
    #[case("s3://bucket-only")]
    #[case("s3:///key")]
    fn parse_rejects(#[case] url: &str) {
        assert!(DatasetReference::parse(url).is_err());
    }
}
