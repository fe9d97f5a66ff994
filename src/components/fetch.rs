use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use log::debug;

use crate::errors::{PdsError, Result};

/// Object storage read primitive.
///
/// Credentials, regions and timeouts belong to the implementation.
pub trait ObjectFetch: Send + Sync {
    /// Fetch a whole object; a missing object is `ObjectNotFound`.
    fn fetch(&self, bucket: &str, key: &str, request_pays: bool) -> Result<Bytes>;

    fn fetch_json(&self, bucket: &str, key: &str, request_pays: bool) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.fetch(bucket, key, request_pays)?)?)
    }

    fn fetch_text(&self, bucket: &str, key: &str, request_pays: bool) -> Result<String> {
        let bytes = self.fetch(bucket, key, request_pays)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<F: ObjectFetch + ?Sized> ObjectFetch for Arc<F> {
    fn fetch(&self, bucket: &str, key: &str, request_pays: bool) -> Result<Bytes> {
        (**self).fetch(bucket, key, request_pays)
    }
}

pub(crate) fn not_found(bucket: &str, key: &str) -> PdsError {
    PdsError::ObjectNotFound {
        bucket: bucket.into(),
        key: key.into(),
    }
}

/// Buckets mirrored on the local filesystem as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsFetch {
    root: PathBuf,
}

impl FsFetch {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectFetch for FsFetch {
    fn fetch(&self, bucket: &str, key: &str, _request_pays: bool) -> Result<Bytes> {
        let path = self.path(bucket, key);
        debug!("reading {}", path.display());
        match std::fs::read(&path) {
            Ok(content) => Ok(Bytes::from(content)),
            Err(error) if error.kind() == ErrorKind::NotFound => Err(not_found(bucket, key)),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetch;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use bytes::Bytes;
    use log::debug;
    use reqwest::{blocking::Client, StatusCode};

    use super::{not_found, ObjectFetch};
    use crate::errors::{PdsError, Result};

    /// Public buckets read through their virtual-hosted HTTPS endpoint.
    pub struct HttpFetch {
        client: Client,
        endpoint: String,
    }

    impl HttpFetch {
        /// `endpoint` holds a `{bucket}` placeholder, e.g.
        /// `https://{bucket}.s3.amazonaws.com`.
        pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(PdsError::upstream)?;
            Ok(Self {
                client,
                endpoint: endpoint.into(),
            })
        }

        pub fn aws() -> Result<Self> {
            Self::new("https://{bucket}.s3.amazonaws.com", Duration::from_secs(30))
        }

        fn url(&self, bucket: &str, key: &str) -> String {
            format!("{}/{key}", self.endpoint.replace("{bucket}", bucket))
        }
    }

    impl ObjectFetch for HttpFetch {
        fn fetch(&self, bucket: &str, key: &str, request_pays: bool) -> Result<Bytes> {
            let url = self.url(bucket, key);
            debug!("GET {url}");
            let mut request = self.client.get(&url);
            if request_pays {
                request = request.header("x-amz-request-payer", "requester");
            }
            let response = request.send().map_err(PdsError::upstream)?;
            match response.status() {
                StatusCode::NOT_FOUND => Err(not_found(bucket, key)),
                status if status.is_success() => response.bytes().map_err(PdsError::upstream),
                _ => Err(response
                    .error_for_status()
                    .map_err(PdsError::upstream)
                    .err()
                    .unwrap_or_else(|| not_found(bucket, key))),
            }
        }
    }
}
