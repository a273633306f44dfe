//! S3-compatible result bucket access through `object_store`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::ObjectStore;
use tokio::io::AsyncWriteExt;

use super::{AdapterError, ObjectStoreClient, ObjectStoreFactory};
use crate::models::{MinioConnection, ResultFile};
use crate::sanitize::local_object_path;

/// Lifetime of pre-signed download URLs.
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Region sent with requests; MinIO ignores it but the signer needs one.
const DEFAULT_REGION: &str = "us-east-1";

/// One transform's bucket on the ServiceX MinIO.
pub struct MinioAdapter {
    store: AmazonS3,
    bucket: String,
    signed_url_expiry: Duration,
}

impl MinioAdapter {
    pub fn new(
        connection: &MinioConnection,
        bucket: &str,
        signed_url_expiry: Duration,
    ) -> Result<Self, AdapterError> {
        let scheme = if connection.secured { "https" } else { "http" };
        let store = AmazonS3Builder::new()
            .with_endpoint(format!("{}://{}", scheme, connection.endpoint))
            .with_region(DEFAULT_REGION)
            .with_bucket_name(bucket)
            .with_access_key_id(&connection.access_key)
            .with_secret_access_key(connection.secret_key.expose())
            .with_allow_http(!connection.secured)
            .build()?;
        Ok(Self {
            store,
            bucket: bucket.to_string(),
            signed_url_expiry,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStoreClient for MinioAdapter {
    async fn list_bucket(&self) -> Result<Vec<ResultFile>, AdapterError> {
        let objects: Vec<_> = self.store.list(None).try_collect().await?;
        Ok(objects
            .into_iter()
            .map(|meta| ResultFile::new(meta.location.to_string(), meta.size as u64))
            .collect())
    }

    async fn download_file(&self, object_name: &str, dir: &Path) -> Result<PathBuf, AdapterError> {
        let Some(relative) = local_object_path(object_name) else {
            return Err(AdapterError::UnsafeObjectName {
                name: object_name.to_string(),
            });
        };
        let target = dir.join(relative);
        let io_err = |e| AdapterError::Io {
            path: target.clone(),
            source: e,
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let result = self.store.get(&ObjectPath::from(object_name)).await?;
        let mut stream = result.into_stream();
        let mut file = tokio::fs::File::create(&target).await.map_err(io_err)?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;

        log::debug!("Downloaded {} from bucket {}", object_name, self.bucket);
        Ok(target)
    }

    async fn get_signed_url(&self, object_name: &str) -> Result<String, AdapterError> {
        let url = self
            .store
            .signed_url(
                reqwest::Method::GET,
                &ObjectPath::from(object_name),
                self.signed_url_expiry,
            )
            .await?;
        Ok(url.to_string())
    }
}

/// Connects [`MinioAdapter`]s with a fixed signed-URL lifetime.
#[derive(Debug, Clone)]
pub struct MinioFactory {
    signed_url_expiry: Duration,
}

impl MinioFactory {
    pub fn new(signed_url_expiry: Duration) -> Self {
        Self { signed_url_expiry }
    }
}

impl Default for MinioFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNED_URL_EXPIRY)
    }
}

impl ObjectStoreFactory for MinioFactory {
    fn connect(
        &self,
        connection: &MinioConnection,
        bucket: &str,
    ) -> Result<Arc<dyn ObjectStoreClient>, AdapterError> {
        log::info!(
            "Connecting to bucket {} at {}",
            bucket,
            connection.endpoint
        );
        Ok(Arc::new(MinioAdapter::new(
            connection,
            bucket,
            self.signed_url_expiry,
        )?))
    }
}
