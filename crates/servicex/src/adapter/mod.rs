//! Transports to the two remote services a transform touches: the
//! ServiceX control plane and the per-transform result bucket.
//!
//! The orchestrator only sees the traits below, so tests can script both
//! sides without a network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{MinioConnection, ResultFile, TransformRequest, TransformStatus};

pub mod error;
pub mod minio;
pub mod servicex;

pub use error::AdapterError;
pub use minio::{MinioAdapter, MinioFactory};
pub use servicex::ServiceXAdapter;

/// Job submission and status polling.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Submits a transform and returns its request id.
    async fn submit_transform(&self, request: &TransformRequest) -> Result<String, AdapterError>;

    async fn get_transform_status(&self, request_id: &str) -> Result<TransformStatus, AdapterError>;
}

/// Access to one transform's result bucket.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn list_bucket(&self) -> Result<Vec<ResultFile>, AdapterError>;

    /// Downloads `object_name` into `dir` and returns the local path.
    async fn download_file(&self, object_name: &str, dir: &Path) -> Result<PathBuf, AdapterError>;

    async fn get_signed_url(&self, object_name: &str) -> Result<String, AdapterError>;
}

/// Builds bucket clients once the control plane hands out credentials.
pub trait ObjectStoreFactory: Send + Sync {
    fn connect(
        &self,
        connection: &MinioConnection,
        bucket: &str,
    ) -> Result<Arc<dyn ObjectStoreClient>, AdapterError>;
}
