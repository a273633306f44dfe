//! Builders for requests and status snapshots used across tests.

#![allow(dead_code)]

use servicex::models::Credential;
use servicex::{ResultDestination, ResultFormat, Status, TransformRequest, TransformStatus};

/// A parquet request against a rucio dataset.
pub fn sample_request(title: &str) -> TransformRequest {
    TransformRequest {
        title: Some(title.to_string()),
        did: Some("rucio://mc16_13TeV:DAOD_PHYS.example".to_string()),
        file_list: None,
        selection: "(Select (call EventDataset) (lambda (list e) (attr e 'met')))".to_string(),
        image: None,
        codegen: "uproot".to_string(),
        tree_name: None,
        result_destination: ResultDestination::ObjectStore,
        result_format: ResultFormat::Parquet,
    }
}

/// Fluent builder for control-plane status snapshots.
pub struct StatusBuilder {
    status: TransformStatus,
}

impl StatusBuilder {
    pub fn new(request_id: &str, status: Status) -> Self {
        Self {
            status: TransformStatus::new(request_id, status),
        }
    }

    pub fn running(request_id: &str) -> Self {
        Self::new(request_id, Status::Running).with_minio()
    }

    pub fn complete(request_id: &str) -> Self {
        Self::new(request_id, Status::Complete).with_minio()
    }

    pub fn files(mut self, total: u32) -> Self {
        self.status.files = Some(total);
        self
    }

    pub fn completed(mut self, completed: u32) -> Self {
        self.status.files_completed = completed;
        self
    }

    pub fn failed(mut self, failed: u32) -> Self {
        self.status.files_failed = failed;
        self
    }

    pub fn with_minio(mut self) -> Self {
        self.status.minio_endpoint = Some("minio.servicex.test:9000".to_string());
        self.status.minio_secured = Some(false);
        self.status.minio_access_key = Some("miniouser".to_string());
        self.status.minio_secret_key = Some(Credential::new("leftfoot1"));
        self
    }

    pub fn build(self) -> TransformStatus {
        self.status
    }
}
