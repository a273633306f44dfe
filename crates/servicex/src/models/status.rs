//! Transform status snapshots polled from the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::request::{ResultDestination, ResultFormat};
use crate::sanitize::REDACTED;

/// Lifecycle phase of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Submitted,
    Pending,
    Looking,
    Running,
    Complete,
    Fatal,
    Canceled,
    /// A phase this client does not know about yet; treated as in-flight.
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Submitted => "Submitted",
            Status::Pending => "Pending",
            Status::Looking => "Looking",
            Status::Running => "Running",
            Status::Complete => "Complete",
            Status::Fatal => "Fatal",
            Status::Canceled => "Canceled",
            Status::Other(s) => s,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Status::Complete)
    }

    /// Fatal or canceled: the job will never produce a full result set.
    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Fatal | Status::Canceled)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "Submitted" => Status::Submitted,
            "Pending" => Status::Pending,
            "Looking" => Status::Looking,
            "Running" => Status::Running,
            "Complete" => Status::Complete,
            "Fatal" => Status::Fatal,
            "Canceled" => Status::Canceled,
            other => Status::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Status::from(raw.as_str()))
    }
}

/// A secret string that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Connection parameters for the job's result bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinioConnection {
    pub endpoint: String,
    pub secured: bool,
    pub access_key: String,
    pub secret_key: Credential,
}

/// One object in a transform's result bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub extension: String,
}

impl ResultFile {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        let filename = filename.into();
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        Self {
            filename,
            size,
            extension,
        }
    }
}

/// Snapshot of a transform as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStatus {
    pub request_id: String,
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(rename = "tree-name", default)]
    pub tree_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(rename = "result-destination", default)]
    pub result_destination: Option<ResultDestination>,
    #[serde(rename = "result-format", default)]
    pub result_format: Option<ResultFormat>,
    #[serde(rename = "workflow-name", default)]
    pub workflow_name: Option<String>,
    #[serde(rename = "generated-code-cm", default)]
    pub generated_code_cm: Option<String>,
    pub status: Status,
    #[serde(rename = "app-version", default)]
    pub app_version: Option<String>,
    /// Total input files; unknown until the DID finder has finished.
    #[serde(default)]
    pub files: Option<u32>,
    #[serde(rename = "files-completed", default)]
    pub files_completed: u32,
    #[serde(rename = "files-failed", default)]
    pub files_failed: u32,
    #[serde(rename = "files-remaining", default)]
    pub files_remaining: Option<u32>,
    #[serde(rename = "submit-time", default, deserialize_with = "optional_time")]
    pub submit_time: Option<DateTime<Utc>>,
    #[serde(rename = "finish-time", default, deserialize_with = "optional_time")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(rename = "minio-endpoint", default)]
    pub minio_endpoint: Option<String>,
    #[serde(rename = "minio-secured", default)]
    pub minio_secured: Option<bool>,
    #[serde(rename = "minio-access-key", default)]
    pub minio_access_key: Option<String>,
    #[serde(rename = "minio-secret-key", default, skip_serializing)]
    pub minio_secret_key: Option<Credential>,
}

/// The control plane reports a missing timestamp as the string `"None"`.
fn optional_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("None") | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

impl TransformStatus {
    /// A bare status, mostly useful for tests and fakes.
    pub fn new(request_id: impl Into<String>, status: Status) -> Self {
        Self {
            request_id: request_id.into(),
            did: None,
            title: None,
            selection: None,
            tree_name: None,
            image: None,
            result_destination: None,
            result_format: None,
            workflow_name: None,
            generated_code_cm: None,
            status,
            app_version: None,
            files: None,
            files_completed: 0,
            files_failed: 0,
            files_remaining: None,
            submit_time: None,
            finish_time: None,
            minio_endpoint: None,
            minio_secured: None,
            minio_access_key: None,
            minio_secret_key: None,
        }
    }

    /// Total file count once it is known. Zero means discovery is not done.
    pub fn total_files(&self) -> Option<u32> {
        self.files.filter(|n| *n > 0)
    }

    /// Bucket connection parameters, once storage has been provisioned.
    pub fn minio_connection(&self) -> Option<MinioConnection> {
        Some(MinioConnection {
            endpoint: self.minio_endpoint.clone()?,
            secured: self.minio_secured.unwrap_or(false),
            access_key: self.minio_access_key.clone()?,
            secret_key: self.minio_secret_key.clone()?,
        })
    }

    /// Folds in the previous observation so counts never go backwards and
    /// a terminal phase is never left.
    pub fn observe_after(mut self, previous: &TransformStatus) -> Self {
        self.files_completed = self.files_completed.max(previous.files_completed);
        self.files_failed = self.files_failed.max(previous.files_failed);
        self.files = self.total_files().max(previous.total_files());
        if previous.status.is_terminal() && !self.status.is_terminal() {
            self.status = previous.status.clone();
        }
        if self.minio_connection().is_none() && previous.minio_connection().is_some() {
            self.minio_endpoint = previous.minio_endpoint.clone();
            self.minio_secured = previous.minio_secured;
            self.minio_access_key = previous.minio_access_key.clone();
            self.minio_secret_key = previous.minio_secret_key.clone();
        }
        self
    }
}
