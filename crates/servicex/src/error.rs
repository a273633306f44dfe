use std::path::PathBuf;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::db::DatabaseError;
use crate::models::Status;
use crate::query::CompilationError;

#[derive(Error, Debug)]
pub enum ServiceXError {
    #[error("Query compilation failed: {0}")]
    Compilation(#[from] CompilationError),

    #[error("Failed to submit transform: {0}")]
    Submission(#[source] AdapterError),

    #[error("Failed to poll status of transform {request_id}: {source}")]
    Polling {
        request_id: String,
        #[source]
        source: AdapterError,
    },

    #[error("Transform {request_id} ended {status} with {files_failed} failed files")]
    TransformFailed {
        request_id: String,
        status: Status,
        files_failed: u32,
    },

    #[error("Failed to connect to result bucket of transform {request_id}: {source}")]
    ObjectStore {
        request_id: String,
        #[source]
        source: AdapterError,
    },

    #[error("Failed to fetch result object '{object}': {source}")]
    Fetch {
        object: String,
        #[source]
        source: AdapterError,
    },

    #[error("Fetch task failed: {0}")]
    TaskFailed(String),

    #[error("Cache error: {0}")]
    Cache(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ServiceX request failed: {0}")]
    Adapter(#[from] AdapterError),

    /// Work stopped because a sibling task failed or the caller cancelled.
    #[error("Aborted due to upstream failure")]
    Aborted,

    #[error("Query does not name a result format; request one explicitly")]
    MissingResultFormat,

    #[error("No ServiceX endpoint named '{0}' in configuration")]
    NoEndpoint(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML '{path}': {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No configuration file found (looked for {searched})")]
    NotFound { searched: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, ServiceXError>;
