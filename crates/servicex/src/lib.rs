//! Client for ServiceX, a remote service that runs columnar queries over
//! HEP datasets and writes the results to an object store.
//!
//! Queries are built with [`query::ObjectStream`], compiled to qastle by
//! [`query::QueryCompiler`], and run by an
//! [`orchestrator::TransformOrchestrator`] that submits the transform,
//! follows its status, collects result files and remembers completed
//! transforms in a local [`cache::QueryCache`].

pub mod adapter;
pub mod cache;
pub mod client;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod query;
pub mod sanitize;

pub use adapter::{AdapterError, ControlPlane, ObjectStoreClient, ObjectStoreFactory};
pub use cache::{CacheRecord, QueryCache};
pub use client::ServiceXClient;
pub use config::{load_config, Configuration, Endpoint};
pub use dataset::Dataset;
pub use error::{ConfigError, Result, ServiceXError};
pub use models::{
    DatasetIdentifier, ResultDestination, ResultFile, ResultFormat, Status, TransformRequest,
    TransformStatus,
};
pub use orchestrator::{
    DeliveryMode, ExecutionMode, OrchestratorOptions, QuerySpec, TransformOrchestrator,
    TransformOutcome, TransformResult,
};
pub use progress::{BroadcastProgress, LogProgress, NoopProgress, ProgressReporter, TransformEvent};
pub use query::{CompilationError, CompiledQuery, Expr, ObjectStream, QueryCompiler};
