//! Submission and synchronization of transforms.
//!
//! A submission that misses the cache runs two tasks side by side: a
//! [`monitor::StatusMonitor`] polling the control plane and a
//! [`drain::ResultDrain`] pulling result objects out of the bucket. They
//! share a `watch` channel that only the monitor writes, and a
//! cancellation token that either side trips when it fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::adapter::{ControlPlane, ObjectStoreClient, ObjectStoreFactory};
use crate::cache::{CacheRecord, QueryCache};
use crate::error::{Result, ServiceXError};
use crate::models::{
    DatasetIdentifier, ResultDestination, ResultFormat, TransformRequest, TransformStatus,
};
use crate::progress::{LogProgress, ProgressReporter, TransformEvent};
use crate::query::{CompiledQuery, Expr, QueryCompiler};

mod drain;
mod monitor;

use drain::ResultDrain;
use monitor::StatusMonitor;

/// Whether to run a query or only compile it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Return the compiled query text; no network or cache access.
    CompileOnly,
    Execute,
}

/// How result objects reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Download into the transform's data directory.
    #[default]
    Download,
    /// Hand out pre-signed URLs.
    SignedUrls,
}

/// Outcome of a finished (or cached) transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformResult {
    pub request_id: String,
    /// Local paths or signed URLs, in first-seen order.
    pub files: Vec<String>,
    pub data_dir: PathBuf,
    pub files_completed: u32,
    pub files_failed: u32,
    pub total_files: Option<u32>,
    pub from_cache: bool,
}

impl TransformResult {
    /// Some input files failed; the result set is incomplete.
    pub fn is_partial(&self) -> bool {
        self.files_failed > 0
    }

    fn from_record(record: &CacheRecord) -> Self {
        Self {
            request_id: record.request_id.clone(),
            files: record.file_uris.clone(),
            data_dir: record.data_dir.clone(),
            files_completed: record.status.files_completed,
            files_failed: record.status.files_failed,
            total_files: record.status.total_files(),
            from_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    Compiled(CompiledQuery),
    Completed(TransformResult),
}

/// A query against a dataset, before compilation.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub dataset: DatasetIdentifier,
    pub title: Option<String>,
    pub codegen: String,
    pub query: Expr,
    /// Overrides the format implied by the query's terminal call.
    pub result_format: Option<ResultFormat>,
}

impl QuerySpec {
    pub fn new(dataset: DatasetIdentifier, codegen: impl Into<String>, query: Expr) -> Self {
        Self {
            dataset,
            title: None,
            codegen: codegen.into(),
            query,
            result_format: None,
        }
    }

    pub fn compile(&self) -> Result<CompiledQuery> {
        Ok(QueryCompiler::for_codegen(&self.codegen).compile(&self.query)?)
    }

    /// Builds the wire request for an already compiled query.
    pub fn to_request(&self, compiled: &CompiledQuery) -> Result<TransformRequest> {
        let result_format = self
            .result_format
            .or(compiled.result_format)
            .ok_or(ServiceXError::MissingResultFormat)?;
        let mut request = TransformRequest {
            title: self.title.clone(),
            did: None,
            file_list: None,
            selection: compiled.text.clone(),
            image: None,
            codegen: self.codegen.clone(),
            tree_name: None,
            result_destination: ResultDestination::ObjectStore,
            result_format,
        };
        self.dataset.populate(&mut request);
        Ok(request)
    }
}

/// Polling cadence and fetch concurrency.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub status_poll_interval: Duration,
    pub bucket_poll_interval: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            status_poll_interval: Duration::from_secs(10),
            bucket_poll_interval: Duration::from_secs(5),
            max_concurrent_fetches: 8,
        }
    }
}

/// What the monitor has learned so far. Fields fill in as the transform
/// progresses; readers must cope with both being `None`.
#[derive(Default)]
pub(crate) struct JobSnapshot {
    pub status: Option<TransformStatus>,
    pub store: Option<Arc<dyn ObjectStoreClient>>,
}

pub struct TransformOrchestrator {
    control_plane: Arc<dyn ControlPlane>,
    stores: Arc<dyn ObjectStoreFactory>,
    cache: QueryCache,
    options: OrchestratorOptions,
    progress: Arc<dyn ProgressReporter>,
}

impl TransformOrchestrator {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        stores: Arc<dyn ObjectStoreFactory>,
        cache: QueryCache,
    ) -> Self {
        Self {
            control_plane,
            stores,
            cache,
            options: OrchestratorOptions::default(),
            progress: Arc::new(LogProgress),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Compiles `spec` and, in [`ExecutionMode::Execute`], runs it.
    ///
    /// Compilation errors surface before any network or cache access.
    pub async fn execute(
        &self,
        spec: &QuerySpec,
        mode: ExecutionMode,
        delivery: DeliveryMode,
    ) -> Result<TransformOutcome> {
        let compiled = spec.compile()?;
        log::debug!("Qastle sent to ServiceX: {}", compiled.text);
        if mode == ExecutionMode::CompileOnly {
            return Ok(TransformOutcome::Compiled(compiled));
        }

        let request = spec.to_request(&compiled)?;
        let result = self.submit_and_download(&request, delivery).await?;
        Ok(TransformOutcome::Completed(result))
    }

    pub async fn submit_and_download(
        &self,
        request: &TransformRequest,
        delivery: DeliveryMode,
    ) -> Result<TransformResult> {
        self.submit_and_download_with_cancel(request, delivery, &CancellationToken::new())
            .await
    }

    /// Like [`submit_and_download`](Self::submit_and_download), stopping
    /// with [`ServiceXError::Aborted`] once `cancel` fires.
    pub async fn submit_and_download_with_cancel(
        &self,
        request: &TransformRequest,
        delivery: DeliveryMode,
        cancel: &CancellationToken,
    ) -> Result<TransformResult> {
        let hash = request.compute_hash();
        if let Some(record) = self.cache.get_transform_by_hash(&hash)? {
            info!("Using cached result of transform {}", record.request_id);
            return Ok(TransformResult::from_record(&record));
        }

        let request_id = self
            .control_plane
            .submit_transform(request)
            .await
            .map_err(ServiceXError::Submission)?;
        self.progress.report(&request_id, TransformEvent::Submitted);

        let data_dir = self.cache.cache_path_for_transform(&request_id)?;
        let span = tracing::info_span!("transform", request_id = %request_id);
        self.synchronize(request, &hash, request_id, data_dir, delivery, cancel)
            .instrument(span)
            .await
    }

    async fn synchronize(
        &self,
        request: &TransformRequest,
        hash: &str,
        request_id: String,
        data_dir: PathBuf,
        delivery: DeliveryMode,
        cancel: &CancellationToken,
    ) -> Result<TransformResult> {
        let (state_tx, state_rx) = watch::channel(JobSnapshot::default());
        let token = cancel.child_token();

        let monitor = StatusMonitor {
            control_plane: Arc::clone(&self.control_plane),
            stores: Arc::clone(&self.stores),
            progress: Arc::clone(&self.progress),
            request_id: request_id.clone(),
            interval: self.options.status_poll_interval,
            state: state_tx,
            cancel: token.clone(),
        };
        let drain = ResultDrain {
            state: state_rx,
            data_dir: data_dir.clone(),
            delivery,
            interval: self.options.bucket_poll_interval,
            max_concurrent_fetches: self.options.max_concurrent_fetches,
            progress: Arc::clone(&self.progress),
            request_id: request_id.clone(),
            cancel: token.clone(),
        };

        let (status, files) = tokio::join!(
            async {
                let result = monitor.run().await;
                if result.is_err() {
                    token.cancel();
                }
                result
            },
            async {
                let result = drain.run().await;
                if result.is_err() {
                    token.cancel();
                }
                result
            },
        );

        let (status, files) = match (status, files) {
            (Ok(status), Ok(files)) => (status, files),
            // The monitor only stopped because the drain failed.
            (Err(ServiceXError::Aborted), Err(err)) => return Err(self.fail(&request_id, err)),
            (Err(err), files) => {
                if matches!(files, Err(ServiceXError::Aborted)) {
                    warn!("Aborted file downloads due to transform failure");
                }
                return Err(self.fail(&request_id, err));
            }
            (Ok(_), Err(err)) => return Err(self.fail(&request_id, err)),
        };

        if status.files_failed > 0 {
            warn!(
                "Transform {} completed with {} failed files",
                request_id, status.files_failed
            );
        }

        self.cache.record(hash, request, &status, &data_dir, &files)?;
        self.progress.report(
            &request_id,
            TransformEvent::Completed {
                files_completed: status.files_completed,
                files_failed: status.files_failed,
            },
        );

        Ok(TransformResult {
            request_id,
            files,
            data_dir,
            files_completed: status.files_completed,
            files_failed: status.files_failed,
            total_files: status.total_files(),
            from_cache: false,
        })
    }

    fn fail(&self, request_id: &str, err: ServiceXError) -> ServiceXError {
        if !matches!(err, ServiceXError::Aborted) {
            error!("Transform {} failed: {}", request_id, err);
            self.progress.report(
                request_id,
                TransformEvent::Failed {
                    error: err.to_string(),
                },
            );
        }
        err
    }
}
