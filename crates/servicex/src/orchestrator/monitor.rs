//! Status polling half of a running transform.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::JobSnapshot;
use crate::adapter::{ControlPlane, ObjectStoreClient, ObjectStoreFactory};
use crate::error::{Result, ServiceXError};
use crate::models::TransformStatus;
use crate::progress::{ProgressReporter, TransformEvent};

/// Polls the control plane until the transform reaches a terminal phase.
///
/// The only writer of the shared [`JobSnapshot`].
pub(crate) struct StatusMonitor {
    pub control_plane: Arc<dyn ControlPlane>,
    pub stores: Arc<dyn ObjectStoreFactory>,
    pub progress: Arc<dyn ProgressReporter>,
    pub request_id: String,
    pub interval: Duration,
    pub state: watch::Sender<JobSnapshot>,
    pub cancel: CancellationToken,
}

impl StatusMonitor {
    /// Returns the final status once the transform is complete.
    pub async fn run(self) -> Result<TransformStatus> {
        let mut previous: Option<TransformStatus> = None;
        let mut store: Option<Arc<dyn ObjectStoreClient>> = None;
        let mut announced_total = false;

        loop {
            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ServiceXError::Aborted),
                polled = self.control_plane.get_transform_status(&self.request_id) => polled,
            };
            let polled = polled.map_err(|source| ServiceXError::Polling {
                request_id: self.request_id.clone(),
                source,
            })?;

            let status = match &previous {
                Some(previous) => polled.observe_after(previous),
                None => polled,
            };

            if !announced_total {
                if let Some(total) = status.total_files() {
                    self.progress
                        .report(&self.request_id, TransformEvent::TotalFiles { total });
                    announced_total = true;
                }
            }
            self.progress.report(
                &self.request_id,
                TransformEvent::Progress {
                    completed: status.files_completed,
                    failed: status.files_failed,
                },
            );

            if store.is_none() {
                if let Some(connection) = status.minio_connection() {
                    let client = self
                        .stores
                        .connect(&connection, &self.request_id)
                        .map_err(|source| ServiceXError::ObjectStore {
                            request_id: self.request_id.clone(),
                            source,
                        })?;
                    store = Some(client);
                }
            }

            let published = status.clone();
            let published_store = store.clone();
            self.state.send_modify(|snapshot| {
                snapshot.status = Some(published);
                snapshot.store = published_store;
            });

            if status.status.is_complete() {
                info!(
                    "Transform {} complete: {} files, {} failed",
                    self.request_id, status.files_completed, status.files_failed
                );
                return Ok(status);
            }
            if status.status.is_failed() {
                error!("Transform {} ended {}", self.request_id, status.status);
                return Err(ServiceXError::TransformFailed {
                    request_id: self.request_id.clone(),
                    status: status.status.clone(),
                    files_failed: status.files_failed,
                });
            }

            previous = Some(status);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ServiceXError::Aborted),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
