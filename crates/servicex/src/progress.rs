//! Progress reporting for running transforms.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Something that happened to a transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformEvent {
    Submitted,
    /// The total file count became known. Sent at most once.
    TotalFiles { total: u32 },
    Progress { completed: u32, failed: u32 },
    /// A result object was downloaded or signed.
    FileFetched { uri: String },
    Completed { files_completed: u32, files_failed: u32 },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, request_id: &str, event: TransformEvent);
}

/// Discards every event.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _request_id: &str, _event: TransformEvent) {}
}

/// Writes events to the log.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, request_id: &str, event: TransformEvent) {
        match event {
            TransformEvent::Submitted => log::info!("[{}] submitted", request_id),
            TransformEvent::TotalFiles { total } => {
                log::info!("[{}] {} files to transform", request_id, total)
            }
            TransformEvent::Progress { completed, failed } => {
                log::debug!("[{}] {} completed, {} failed", request_id, completed, failed)
            }
            TransformEvent::FileFetched { uri } => log::debug!("[{}] fetched {}", request_id, uri),
            TransformEvent::Completed {
                files_completed,
                files_failed,
            } => log::info!(
                "[{}] complete: {} files, {} failed",
                request_id,
                files_completed,
                files_failed
            ),
            TransformEvent::Failed { error } => log::error!("[{}] failed: {}", request_id, error),
        }
    }
}

/// A progress event as sent to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformProgress {
    pub request_id: String,
    pub event: TransformEvent,
    pub timestamp: DateTime<Utc>,
}

/// Fans events out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<TransformProgress>>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransformProgress> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, request_id: &str, event: TransformEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(TransformProgress {
            request_id: request_id.to_string(),
            event,
            timestamp: Utc::now(),
        });
    }
}
