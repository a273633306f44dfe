//! Result-collecting half of a running transform.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::{DeliveryMode, JobSnapshot};
use crate::adapter::ObjectStoreClient;
use crate::error::{Result, ServiceXError};
use crate::progress::{ProgressReporter, TransformEvent};

type FetchOutput = (usize, Result<String>);

/// Lists the result bucket and fetches each object the first time it
/// shows up.
///
/// Stops listing once the monitor has published a complete status, then
/// waits for the fetches still in flight. Results keep first-seen order.
pub(crate) struct ResultDrain {
    pub state: watch::Receiver<JobSnapshot>,
    pub data_dir: PathBuf,
    pub delivery: DeliveryMode,
    pub interval: Duration,
    pub max_concurrent_fetches: usize,
    pub progress: Arc<dyn ProgressReporter>,
    pub request_id: String,
    pub cancel: CancellationToken,
}

impl ResultDrain {
    pub async fn run(self) -> Result<Vec<String>> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_fetches.max(1)));
        let mut seen: HashSet<String> = HashSet::new();
        let mut results: Vec<Option<String>> = Vec::new();
        let mut fetches: JoinSet<FetchOutput> = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.abort(&mut fetches)),
                _ = tokio::time::sleep(self.interval) => {}
            }

            // Read completion before listing: everything written before the
            // complete status is then guaranteed to be in this listing.
            let (complete, store) = {
                let snapshot = self.state.borrow();
                let complete = snapshot
                    .status
                    .as_ref()
                    .is_some_and(|s| s.status.is_complete());
                (complete, snapshot.store.clone())
            };

            if let Some(store) = store {
                let listing = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(self.abort(&mut fetches)),
                    listing = store.list_bucket() => listing,
                };
                let objects = listing.map_err(|source| ServiceXError::ObjectStore {
                    request_id: self.request_id.clone(),
                    source,
                })?;

                for object in objects {
                    if !seen.insert(object.filename.clone()) {
                        continue;
                    }
                    let index = results.len();
                    results.push(None);
                    debug!("New result object {} (#{})", object.filename, index);
                    self.spawn_fetch(&mut fetches, &permits, &store, index, object.filename);
                }
            }

            while let Some(joined) = fetches.try_join_next() {
                self.collect(joined, &mut results)?;
            }

            if complete {
                break;
            }
        }

        while !fetches.is_empty() {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                joined = fetches.join_next() => Some(joined),
            };
            match joined {
                None => return Err(self.abort(&mut fetches)),
                Some(Some(joined)) => self.collect(joined, &mut results)?,
                Some(None) => break,
            }
        }

        info!(
            "Collected {} result files for transform {}",
            results.len(),
            self.request_id
        );
        Ok(results.into_iter().flatten().collect())
    }

    fn spawn_fetch(
        &self,
        fetches: &mut JoinSet<FetchOutput>,
        permits: &Arc<Semaphore>,
        store: &Arc<dyn ObjectStoreClient>,
        index: usize,
        object: String,
    ) {
        let permits = Arc::clone(permits);
        let store = Arc::clone(store);
        let data_dir = self.data_dir.clone();
        let delivery = self.delivery;

        fetches.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (index, Err(ServiceXError::Aborted));
            };
            let fetched = match delivery {
                DeliveryMode::Download => store
                    .download_file(&object, &data_dir)
                    .await
                    .map(|path| path.to_string_lossy().into_owned()),
                DeliveryMode::SignedUrls => store.get_signed_url(&object).await,
            };
            (
                index,
                fetched.map_err(|source| ServiceXError::Fetch { object, source }),
            )
        });
    }

    fn collect(
        &self,
        joined: std::result::Result<FetchOutput, JoinError>,
        results: &mut [Option<String>],
    ) -> Result<()> {
        let (index, fetched) = joined.map_err(|e| ServiceXError::TaskFailed(e.to_string()))?;
        let uri = fetched?;
        self.progress.report(
            &self.request_id,
            TransformEvent::FileFetched { uri: uri.clone() },
        );
        results[index] = Some(uri);
        Ok(())
    }

    fn abort(&self, fetches: &mut JoinSet<FetchOutput>) -> ServiceXError {
        if !fetches.is_empty() {
            info!(
                "Cancelling {} pending fetches for transform {}",
                fetches.len(),
                self.request_id
            );
        }
        fetches.abort_all();
        ServiceXError::Aborted
    }
}
