//! In-memory stand-ins for the control plane and the result bucket.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use servicex::models::MinioConnection;
use servicex::sanitize::local_object_path;
use servicex::{
    AdapterError, ControlPlane, ObjectStoreClient, ObjectStoreFactory, ResultFile,
    TransformRequest, TransformStatus,
};

/// One scripted answer to a status poll.
#[derive(Clone)]
pub enum Step {
    Status(TransformStatus),
    Error(String),
}

fn protocol_error(reason: &str) -> AdapterError {
    AdapterError::Protocol {
        url: "http://servicex.test".to_string(),
        reason: reason.to_string(),
    }
}

/// Answers status polls from a script. Once the script runs out the last
/// step repeats.
pub struct ScriptedControlPlane {
    request_id: String,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    fail_submit: bool,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub submitted: Mutex<Vec<TransformRequest>>,
    reveals: Mutex<Vec<(usize, Arc<FakeObjectStore>, String)>>,
}

impl ScriptedControlPlane {
    pub fn new(request_id: &str, steps: Vec<Step>) -> Self {
        Self {
            request_id: request_id.to_string(),
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            fail_submit: false,
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            reveals: Mutex::new(Vec::new()),
        }
    }

    pub fn statuses(request_id: &str, statuses: Vec<TransformStatus>) -> Self {
        Self::new(request_id, statuses.into_iter().map(Step::Status).collect())
    }

    pub fn rejecting_submissions(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    /// Writes `objects` into `store` just before answering poll number
    /// `poll` (counting from 1), as a transformer finishing a file would.
    pub fn reveal_on_poll(&self, poll: usize, store: &Arc<FakeObjectStore>, objects: &[&str]) {
        let mut reveals = self.reveals.lock().unwrap();
        for object in objects {
            reveals.push((poll, Arc::clone(store), object.to_string()));
        }
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn submit_transform(&self, request: &TransformRequest) -> Result<String, AdapterError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit {
            return Err(AdapterError::Status {
                url: "http://servicex.test/servicex/transformation".to_string(),
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(request.clone());
        Ok(self.request_id.clone())
    }

    async fn get_transform_status(
        &self,
        request_id: &str,
    ) -> Result<TransformStatus, AdapterError> {
        assert_eq!(request_id, self.request_id);
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        for (at, store, object) in self.reveals.lock().unwrap().iter() {
            if *at == poll {
                store.add_object(object);
            }
        }

        let step = {
            let mut steps = self.steps.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match steps.pop_front() {
                Some(step) => {
                    *last = Some(step.clone());
                    step
                }
                None => last.clone().expect("script must have at least one step"),
            }
        };
        match step {
            Step::Status(status) => Ok(status),
            Step::Error(reason) => Err(protocol_error(&reason)),
        }
    }
}

/// A bucket whose listing is fixed up front.
pub struct FakeObjectStore {
    bucket: Mutex<String>,
    objects: Mutex<Vec<ResultFile>>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    hang_downloads: bool,
    pub listings: AtomicUsize,
    pub downloads_started: AtomicUsize,
    pub downloads_finished: AtomicUsize,
}

impl FakeObjectStore {
    pub fn new<I, S>(objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bucket: Mutex::new(String::new()),
            objects: Mutex::new(objects.into_iter().map(|o| ResultFile::new(o, 1024)).collect()),
            delays: HashMap::new(),
            failing: HashSet::new(),
            hang_downloads: false,
            listings: AtomicUsize::new(0),
            downloads_started: AtomicUsize::new(0),
            downloads_finished: AtomicUsize::new(0),
        }
    }

    /// Slows the download of one object.
    pub fn with_delay(mut self, object: &str, delay: Duration) -> Self {
        self.delays.insert(object.to_string(), delay);
        self
    }

    pub fn failing_on(mut self, object: &str) -> Self {
        self.failing.insert(object.to_string());
        self
    }

    /// Downloads never finish.
    pub fn hanging(mut self) -> Self {
        self.hang_downloads = true;
        self
    }

    pub fn add_object(&self, name: &str) {
        self.objects.lock().unwrap().push(ResultFile::new(name, 1024));
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.downloads_started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.downloads_finished.load(Ordering::SeqCst)
    }

    async fn fetch_delay(&self, object_name: &str) -> Result<(), AdapterError> {
        self.downloads_started.fetch_add(1, Ordering::SeqCst);
        if self.hang_downloads {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(object_name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(object_name) {
            return Err(protocol_error(&format!("cannot read {}", object_name)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for FakeObjectStore {
    async fn list_bucket(&self) -> Result<Vec<ResultFile>, AdapterError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().clone())
    }

    async fn download_file(&self, object_name: &str, dir: &Path) -> Result<PathBuf, AdapterError> {
        self.fetch_delay(object_name).await?;
        let Some(relative) = local_object_path(object_name) else {
            return Err(AdapterError::UnsafeObjectName {
                name: object_name.to_string(),
            });
        };
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AdapterError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, object_name.as_bytes())
            .await
            .map_err(|source| AdapterError::Io {
                path: path.clone(),
                source,
            })?;
        self.downloads_finished.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    async fn get_signed_url(&self, object_name: &str) -> Result<String, AdapterError> {
        self.fetch_delay(object_name).await?;
        self.downloads_finished.fetch_add(1, Ordering::SeqCst);
        let bucket = self.bucket.lock().unwrap().clone();
        Ok(format!(
            "http://minio.servicex.test:9000/{}/{}?X-Amz-Signature=fake",
            bucket, object_name
        ))
    }
}

/// Hands out the same [`FakeObjectStore`] for every connection.
pub struct FakeStoreFactory {
    store: Arc<FakeObjectStore>,
    pub connects: AtomicUsize,
}

impl FakeStoreFactory {
    pub fn new(store: Arc<FakeObjectStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl ObjectStoreFactory for FakeStoreFactory {
    fn connect(
        &self,
        connection: &MinioConnection,
        bucket: &str,
    ) -> Result<Arc<dyn ObjectStoreClient>, AdapterError> {
        assert_eq!(connection.secret_key.expose(), "leftfoot1");
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.store.bucket.lock().unwrap() = bucket.to_string();
        let client: Arc<dyn ObjectStoreClient> = self.store.clone();
        Ok(client)
    }
}
