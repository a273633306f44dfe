//! Test harness for isolated orchestrator runs.
//!
//! Each `TestHarness` owns a temporary cache directory and an orchestrator
//! wired to scripted fakes, polling every few milliseconds.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use servicex::progress::TransformProgress;
use servicex::{
    BroadcastProgress, ControlPlane, ObjectStoreFactory, OrchestratorOptions, QueryCache,
    TransformEvent, TransformOrchestrator,
};

use super::fakes::{FakeObjectStore, FakeStoreFactory, ScriptedControlPlane};

pub const STATUS_INTERVAL: Duration = Duration::from_millis(20);
pub const BUCKET_INTERVAL: Duration = Duration::from_millis(5);

pub struct TestHarness {
    /// Holds the cache directory alive for the test's duration.
    temp_dir: TempDir,
    pub control_plane: Arc<ScriptedControlPlane>,
    pub store: Arc<FakeObjectStore>,
    pub factory: Arc<FakeStoreFactory>,
    pub progress: BroadcastProgress,
    events: broadcast::Receiver<TransformProgress>,
    pub orchestrator: TransformOrchestrator,
}

impl TestHarness {
    pub fn new(control_plane: ScriptedControlPlane, store: FakeObjectStore) -> Self {
        Self::with_status_interval(control_plane, store, STATUS_INTERVAL)
    }

    pub fn with_status_interval(
        control_plane: ScriptedControlPlane,
        store: FakeObjectStore,
        status_interval: Duration,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let control_plane = Arc::new(control_plane);
        let store = Arc::new(store);
        let factory = Arc::new(FakeStoreFactory::new(Arc::clone(&store)));
        let progress = BroadcastProgress::new(256);
        let events = progress.subscribe();

        let orchestrator = build_orchestrator(
            temp_dir.path(),
            &control_plane,
            &factory,
            &progress,
            status_interval,
        );

        Self {
            temp_dir,
            control_plane,
            store,
            factory,
            progress,
            events,
            orchestrator,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn cache(&self) -> &QueryCache {
        self.orchestrator.cache()
    }

    /// A second orchestrator over the same cache directory, as a fresh
    /// process would see it.
    pub fn reopen(&self) -> TransformOrchestrator {
        build_orchestrator(
            self.temp_dir.path(),
            &self.control_plane,
            &self.factory,
            &self.progress,
            STATUS_INTERVAL,
        )
    }

    /// Drains every progress event reported so far.
    pub fn events(&mut self) -> Vec<TransformEvent> {
        let mut events = Vec::new();
        while let Ok(progress) = self.events.try_recv() {
            events.push(progress.event);
        }
        events
    }
}

fn build_orchestrator(
    dir: &Path,
    control_plane: &Arc<ScriptedControlPlane>,
    factory: &Arc<FakeStoreFactory>,
    progress: &BroadcastProgress,
    status_interval: Duration,
) -> TransformOrchestrator {
    let cache = QueryCache::open(dir).expect("Failed to open cache");
    let control_plane: Arc<dyn ControlPlane> = control_plane.clone();
    let factory: Arc<dyn ObjectStoreFactory> = factory.clone();
    TransformOrchestrator::new(control_plane, factory, cache)
        .with_options(OrchestratorOptions {
            status_poll_interval: status_interval,
            bucket_poll_interval: BUCKET_INTERVAL,
            max_concurrent_fetches: 4,
        })
        .with_progress(Arc::new(progress.clone()))
}
