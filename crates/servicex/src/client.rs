//! Entry point tying configuration, transports and the cache together.

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::SecretString;

use crate::adapter::{MinioFactory, ServiceXAdapter};
use crate::cache::QueryCache;
use crate::config::{load_default_config, Configuration};
use crate::dataset::Dataset;
use crate::error::{Result, ServiceXError};
use crate::models::{DatasetIdentifier, TransformStatus};
use crate::orchestrator::TransformOrchestrator;
use crate::sanitize::{redact_path, redact_url};

pub struct ServiceXClient {
    adapter: Arc<ServiceXAdapter>,
    orchestrator: TransformOrchestrator,
}

impl ServiceXClient {
    /// Client for the configured endpoint called `backend`, or the default
    /// endpoint when `None`.
    pub fn from_config(config: &Configuration, backend: Option<&str>) -> Result<Self> {
        let endpoint = config.endpoint(backend).ok_or_else(|| {
            ServiceXError::NoEndpoint(backend.unwrap_or("<default>").to_string())
        })?;
        let token = endpoint.token.clone().map(SecretString::from);
        Self::connect(config, &endpoint.endpoint, token)
    }

    /// Client for the endpoint found in the discovered configuration file.
    pub fn from_default_config(backend: Option<&str>) -> Result<Self> {
        Self::from_config(&load_default_config()?, backend)
    }

    /// Client for an explicit URL, taking cache and polling settings from
    /// `config`.
    pub fn from_url(config: &Configuration, url: &str) -> Result<Self> {
        Self::connect(config, url, None)
    }

    fn connect(config: &Configuration, url: &str, token: Option<SecretString>) -> Result<Self> {
        let adapter = Arc::new(ServiceXAdapter::new(url, token)?);
        let cache_path = config.resolved_cache_path();
        let cache = QueryCache::open(&cache_path)?;
        log::info!(
            "ServiceX client for {} (cache in {})",
            redact_url(url),
            redact_path(&cache_path)
        );

        let orchestrator = TransformOrchestrator::new(
            adapter.clone(),
            Arc::new(MinioFactory::default()),
            cache,
        )
        .with_options(config.orchestrator_options());

        Ok(Self {
            adapter,
            orchestrator,
        })
    }

    /// Starts a query against `dataset` for the given code generator.
    pub fn func_adl_dataset(
        &self,
        dataset: DatasetIdentifier,
        title: Option<&str>,
        codegen: &str,
    ) -> Dataset<'_> {
        let ds = Dataset::new(&self.orchestrator, dataset, codegen);
        match title {
            Some(title) => ds.with_title(title),
            None => ds,
        }
    }

    pub async fn get_transforms(&self) -> Result<Vec<TransformStatus>> {
        Ok(self.adapter.get_transforms().await?)
    }

    pub async fn get_code_generators(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.adapter.get_code_generators().await?)
    }

    pub fn url(&self) -> &str {
        self.adapter.url()
    }

    pub fn cache(&self) -> &QueryCache {
        self.orchestrator.cache()
    }

    pub fn orchestrator(&self) -> &TransformOrchestrator {
        &self.orchestrator
    }
}
