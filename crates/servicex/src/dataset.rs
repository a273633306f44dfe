//! Query facade over one dataset.

use crate::error::Result;
use crate::models::{DatasetIdentifier, ResultFormat};
use crate::orchestrator::{DeliveryMode, QuerySpec, TransformOrchestrator, TransformResult};
use crate::query::{Expr, ObjectStream};

/// A query being built against a dataset.
///
/// Borrows the orchestrator, so every dataset derived from a client shares
/// its cache and transports. The query itself is plain data and is copied
/// when a dataset is cloned.
#[derive(Clone)]
pub struct Dataset<'a> {
    orchestrator: &'a TransformOrchestrator,
    dataset: DatasetIdentifier,
    title: Option<String>,
    codegen: String,
    stream: ObjectStream,
}

impl<'a> Dataset<'a> {
    pub fn new(
        orchestrator: &'a TransformOrchestrator,
        dataset: DatasetIdentifier,
        codegen: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            dataset,
            title: None,
            codegen: codegen.into(),
            stream: ObjectStream::event_dataset(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn stream(&self) -> &ObjectStream {
        &self.stream
    }

    pub fn select(mut self, lambda: &str) -> Result<Self> {
        self.stream = self.stream.select(lambda)?;
        Ok(self)
    }

    pub fn select_many(mut self, lambda: &str) -> Result<Self> {
        self.stream = self.stream.select_many(lambda)?;
        Ok(self)
    }

    pub fn where_(mut self, lambda: &str) -> Result<Self> {
        self.stream = self.stream.where_(lambda)?;
        Ok(self)
    }

    fn spec(&self, query: Expr, result_format: Option<ResultFormat>) -> QuerySpec {
        QuerySpec {
            dataset: self.dataset.clone(),
            title: self.title.clone(),
            codegen: self.codegen.clone(),
            query,
            result_format,
        }
    }

    async fn run(
        &self,
        query: Expr,
        result_format: Option<ResultFormat>,
        delivery: DeliveryMode,
    ) -> Result<TransformResult> {
        let spec = self.spec(query, result_format);
        let compiled = spec.compile()?;
        let request = spec.to_request(&compiled)?;
        self.orchestrator
            .submit_and_download(&request, delivery)
            .await
    }

    /// The qastle this dataset's query compiles to. Touches neither the
    /// network nor the cache.
    pub fn as_qastle(&self) -> Result<String> {
        Ok(self.spec(self.stream.expr().clone(), None).compile()?.text)
    }

    pub async fn as_parquet_files(&self) -> Result<TransformResult> {
        self.run(
            self.stream.expr().clone(),
            Some(ResultFormat::Parquet),
            DeliveryMode::Download,
        )
        .await
    }

    pub async fn as_root_files(&self) -> Result<TransformResult> {
        self.run(
            self.stream.expr().clone(),
            Some(ResultFormat::RootFile),
            DeliveryMode::Download,
        )
        .await
    }

    /// Pre-signed URLs for the result objects instead of downloads.
    pub async fn as_signed_urls(&self, result_format: ResultFormat) -> Result<TransformResult> {
        self.run(
            self.stream.expr().clone(),
            Some(result_format),
            DeliveryMode::SignedUrls,
        )
        .await
    }

    /// Runs a query ending in a terminal call such as
    /// `dataset.stream().clone().result_parquet(&["pt"])`; the terminal
    /// decides the result format.
    pub async fn as_files(&self, query: Expr) -> Result<TransformResult> {
        self.run(query, None, DeliveryMode::Download).await
    }
}
