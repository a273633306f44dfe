//! Dataset references: a DID resolved server-side, or an explicit file list.

use serde::{Deserialize, Serialize};

use super::request::TransformRequest;

/// The dataset a transform runs against.
///
/// Exactly one of `did` / `file-list` ends up populated on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetIdentifier {
    /// A dataset identifier resolved by the DID finder for `scheme`.
    Did { scheme: String, dataset: String },
    /// An explicit list of input files.
    FileList(Vec<String>),
}

impl DatasetIdentifier {
    pub fn new(scheme: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self::Did {
            scheme: scheme.into(),
            dataset: dataset.into(),
        }
    }

    /// A dataset in the Rucio catalogue.
    pub fn rucio(dataset: impl Into<String>) -> Self {
        Self::new("rucio", dataset)
    }

    pub fn file_list<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FileList(files.into_iter().map(Into::into).collect())
    }

    pub fn single_file(file: impl Into<String>) -> Self {
        Self::FileList(vec![file.into()])
    }

    /// Renders `scheme://dataset` for DID datasets.
    pub fn did(&self) -> Option<String> {
        match self {
            Self::Did { scheme, dataset } => Some(format!("{}://{}", scheme, dataset)),
            Self::FileList(_) => None,
        }
    }

    /// Writes this dataset into a request, clearing the other alternative.
    pub fn populate(&self, request: &mut TransformRequest) {
        match self {
            Self::Did { .. } => {
                request.did = self.did();
                request.file_list = None;
            }
            Self::FileList(files) => {
                request.file_list = Some(files.clone());
                request.did = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultDestination, ResultFormat};

    fn empty_request() -> TransformRequest {
        TransformRequest {
            title: None,
            did: Some("stale://did".to_string()),
            file_list: Some(vec!["stale.root".to_string()]),
            selection: "(call EventDataset)".to_string(),
            image: None,
            codegen: "uproot".to_string(),
            tree_name: None,
            result_destination: ResultDestination::ObjectStore,
            result_format: ResultFormat::Parquet,
        }
    }

    #[test]
    fn test_rucio_did() {
        let ds = DatasetIdentifier::rucio("mc16_13TeV:foo.bar");
        assert_eq!(ds.did().as_deref(), Some("rucio://mc16_13TeV:foo.bar"));
    }

    #[test]
    fn test_did_populates_only_did() {
        let mut request = empty_request();
        DatasetIdentifier::rucio("foo.bar").populate(&mut request);
        assert_eq!(request.did.as_deref(), Some("rucio://foo.bar"));
        assert!(request.file_list.is_none());
    }

    #[test]
    fn test_file_list_populates_only_files() {
        let mut request = empty_request();
        DatasetIdentifier::single_file("root://eos/file.root").populate(&mut request);
        assert!(request.did.is_none());
        assert_eq!(
            request.file_list,
            Some(vec!["root://eos/file.root".to_string()])
        );
    }
}
