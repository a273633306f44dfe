//! Transform submission request and its cache identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where the transformers write their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultDestination {
    #[serde(rename = "object-store")]
    ObjectStore,
    #[serde(rename = "volume")]
    Volume,
}

/// File format of the transform output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultFormat {
    #[serde(rename = "parquet")]
    Parquet,
    #[serde(rename = "root-file")]
    RootFile,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Parquet => "parquet",
            ResultFormat::RootFile => "root-file",
        }
    }

    /// Picks the first entry of `preferred` that the backend `supported`.
    pub fn negotiate(preferred: &[ResultFormat], supported: &[ResultFormat]) -> Option<Self> {
        preferred.iter().copied().find(|f| supported.contains(f))
    }
}

impl std::fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transform submission, serialized as the control plane expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    /// Human readable label. Not part of the request's identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(rename = "file-list", default, skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<String>>,
    /// The compiled query text.
    pub selection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub codegen: String,
    #[serde(rename = "tree-name", default, skip_serializing_if = "Option::is_none")]
    pub tree_name: Option<String>,
    #[serde(rename = "result-destination")]
    pub result_destination: ResultDestination,
    #[serde(rename = "result-format")]
    pub result_format: ResultFormat,
}

/// Every request field except the title, in a fixed order.
#[derive(Serialize)]
struct HashKey<'a> {
    did: &'a Option<String>,
    file_list: &'a Option<Vec<String>>,
    selection: &'a str,
    image: &'a Option<String>,
    codegen: &'a str,
    tree_name: &'a Option<String>,
    result_destination: ResultDestination,
    result_format: ResultFormat,
}

impl TransformRequest {
    /// Content hash used as the cache key.
    ///
    /// Two requests that differ only in `title` hash the same.
    pub fn compute_hash(&self) -> String {
        let key = HashKey {
            did: &self.did,
            file_list: &self.file_list,
            selection: &self.selection,
            image: &self.image,
            codegen: &self.codegen,
            tree_name: &self.tree_name,
            result_destination: self.result_destination,
            result_format: self.result_format,
        };
        // Serializing a struct of plain strings and unit enums cannot fail.
        let encoded = serde_json::to_vec(&key).unwrap_or_default();
        format!("{:x}", Sha256::digest(&encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransformRequest {
        TransformRequest {
            title: Some("Test submission".to_string()),
            did: Some("rucio://foo.bar".to_string()),
            file_list: None,
            selection: "(call EventDataset)".to_string(),
            image: None,
            codegen: "uproot".to_string(),
            tree_name: None,
            result_destination: ResultDestination::ObjectStore,
            result_format: ResultFormat::Parquet,
        }
    }

    #[test]
    fn test_hash_ignores_title() {
        let first = sample();
        let mut second = sample();
        second.title = Some("This has changed".to_string());
        assert_eq!(first.compute_hash(), second.compute_hash());

        second.title = None;
        assert_eq!(first.compute_hash(), second.compute_hash());
    }

    #[test]
    fn test_hash_tracks_did_and_selection() {
        let first = sample();

        let mut other_did = sample();
        other_did.did = Some("rucio://baz.bar".to_string());
        assert_ne!(first.compute_hash(), other_did.compute_hash());

        let mut other_query = sample();
        other_query.selection = "(Select (call EventDataset) (lambda (list e) e))".to_string();
        assert_ne!(first.compute_hash(), other_query.compute_hash());

        let mut other_format = sample();
        other_format.result_format = ResultFormat::RootFile;
        assert_ne!(first.compute_hash(), other_format.compute_hash());
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = sample().compute_hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_wire_shape_uses_kebab_keys_and_omits_none() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["result-destination"], "object-store");
        assert_eq!(value["result-format"], "parquet");
        assert_eq!(value["did"], "rucio://foo.bar");
        assert!(value.get("file-list").is_none());
        assert!(value.get("tree-name").is_none());
        assert!(value.get("image").is_none());
    }

    #[test]
    fn test_negotiate_prefers_first_supported() {
        let preferred = [ResultFormat::Parquet, ResultFormat::RootFile];
        assert_eq!(
            ResultFormat::negotiate(&preferred, &[ResultFormat::RootFile, ResultFormat::Parquet]),
            Some(ResultFormat::Parquet)
        );
        assert_eq!(
            ResultFormat::negotiate(&preferred, &[ResultFormat::RootFile]),
            Some(ResultFormat::RootFile)
        );
        assert_eq!(ResultFormat::negotiate(&preferred, &[]), None);
    }
}
