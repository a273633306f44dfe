//! Tests for the user-facing surface: configuration files, the client and
//! dataset query building.

mod common;

use std::fs;

use tempfile::TempDir;

use common::{FakeObjectStore, ScriptedControlPlane, StatusBuilder, TestHarness};
use servicex::{
    load_config, ConfigError, Dataset, DatasetIdentifier, ResultFormat, ServiceXClient,
    ServiceXError,
};

const CONFIG: &str = r#"
api_endpoints:
  - name: production
    endpoint: https://servicex.af.uchicago.edu
    token: not-a-real-token
  - name: testing
    endpoint: http://localhost:5000
default_endpoint: testing
servicex_polling_interval: 3
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("servicex.yaml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_config_file_selects_endpoints() {
    let dir = TempDir::new().unwrap();
    let mut config = load_config(write_config(&dir, CONFIG)).unwrap();
    config.cache_path = Some(dir.path().join("cache"));

    let client = ServiceXClient::from_config(&config, None).unwrap();
    assert_eq!(client.url(), "http://localhost:5000");

    let client = ServiceXClient::from_config(&config, Some("production")).unwrap();
    assert_eq!(client.url(), "https://servicex.af.uchicago.edu");
    assert_eq!(
        client.orchestrator().options().status_poll_interval.as_secs(),
        3
    );

    assert!(matches!(
        ServiceXClient::from_config(&config, Some("staging")),
        Err(ServiceXError::NoEndpoint(name)) if name == "staging"
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "api_endpoints:\n  - name: a\n    endpoint: http://a\ndefault_endpoint: b\n",
    );
    assert!(matches!(
        load_config(path),
        Err(ConfigError::Validation { .. })
    ));
}

#[test]
fn test_token_never_printed() {
    let dir = TempDir::new().unwrap();
    let config = load_config(write_config(&dir, CONFIG)).unwrap();
    let printed = format!("{:?}", config);
    assert!(!printed.contains("not-a-real-token"));
}

#[test]
fn test_dataset_builds_qastle_without_network() {
    let dir = TempDir::new().unwrap();
    let mut config = load_config(write_config(&dir, CONFIG)).unwrap();
    config.cache_path = Some(dir.path().join("cache"));
    let client = ServiceXClient::from_config(&config, None).unwrap();

    let qastle = client
        .func_adl_dataset(DatasetIdentifier::rucio("mc16:DAOD_PHYS"), Some("Jets"), "uproot")
        .select_many("lambda e: e.Jets")
        .unwrap()
        .select("lambda j: j.pt()")
        .unwrap()
        .as_qastle()
        .unwrap();

    assert_eq!(
        qastle,
        "(Select (SelectMany (call EventDataset) (lambda (list e) (attr e 'Jets'))) \
         (lambda (list j) (call (attr j 'pt'))))"
    );
    assert!(client.cache().list_transforms().unwrap().is_empty());
}

#[test]
fn test_dataset_rejects_non_lambda() {
    let harness = TestHarness::new(
        ScriptedControlPlane::statuses("J1", vec![StatusBuilder::complete("J1").build()]),
        FakeObjectStore::new(["out_1.parquet"]),
    );
    let ds = Dataset::new(
        &harness.orchestrator,
        DatasetIdentifier::rucio("mc16:DAOD"),
        "uproot",
    );
    assert!(matches!(
        ds.select("e.pt"),
        Err(ServiceXError::Compilation(_))
    ));
}

#[tokio::test]
async fn test_dataset_parquet_files() {
    let harness = TestHarness::new(
        ScriptedControlPlane::statuses(
            "J1",
            vec![StatusBuilder::complete("J1").files(1).completed(1).build()],
        ),
        FakeObjectStore::new(["out_1.parquet"]),
    );
    let ds = Dataset::new(
        &harness.orchestrator,
        DatasetIdentifier::single_file("root://eos/a.root"),
        "uproot",
    )
    .with_title("MET")
    .select("lambda e: e.met")
    .unwrap();

    let result = ds.as_parquet_files().await.unwrap();
    assert_eq!(result.files.len(), 1);

    let submitted = harness.control_plane.submitted.lock().unwrap();
    assert_eq!(submitted[0].result_format, ResultFormat::Parquet);
    assert_eq!(submitted[0].title.as_deref(), Some("MET"));
    assert_eq!(
        submitted[0].selection,
        "(Select (call EventDataset) (lambda (list e) (attr e 'met')))"
    );
}
