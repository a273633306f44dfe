use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestratorOptions;
use crate::sanitize::REDACTED;

/// Environment variable overriding `cache_path`.
pub const CACHE_PATH_ENV: &str = "SERVICEX_CACHE_PATH";

/// A named ServiceX deployment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub api_endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default)]
    pub default_endpoint: Option<String>,
    /// Seconds between status polls.
    #[serde(default = "default_servicex_polling_interval")]
    pub servicex_polling_interval: u64,
    /// Seconds between bucket listings.
    #[serde(default = "default_minio_polling_interval")]
    pub minio_polling_interval: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

fn default_servicex_polling_interval() -> u64 {
    10
}

fn default_minio_polling_interval() -> u64 {
    5
}

fn default_max_concurrent_fetches() -> usize {
    8
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_endpoints: Vec::new(),
            cache_path: None,
            default_endpoint: None,
            servicex_polling_interval: default_servicex_polling_interval(),
            minio_polling_interval: default_minio_polling_interval(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Configuration {
    /// The endpoint called `name`, or the default one: `default_endpoint`
    /// if set, else the first listed.
    pub fn endpoint(&self, name: Option<&str>) -> Option<&Endpoint> {
        match name.or(self.default_endpoint.as_deref()) {
            Some(name) => self.api_endpoints.iter().find(|e| e.name == name),
            None => self.api_endpoints.first(),
        }
    }

    /// Cache directory after applying the environment override and defaults.
    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path_with_override(std::env::var_os(CACHE_PATH_ENV).map(PathBuf::from))
    }

    fn cache_path_with_override(&self, env_override: Option<PathBuf>) -> PathBuf {
        env_override
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.cache_path.clone())
            .unwrap_or_else(default_cache_path)
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            status_poll_interval: Duration::from_secs(self.servicex_polling_interval),
            bucket_poll_interval: Duration::from_secs(self.minio_polling_interval),
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }
}

/// `<user cache dir>/servicex`, or the temp directory when there is none.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("servicex")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Configuration {
        Configuration {
            api_endpoints: vec![
                Endpoint {
                    name: "uc-af".to_string(),
                    endpoint: "https://uc.example.org".to_string(),
                    token: Some("abc".to_string()),
                },
                Endpoint {
                    name: "local".to_string(),
                    endpoint: "http://localhost:5000".to_string(),
                    token: None,
                },
            ],
            ..Configuration::default()
        }
    }

    #[test]
    fn test_endpoint_selection() {
        let mut config = endpoints();
        assert_eq!(config.endpoint(None).unwrap().name, "uc-af");
        assert_eq!(config.endpoint(Some("local")).unwrap().name, "local");
        assert!(config.endpoint(Some("missing")).is_none());

        config.default_endpoint = Some("local".to_string());
        assert_eq!(config.endpoint(None).unwrap().name, "local");
    }

    #[test]
    fn test_cache_path_precedence() {
        let mut config = Configuration::default();
        assert_eq!(config.cache_path_with_override(None), default_cache_path());

        config.cache_path = Some(PathBuf::from("/data/cache"));
        assert_eq!(
            config.cache_path_with_override(None),
            PathBuf::from("/data/cache")
        );
        assert_eq!(
            config.cache_path_with_override(Some(PathBuf::from("/env/cache"))),
            PathBuf::from("/env/cache")
        );
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let rendered = format!("{:?}", endpoints());
        assert!(!rendered.contains("abc"));
        assert!(rendered.contains(REDACTED));
    }

    #[test]
    fn test_orchestrator_options() {
        let options = Configuration::default().orchestrator_options();
        assert_eq!(options.status_poll_interval, Duration::from_secs(10));
        assert_eq!(options.bucket_poll_interval, Duration::from_secs(5));
        assert_eq!(options.max_concurrent_fetches, 8);
    }
}
