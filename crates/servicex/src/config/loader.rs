use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::Configuration;
use crate::error::ConfigError;

/// File names searched for, in order, in each directory.
pub const CONFIG_FILE_NAMES: &[&str] = &["servicex.yaml", ".servicex"];

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = parse(&content, path)?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

pub fn load_config_from_str(content: &str) -> Result<Configuration, ConfigError> {
    parse(content, Path::new("<inline>"))
}

fn parse(content: &str, origin: &Path) -> Result<Configuration, ConfigError> {
    let config: Configuration =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: origin.to_path_buf(),
            source: e,
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Looks in `start` and each of its ancestors, then the home directory.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let home = dirs::home_dir();
    start
        .ancestors()
        .map(Path::to_path_buf)
        .chain(home)
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Loads the configuration found from the current directory.
pub fn load_default_config() -> Result<Configuration, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::ReadFile {
        path: PathBuf::from("."),
        source: e,
    })?;
    match find_config_file(&cwd) {
        Some(path) => load_config(path),
        None => Err(ConfigError::NotFound {
            searched: CONFIG_FILE_NAMES.join(", "),
        }),
    }
}

fn validate_config(config: &Configuration) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::Validation { message };

    let mut names = HashSet::new();
    for endpoint in &config.api_endpoints {
        if !names.insert(endpoint.name.as_str()) {
            return Err(invalid(format!(
                "Duplicate endpoint name '{}'",
                endpoint.name
            )));
        }
        url::Url::parse(&endpoint.endpoint).map_err(|e| {
            invalid(format!(
                "Endpoint '{}' has an invalid URL: {}",
                endpoint.name, e
            ))
        })?;
    }

    if let Some(default) = &config.default_endpoint {
        if !names.contains(default.as_str()) {
            return Err(invalid(format!(
                "default_endpoint '{}' is not one of api_endpoints",
                default
            )));
        }
    }

    if config.servicex_polling_interval == 0 || config.minio_polling_interval == 0 {
        return Err(invalid("Polling intervals must be at least one second".to_string()));
    }
    if config.max_concurrent_fetches == 0 {
        return Err(invalid("max_concurrent_fetches must be positive".to_string()));
    }

    Ok(())
}
