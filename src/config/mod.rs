//! Configuration management.
//!
//! Settings come from built-in defaults, then a TOML file, then `MATHCITE_`
//! environment variables (`MATHCITE_SEARCH__SEARCH_COUNT=5`).

mod file_config;

pub use config::ConfigError;
pub use file_config::{default_toml, save_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::Separator;
use crate::harness::DEFAULT_WORKERS;
use crate::render::RenderOptions;
use crate::sources::{SourceEndpoints, SourceError};
use crate::utils::{HttpClient, DEFAULT_TIMEOUT_SECS};

/// Name of the config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "mathcite.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,

    pub output: RenderOptions,

    pub batch: BatchConfig,

    pub http: HttpConfig,

    /// Backend URLs
    pub endpoints: SourceEndpoints,
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Records requested for a single search
    pub search_count: usize,

    /// Records requested per query in batch mode
    pub batch_count: usize,

    /// Look zbMATH results up in MRef for their MR number
    pub find_other_ids: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_count: 10,
            batch_count: 3,
            find_other_ids: false,
        }
    }
}

/// Batch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub separator: Separator,

    /// Lookups run at once
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            separator: Separator::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("mathcite/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Build the shared HTTP client
    pub fn client(&self) -> Result<HttpClient, SourceError> {
        HttpClient::with_settings(&self.user_agent, Duration::from_secs(self.timeout_seconds))
    }
}

/// Load configuration from an optional file plus the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("MATHCITE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// First existing config file: `./mathcite.toml`, then `<config dir>/mathcite/config.toml`
pub fn find_config_file() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|p| p.is_file())
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("mathcite").join("config.toml"));
    }
    paths
}

/// Load from `explicit` if given, else from the first config file found, else defaults
pub fn get_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => load_config(Some(path)),
        None => {
            let found = find_config_file();
            if let Some(path) = &found {
                tracing::debug!("Using config file: {}", path.display());
            }
            load_config(found.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.search_count, 10);
        assert_eq!(config.search.batch_count, 3);
        assert_eq!(config.batch.workers, 4);
        assert_eq!(config.batch.separator, Separator::Bibitem);
        assert!(!config.output.bibtex_out);
        assert_eq!(config.http.timeout_seconds, 30);
        assert!(config.http.user_agent.starts_with("mathcite/"));
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mathcite.toml");
        std::fs::write(
            &path,
            r#"
[search]
search_count = 5
find_other_ids = true

[output]
bibtex_out = true

[batch]
separator = "empty"
workers = 2

[endpoints]
arxiv = "http://localhost:1234/search"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.search.search_count, 5);
        assert_eq!(config.search.batch_count, 3);
        assert!(config.search.find_other_ids);
        assert!(config.output.bibtex_out);
        assert!(!config.output.keep_bibitems);
        assert_eq!(config.batch.separator, Separator::Empty);
        assert_eq!(config.batch.workers, 2);
        assert_eq!(config.endpoints.arxiv, "http://localhost:1234/search");
        assert_eq!(config.endpoints.mref, SourceEndpoints::default().mref);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/mathcite.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_candidate_paths() {
        let paths = candidate_paths();
        assert_eq!(paths[0], PathBuf::from("mathcite.toml"));
        assert!(paths.iter().skip(1).all(|p| p.ends_with("mathcite/config.toml")));
    }
}
