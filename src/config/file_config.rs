//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! search_count = 10
//! batch_count = 3
//! find_other_ids = false
//!
//! [output]
//! bibtex_out = false
//! keep_bibitems = false
//! gen_bibitems = false
//! html = false
//!
//! [batch]
//! separator = "bibitem"   # or "empty", "newline"
//! workers = 4
//!
//! [http]
//! timeout_seconds = 30
//! user_agent = "mathcite/0.1.0"
//!
//! [endpoints]
//! mathscinet = "https://mathscinet.ams.org/mathscinet/search/publications.html"
//! mref = "https://mathscinet.ams.org/mathscinet-mref"
//! zbmath = "https://zbmath.org/"
//! zbmath_bib = "https://zbmath.org"
//! arxiv = "https://front.math.ucdavis.edu/search"
//! ```

use std::path::Path;

use super::Config;

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// The default configuration as TOML
pub fn default_toml() -> Result<String, ConfigFileError> {
    toml::to_string_pretty(&Config::default()).map_err(|e| ConfigFileError::Serialize(e.to_string()))
}

/// Write a configuration to a TOML file, creating parent directories
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Separator;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[test]
    fn test_default_toml_sections() {
        let text = default_toml().unwrap();
        for section in ["[search]", "[output]", "[batch]", "[http]", "[endpoints]"] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("separator = \"bibitem\""));
        assert!(!text.contains("kind"));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.search.search_count = 7;
        config.batch.separator = Separator::Newline;
        config.output.html = true;

        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }
}
