//! TOML configuration file.
//!
//! ```toml
//! corpus = "skills"
//!
//! [engine.matcher]
//! policy = "specificity"
//! greediness = "longest"
//! max_candidates = 0
//!
//! [engine.evaluator]
//! lookup_timeout_ms = 2000
//!
//! [lookups.capital]
//! key = "country"
//! [lookups.capital.entries.france]
//! capital = "Paris"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::lookup::{LookupRegistry, StaticLookup, StaticLookupConfig};

/// Contents of a `mindmeld.toml` file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Default corpus path: a skill file or a directory of skill files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<PathBuf>,
    pub engine: EngineConfig,
    /// Static lookup tables by service name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub lookups: BTreeMap<String, StaticLookupConfig>,
}

impl ConfigFile {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        // A relative corpus path is relative to the config file.
        if let (Some(corpus), Some(dir)) = (&config.corpus, path.parent()) {
            if corpus.is_relative() {
                config.corpus = Some(dir.join(corpus));
            }
        }
        Ok(config)
    }

    /// Parse TOML text. Paths are taken as written.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Build a registry holding one [`StaticLookup`] per `[lookups.*]` table.
    pub fn lookup_registry(&self) -> LookupRegistry {
        let mut registry = LookupRegistry::new();
        for (name, table) in &self.lookups {
            registry.register(Box::new(StaticLookup::from_config(name.clone(), table)));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupRequest;
    use crate::matcher::{Greediness, MatchPolicy};
    use std::time::Duration;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
        corpus = "skills"

        [engine.matcher]
        policy = "declaration"
        greediness = "shortest"
        max_candidates = 3

        [engine.evaluator]
        lookup_timeout_ms = 500

        [lookups.capital]
        key = "country"
        [lookups.capital.entries.france]
        capital = "Paris"
    "#;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ConfigFile::from_toml_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.engine.evaluator.lookup_timeout_ms, 2000);
        assert_eq!(config.engine.matcher.policy, MatchPolicy::Specificity);
    }

    #[test]
    fn parses_all_sections() {
        let config = ConfigFile::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.corpus, Some(PathBuf::from("skills")));
        assert_eq!(config.engine.matcher.policy, MatchPolicy::Declaration);
        assert_eq!(config.engine.matcher.greediness, Greediness::Shortest);
        assert_eq!(config.engine.matcher.max_candidates, 3);
        assert_eq!(config.engine.evaluator.lookup_timeout_ms, 500);

        let registry = config.lookup_registry();
        assert_eq!(registry.names(), vec!["capital"]);
        let request = LookupRequest::new(
            [("country".to_string(), "France".to_string())].into(),
            Duration::from_secs(1),
        );
        let out = registry.get("capital").unwrap().lookup(&request).unwrap();
        assert_eq!(out[0].value, "Paris");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(
            ConfigFile::from_toml_str("[engine.matcher]\npolicy = \"random\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn load_resolves_corpus_relative_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mindmeld.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.corpus, Some(dir.path().join("skills")));
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("mindmeld.toml");
        let config = ConfigFile::from_toml_str(SAMPLE).unwrap();

        config.save(&path).unwrap();
        let loaded = ConfigFile::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ConfigFile::load(&dir.path().join("nope.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
