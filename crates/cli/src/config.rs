//! Configuration loading from calgate.toml.

use policy::Bundles;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Default capability bundles applied when issuance omits `--capability`.
    #[serde(default)]
    pub defaults: Bundles,
}

#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Token database path. Defaults to the per-user data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config
            .defaults
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::{Capability, owner_bundle};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.storage.path.is_none());
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.defaults, Bundles::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[storage]
path = "/var/lib/calgate/tokens.db"

[log]
level = "debug"

[defaults]
external_attendee = ["update_self_rsvp"]
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(
            config.storage.path.as_deref(),
            Some(Path::new("/var/lib/calgate/tokens.db"))
        );
        assert_eq!(config.log.level, "debug");
        assert_eq!(
            config.defaults.external_attendee.as_slice(),
            &[Capability::UpdateSelfRsvp]
        );
        assert_eq!(config.defaults.owner, owner_bundle());
    }

    #[test]
    fn test_empty_bundle_is_rejected() {
        let err = Config::parse("[defaults]\nattendee = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("calgate.toml");
        assert!(Config::load_or_default(&missing).unwrap().storage.path.is_none());

        std::fs::write(&missing, "[log]\nlevel = \"info\"\n").unwrap();
        assert_eq!(Config::load_or_default(&missing).unwrap().log.level, "info");
    }
}
