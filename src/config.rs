//! Application settings (`~/.config/scogen/config.ron`) and the score
//! provider configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::DEFAULT_AUTOSAVE_INTERVAL;

const APP_DIR: &str = "scogen";
const CONFIG_FILE: &str = "config.ron";
const PROVIDER_CONFIG_FILE: &str = "firebase.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {}: {source}", .path.display())]
    Ron {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid provider config in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("provider config in {} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub autosave_interval_secs: u64,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
    pub provider_config_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL.as_secs(),
            log_filter: "info".to_string(),
            log_dir: None,
            provider_config_path: None,
        }
    }
}

impl AppConfig {
    /// `~/.config/scogen/config.ron` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&text).map_err(|source| ConfigError::Ron {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads settings from `path` (or the default location). A missing file
    /// yields the defaults; a broken one yields the defaults plus the error,
    /// so the caller can report it once logging is up.
    pub fn load(path: Option<&Path>) -> (Self, Option<ConfigError>) {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return (Self::default(), None);
        };
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::from_file(&path) {
            Ok(config) => (config, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("logs")))
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn provider_config_path(&self) -> Option<PathBuf> {
        self.provider_config_path
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR).join(PROVIDER_CONFIG_FILE)))
    }
}

/// Reads a score provider configuration. The file must hold one JSON object.
pub fn load_provider_config(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::NotAnObject {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "(autosave_interval_secs: 10)").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.autosave_interval(), Duration::from_secs(10));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn broken_settings_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "(autosave_interval_secs: \"soon\")").unwrap();

        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Ron { .. })
        ));
        let (config, error) = AppConfig::load(Some(&path));
        assert_eq!(config, AppConfig::default());
        assert!(matches!(error, Some(ConfigError::Ron { .. })));
    }

    #[test]
    fn missing_settings_are_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, error) = AppConfig::load(Some(&dir.path().join(CONFIG_FILE)));
        assert_eq!(config, AppConfig::default());
        assert!(error.is_none());
    }

    #[test]
    fn zero_interval_is_raised() {
        let config = AppConfig {
            autosave_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.autosave_interval(), Duration::from_secs(1));
    }

    #[test]
    fn provider_config_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROVIDER_CONFIG_FILE);

        fs::write(&path, r#"{ "apiKey": "k", "projectId": "quiz" }"#).unwrap();
        let map = load_provider_config(&path).unwrap();
        assert_eq!(map["projectId"], Value::String("quiz".into()));

        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_provider_config(&path),
            Err(ConfigError::NotAnObject { .. })
        ));

        fs::write(&path, "{ apiKey: 'k' }").unwrap();
        assert!(matches!(
            load_provider_config(&path),
            Err(ConfigError::Json { .. })
        ));
    }
}
