//! Runtime configuration: `guardian.yaml` plus environment overrides.

use crate::database::DatabaseConfig;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "guardian.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub picker: PickerConfig,
    /// Relative paths are resolved against the configuration directory.
    pub selectors_path: PathBuf,
    pub timings: Timings,
    /// Parameter table name to the column that scopes its rows to a branch.
    pub branch_columns: HashMap<String, String>,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            picker: PickerConfig::default(),
            selectors_path: PathBuf::from("selectors.json"),
            timings: Timings::default(),
            branch_columns: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Picker executable. A bare name is looked up next to the running binary first.
    pub program: PathBuf,
    pub request_path: PathBuf,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("guardian-picker"),
            request_path: PathBuf::from("temp_gui_data.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
        }
    }
}

/// Probe timeouts and settle delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub optional_dialog_ms: u64,
    pub authorization_precheck_ms: u64,
    pub authorization_button_ms: u64,
    pub main_window_ms: u64,
    pub dav_window_ms: u64,
    pub logistics_window_ms: u64,
    pub phase_two_delay_ms: u64,
    pub short_settle_ms: u64,
    pub long_settle_ms: u64,
    pub logistics_open_delay_ms: u64,
    pub logistics_step_delay_ms: u64,
    pub post_load_pause_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            optional_dialog_ms: 1000,
            authorization_precheck_ms: 2000,
            authorization_button_ms: 300,
            main_window_ms: 5000,
            dav_window_ms: 1000,
            logistics_window_ms: 3000,
            phase_two_delay_ms: 3000,
            short_settle_ms: 200,
            long_settle_ms: 500,
            logistics_open_delay_ms: 2000,
            logistics_step_delay_ms: 1000,
            post_load_pause_ms: 5000,
        }
    }
}

impl Timings {
    /// All delays and timeouts zeroed, for driving fake engines.
    pub fn immediate() -> Self {
        Self {
            optional_dialog_ms: 0,
            authorization_precheck_ms: 0,
            authorization_button_ms: 0,
            main_window_ms: 0,
            dav_window_ms: 0,
            logistics_window_ms: 0,
            phase_two_delay_ms: 0,
            short_settle_ms: 0,
            long_settle_ms: 0,
            logistics_open_delay_ms: 0,
            logistics_step_delay_ms: 0,
            post_load_pause_ms: 0,
        }
    }

    pub fn optional_dialog(&self) -> Duration {
        Duration::from_millis(self.optional_dialog_ms)
    }

    pub fn authorization_precheck(&self) -> Duration {
        Duration::from_millis(self.authorization_precheck_ms)
    }

    pub fn authorization_button(&self) -> Duration {
        Duration::from_millis(self.authorization_button_ms)
    }

    pub fn main_window(&self) -> Duration {
        Duration::from_millis(self.main_window_ms)
    }

    pub fn dav_window(&self) -> Duration {
        Duration::from_millis(self.dav_window_ms)
    }

    pub fn logistics_window(&self) -> Duration {
        Duration::from_millis(self.logistics_window_ms)
    }

    pub fn phase_two_delay(&self) -> Duration {
        Duration::from_millis(self.phase_two_delay_ms)
    }

    pub fn short_settle(&self) -> Duration {
        Duration::from_millis(self.short_settle_ms)
    }

    pub fn long_settle(&self) -> Duration {
        Duration::from_millis(self.long_settle_ms)
    }

    pub fn logistics_open_delay(&self) -> Duration {
        Duration::from_millis(self.logistics_open_delay_ms)
    }

    pub fn logistics_step_delay(&self) -> Duration {
        Duration::from_millis(self.logistics_step_delay_ms)
    }

    pub fn post_load_pause(&self) -> Duration {
        Duration::from_millis(self.post_load_pause_ms)
    }
}

/// Something worth reporting about how the configuration was assembled.
///
/// Loading happens before logging exists (the log directory is part of the
/// configuration), so these are returned and logged by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNote {
    FileMissing(PathBuf),
    EnvFile(PathBuf),
    /// A `GUARDIAN_*` variable replaced the file value.
    EnvOverride(&'static str),
}

impl ConfigNote {
    pub fn log(&self) {
        match self {
            ConfigNote::FileMissing(path) => warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            ),
            ConfigNote::EnvFile(path) => info!("Loaded environment from {}", path.display()),
            ConfigNote::EnvOverride(key) => info!("{} overrides the configuration file", key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub notes: Vec<ConfigNote>,
}

impl AppConfig {
    /// Loads `guardian.yaml` from `dir`, then applies `.env` and environment overrides.
    ///
    /// A missing file is not an error: defaults plus environment are enough to
    /// reach a database.
    pub fn load(dir: impl AsRef<Path>) -> Result<LoadedConfig, ConfigError> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE_NAME);
        let mut notes = Vec::new();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_yaml_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?
        } else {
            notes.push(ConfigNote::FileMissing(path));
            Self::default()
        };

        if let Ok(env_path) = dotenvy::dotenv() {
            notes.push(ConfigNote::EnvFile(env_path));
        }
        let overridden = config.apply_env_overrides(|key| std::env::var(key).ok())?;
        notes.extend(overridden.into_iter().map(ConfigNote::EnvOverride));

        if config.selectors_path.is_relative() {
            config.selectors_path = dir.join(&config.selectors_path);
        }
        config.validate()?;
        Ok(LoadedConfig { config, notes })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Overrides file values with `GUARDIAN_*` variables as returned by `lookup`.
    /// Returns the variables that were applied, in order.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Vec<&'static str>, ConfigError> {
        let mut applied = Vec::new();
        let mut read = |key: &'static str| {
            let value = lookup(key);
            if value.is_some() {
                applied.push(key);
            }
            value
        };

        if let Some(host) = read("GUARDIAN_DB_HOST") {
            self.database.host = host;
        }
        if let Some(user) = read("GUARDIAN_DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = read("GUARDIAN_DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(name) = read("GUARDIAN_DB_NAME") {
            self.database.database = name;
        }
        if let Some(port) = read("GUARDIAN_DB_PORT") {
            self.database.port = port.trim().parse().map_err(|_| {
                ConfigError::Missing(format!("GUARDIAN_DB_PORT is not a valid port: '{port}'"))
            })?;
        }
        if let Some(dir) = read("GUARDIAN_LOG_DIR") {
            self.logging.directory = PathBuf::from(dir);
        }
        Ok(applied)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.host.trim().is_empty() {
            return Err(ConfigError::Missing("database.host".to_string()));
        }
        if self.database.database.trim().is_empty() {
            return Err(ConfigError::Missing("database.database".to_string()));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::Missing(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
database:
  host: erp-db
  user: guardian
  database: guardian
timings:
  optional_dialog_ms: 1500
branch_columns:
  parametro2: pa2_filcodigo
"#,
        )
        .unwrap();

        assert_eq!(config.database.host, "erp-db");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.timings.optional_dialog(), Duration::from_millis(1500));
        assert_eq!(config.timings.main_window(), Duration::from_secs(5));
        assert_eq!(
            config.branch_columns.get("parametro2").map(String::as_str),
            Some("pa2_filcodigo")
        );
        assert_eq!(config.picker.request_path, PathBuf::from("temp_gui_data.json"));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = AppConfig::default();
        let applied = config
            .apply_env_overrides(|key| match key {
                "GUARDIAN_DB_HOST" => Some("10.0.0.5".to_string()),
                "GUARDIAN_DB_PORT" => Some("3307".to_string()),
                "GUARDIAN_LOG_DIR" => Some("C:/guardian/logs".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.database.host, "10.0.0.5");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.logging.directory, PathBuf::from("C:/guardian/logs"));
        assert_eq!(
            applied,
            vec!["GUARDIAN_DB_HOST", "GUARDIAN_DB_PORT", "GUARDIAN_LOG_DIR"]
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "GUARDIAN_DB_PORT").then(|| "mysql".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn load_resolves_selectors_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "database:\n  host: localhost\n  database: guardian\n",
        )
        .unwrap();

        let loaded = AppConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.config.selectors_path, dir.path().join("selectors.json"));
        assert!(!loaded
            .notes
            .iter()
            .any(|n| matches!(n, ConfigNote::FileMissing(_))));
    }

    #[test]
    fn missing_file_is_reported_not_logged() {
        let dir = tempfile::tempdir().unwrap();

        let loaded = AppConfig::load(dir.path()).unwrap();

        assert_eq!(
            loaded.notes.first(),
            Some(&ConfigNote::FileMissing(dir.path().join(CONFIG_FILE_NAME)))
        );
    }
}
