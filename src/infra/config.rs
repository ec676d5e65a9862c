//! Configuration management infrastructure.
//!
//! Persistent defaults for batch signing: where the tool lives, which store to
//! query, how to call the tool. Command line flags override these per run.

use crate::adapters::cert_store::StoreLocation;
use crate::domain::types::{DigestAlgorithm, TimestampUrl, DEFAULT_TIMESTAMP_URL};
use crate::infra::error::{Result, SigningError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keys accepted by [`ConfigManager::update_value`]
pub const CONFIG_KEYS: [&str; 7] = [
    "signtool_path",
    "sdk_roots",
    "timestamp_url",
    "digest_algorithm",
    "store_location",
    "certificate_dir",
    "timeout_seconds",
];

/// Application configuration with all signing preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfiguration {
    /// Explicit signing tool; skips the SDK search when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signtool_path: Option<PathBuf>,

    /// SDK installation roots; empty means the standard Windows Kits locations
    pub sdk_roots: Vec<PathBuf>,

    pub timestamp_url: String,

    pub digest_algorithm: String,

    /// `current-user` or `local-machine`
    pub store_location: String,

    /// Read certificates from files in this directory instead of the OS store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_dir: Option<PathBuf>,

    /// Per-file tool timeout, 0 disables it
    pub timeout_seconds: u64,
}

impl Default for SigningConfiguration {
    fn default() -> Self {
        Self {
            signtool_path: None,
            sdk_roots: Vec::new(),
            timestamp_url: DEFAULT_TIMESTAMP_URL.to_string(),
            digest_algorithm: DigestAlgorithm::default().as_str().to_string(),
            store_location: StoreLocation::default().to_string(),
            certificate_dir: None,
            timeout_seconds: 0,
        }
    }
}

impl SigningConfiguration {
    pub fn timestamp_url(&self) -> Result<TimestampUrl> {
        TimestampUrl::new(&self.timestamp_url)
    }

    pub fn digest_algorithm(&self) -> Result<DigestAlgorithm> {
        self.digest_algorithm.parse()
    }

    pub fn store_location(&self) -> Result<StoreLocation> {
        self.store_location.parse()
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.timestamp_url()?;
        self.digest_algorithm()?;
        self.store_location()?;

        if let Some(ref dir) = self.certificate_dir {
            if dir.as_os_str().is_empty() {
                return Err(SigningError::ConfigurationError(
                    "certificate_dir must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("signtool-batch").join("config.toml"),
            None => PathBuf::from("signtool-batch.toml"),
        }
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the file if present, defaults otherwise. Nothing is written.
    pub fn load_or_default(&self) -> Result<SigningConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(SigningConfiguration::default())
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> Result<SigningConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SigningConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    pub fn load(&self) -> Result<SigningConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {e}",
                self.config_path.display()
            ))
        })?;

        let config: SigningConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &SigningConfiguration) -> Result<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {e}",
                self.config_path.display()
            ))
        })
    }

    /// Update a specific configuration value.
    ///
    /// An empty value clears the optional path keys. `sdk_roots` takes a
    /// `;`-separated list.
    pub fn update_value(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.load_or_default()?;
        let value = value.trim();

        match key {
            "signtool_path" => config.signtool_path = optional_path(value),
            "certificate_dir" => config.certificate_dir = optional_path(value),
            "sdk_roots" => {
                config.sdk_roots = value
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
            "timestamp_url" => {
                TimestampUrl::new(value)?;
                config.timestamp_url = value.to_string();
            }
            "digest_algorithm" => {
                let algorithm: DigestAlgorithm = value.parse()?;
                config.digest_algorithm = algorithm.as_str().to_string();
            }
            "store_location" => {
                let location: StoreLocation = value.parse()?;
                config.store_location = location.to_string();
            }
            "timeout_seconds" => {
                config.timeout_seconds = value.parse().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid number of seconds: {value}"))
                })?;
            }
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key} (expected one of: {})",
                    CONFIG_KEYS.join(", ")
                )));
            }
        }

        self.save(&config)
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> Result<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
            ExportFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("YAML export failed: {e}"))),
        }
    }

    /// Import configuration from a string, replacing the stored one
    pub fn import_config(&self, content: &str, format: ExportFormat) -> Result<()> {
        let config: SigningConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("YAML import failed: {e}"))
            })?,
        };

        config.validate()?;
        self.save(&config)
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(temp_dir: &TempDir) -> ConfigManager {
        ConfigManager::with_path(temp_dir.path().join("config.toml"))
    }

    #[test]
    fn test_default_configuration() {
        let config = SigningConfiguration::default();
        assert_eq!(config.timestamp_url, "http://timestamp.digicert.com");
        assert_eq!(config.digest_algorithm().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(config.store_location().unwrap(), StoreLocation::CurrentUser);
        assert!(config.timeout().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let config: SigningConfiguration =
            toml::from_str("signtool_path = 'C:/tools/signtool.exe'\ntimeout_seconds = 30\n").unwrap();
        assert_eq!(
            config.signtool_path,
            Some(PathBuf::from("C:/tools/signtool.exe"))
        );
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.timestamp_url, DEFAULT_TIMESTAMP_URL);
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        assert_eq!(manager.load_or_default().unwrap(), SigningConfiguration::default());
        assert!(!manager.config_path().exists());

        let config = manager.load_or_create_default().unwrap();
        assert!(manager.config_path().exists());
        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn test_update_value_validates() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        manager.update_value("digest_algorithm", "sha384").unwrap();
        manager.update_value("store_location", "LocalMachine").unwrap();
        manager.update_value("sdk_roots", "C:/Kits/10; D:/Kits/10 ;").unwrap();
        manager.update_value("certificate_dir", "certs").unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.digest_algorithm, "sha384");
        assert_eq!(config.store_location, "local-machine");
        assert_eq!(
            config.sdk_roots,
            vec![PathBuf::from("C:/Kits/10"), PathBuf::from("D:/Kits/10")]
        );
        assert_eq!(config.certificate_dir, Some(PathBuf::from("certs")));

        manager.update_value("certificate_dir", "").unwrap();
        assert_eq!(manager.load().unwrap().certificate_dir, None);

        assert!(manager.update_value("timestamp_url", "ftp://nope").is_err());
        assert!(manager.update_value("timeout_seconds", "soon").is_err());
        assert!(matches!(
            manager.update_value("pin", "123456"),
            Err(SigningError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_invalid_file_is_rejected_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        fs::write(manager.config_path(), "digest_algorithm = 'md5'\n").unwrap();
        assert!(manager.load().is_err());
    }

    #[test]
    fn test_export_import_across_formats() {
        let temp_dir = TempDir::new().unwrap();
        let source = manager(&temp_dir);
        source.update_value("timeout_seconds", "45").unwrap();
        source.update_value("signtool_path", "C:/SDK/signtool.exe").unwrap();

        for format in [ExportFormat::Toml, ExportFormat::Json, ExportFormat::Yaml] {
            let exported = source.export_config(format).unwrap();
            let target_dir = TempDir::new().unwrap();
            let target = manager(&target_dir);
            target.import_config(&exported, format).unwrap();
            assert_eq!(target.load().unwrap(), source.load().unwrap());
        }

        assert!(source.import_config("{", ExportFormat::Json).is_err());
    }
}
