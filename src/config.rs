use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ErgScoreError;
use crate::import::bounds;
use crate::logging::LogConfig;
use crate::models::AthleteProfile;

const APP_DIR: &str = "ergscore";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Logging output
    #[serde(default)]
    pub logging: LogConfig,

    /// Workout and personal-best storage
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Profile used when a command is not given one
    #[serde(default)]
    pub default_profile: AthleteProfile,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSettings {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("ergscore.db"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            logging: LogConfig::default(),
            database: DatabaseSettings::default(),
            default_profile: AthleteProfile::default(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Ignoring invalid config {} ({:#}), using defaults",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Reject settings the scoring engine would silently misuse
    pub fn validate(&self) -> crate::error::Result<()> {
        let profile = &self.default_profile;
        let invalid = |message: String| -> crate::error::Result<()> {
            Err(ErgScoreError::Configuration(message))
        };

        if !(profile.weight_kg.is_finite() && profile.weight_kg > 0.0) {
            return invalid(format!(
                "defaultProfile.weightKg must be positive, got {}",
                profile.weight_kg
            ));
        }
        if !(profile.height_cm.is_finite() && profile.height_cm > 0.0) {
            return invalid(format!(
                "defaultProfile.heightCm must be positive, got {}",
                profile.height_cm
            ));
        }
        if !bounds::MAX_HEART_RATE.contains(f64::from(profile.max_hr)) {
            return invalid(format!(
                "defaultProfile.maxHr must be within {}, got {}",
                bounds::MAX_HEART_RATE.label(),
                profile.max_hr
            ));
        }
        if profile.resting_hr >= profile.max_hr {
            return invalid(format!(
                "defaultProfile.restingHr ({}) must be below maxHr ({})",
                profile.resting_hr, profile.max_hr
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return invalid("database.path must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.default_profile, deserialized.default_profile);
        assert_eq!(config.database, deserialized.database);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.logging.level = LogLevel::Debug;
        original.logging.format = LogFormat::Json;
        original.default_profile.weight_kg = 82.5;
        original.database.path = temp_dir.path().join("workouts.db");

        original.save_to_file(&config_path).unwrap();
        let loaded = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.logging.level, LogLevel::Debug);
        assert_eq!(loaded.logging.format, LogFormat::Json);
        assert_eq!(loaded.default_profile.weight_kg, 82.5);
        assert_eq!(loaded.database.path, temp_dir.path().join("workouts.db"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let toml_str = r#"
            [metadata]
            version = "1.0"
            createdAt = "2026-01-01T00:00:00Z"
            updatedAt = "2026-01-01T00:00:00Z"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_profile, AthleteProfile::default());
        assert_eq!(config.logging, LogConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_profile() {
        let mut config = AppConfig::default();
        config.default_profile.resting_hr = 200;
        assert!(matches!(
            config.validate(),
            Err(ErgScoreError::Configuration(message)) if message.contains("restingHr")
        ));

        let mut config = AppConfig::default();
        config.default_profile.weight_kg = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ErgScoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_reports_invalid_profile() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.default_profile.resting_hr = 200;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let err = AppConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ErgScoreError>(),
            Some(ErgScoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_keys_are_camel_case() {
        let mut config = AppConfig::default();
        config.logging.file_path = Some(PathBuf::from("ergscore.log"));
        let toml_str = toml::to_string_pretty(&config).unwrap();

        for key in ["defaultProfile", "weightKg", "restingHr", "createdAt", "updatedAt", "filePath", "includeSpans"] {
            assert!(toml_str.contains(key), "missing {} in\n{}", key, toml_str);
        }
        for key in ["default_profile", "weight_kg", "created_at", "file_path", "include_spans"] {
            assert!(!toml_str.contains(key), "unexpected {} in\n{}", key, toml_str);
        }
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "metadata = 3").unwrap();
        assert!(AppConfig::load_from_file(&path).is_err());
    }
}
