//! Configuration management for pwdregistry.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::locations::LocationCatalog;
use crate::record::Field;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "pwdregistry";

/// Default Registry file name.
const REGISTRY_FILE_NAME: &str = "PWD_Disability_Set.csv";

/// Default Pending Queue file name.
const PENDING_FILE_NAME: &str = "pending_requests.csv";

/// Default notification outbox file name.
const OUTBOX_FILE_NAME: &str = "outbox.jsonl";

/// Shared secret used when none is configured.
pub const DEFAULT_ADMIN_SECRET: &str = "kitui123";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PWDREGISTRY_`, sections split on `__`)
/// 2. TOML config file at `~/.config/pwdregistry/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Access gate configuration.
    pub access: AccessConfig,
    /// Upload configuration.
    pub upload: UploadConfig,
    /// Notification configuration.
    pub notify: NotifyConfig,
    /// Location catalog configuration.
    pub locations: LocationsConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the Registry CSV file.
    /// Defaults to `~/.local/share/pwdregistry/PWD_Disability_Set.csv`
    pub registry_path: Option<PathBuf>,
    /// Path to the Pending Queue CSV file.
    /// Defaults to `~/.local/share/pwdregistry/pending_requests.csv`
    pub pending_path: Option<PathBuf>,
    /// Directory for Registry backups.
    /// Defaults to the directory holding the Registry file.
    pub backup_dir: Option<PathBuf>,
}

/// Access gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// The shared admin secret.
    pub admin_secret: String,
}

/// Upload-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Header an uploaded file must carry, in this exact order.
    pub expected_columns: Vec<String>,
}

/// Notification-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Send operator notifications on public submission.
    pub enabled: bool,
    /// Address of the operator who reviews submissions.
    pub operator_address: String,
    /// Delivery channel.
    pub channel: NotifyChannel,
    /// Path of the outbox file messages are appended to.
    /// Defaults to `~/.local/share/pwdregistry/outbox.jsonl`
    pub outbox_path: Option<PathBuf>,
}

/// How operator notifications are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    /// Append JSON lines to the outbox file.
    #[default]
    Outbox,
    /// Write the message to the log only.
    Log,
}

/// Location catalog configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationsConfig {
    /// Sub-County to Ward mapping. A configured map replaces the built-in
    /// Kitui County catalog entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_counties: Option<BTreeMap<String, Vec<String>>>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_secret: DEFAULT_ADMIN_SECRET.to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            expected_columns: default_upload_columns(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            operator_address: "pwd-registry@kitui.go.ke".to_string(),
            channel: NotifyChannel::Outbox,
            outbox_path: None,
        }
    }
}

/// Column order produced by the county's spreadsheet template.
///
/// This differs from the Registry's own header order; columns are mapped by
/// name on import.
fn default_upload_columns() -> Vec<String> {
    [
        Field::Name,
        Field::Phone,
        Field::DisabilityType,
        Field::Age,
        Field::AssistiveDevice,
        Field::SubCounty,
        Field::Ward,
    ]
    .iter()
    .map(|f| f.column().to_string())
    .collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `PWDREGISTRY_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("PWDREGISTRY_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.access.admin_secret.is_empty() {
            return Err(Error::ConfigValidation {
                message: "access.admin_secret must not be empty".to_string(),
            });
        }

        // The upload header must name every column exactly once
        let mut seen = Vec::with_capacity(self.upload.expected_columns.len());
        for column in &self.upload.expected_columns {
            let Some(field) = Field::from_column(column) else {
                return Err(Error::ConfigValidation {
                    message: format!("unknown upload column: {column}"),
                });
            };
            if seen.contains(&field) {
                return Err(Error::ConfigValidation {
                    message: format!("duplicate upload column: {column}"),
                });
            }
            seen.push(field);
        }
        if seen.len() != Field::ALL.len() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "upload.expected_columns must list all {} columns, got {}",
                    Field::ALL.len(),
                    seen.len()
                ),
            });
        }

        if let Some(sub_counties) = &self.locations.sub_counties {
            if sub_counties.is_empty() {
                return Err(Error::ConfigValidation {
                    message: "locations.sub_counties must not be empty".to_string(),
                });
            }
            for (sub_county, wards) in sub_counties {
                if wards.is_empty() {
                    return Err(Error::ConfigValidation {
                        message: format!("sub-county '{sub_county}' has no wards"),
                    });
                }
            }
        }

        if self.notify.enabled && !self.notify.operator_address.contains('@') {
            return Err(Error::ConfigValidation {
                message: format!(
                    "notify.operator_address is not an address: {}",
                    self.notify.operator_address
                ),
            });
        }

        Ok(())
    }

    /// Check whether the built-in admin secret is still in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.access.admin_secret == DEFAULT_ADMIN_SECRET
    }

    /// Get the Registry path, resolving defaults if not set.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.storage
            .registry_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(REGISTRY_FILE_NAME))
    }

    /// Get the Pending Queue path, resolving defaults if not set.
    #[must_use]
    pub fn pending_path(&self) -> PathBuf {
        self.storage
            .pending_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(PENDING_FILE_NAME))
    }

    /// Get the backup directory, defaulting to the Registry's directory.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.storage.backup_dir.clone().unwrap_or_else(|| {
            self.registry_path()
                .parent()
                .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf)
        })
    }

    /// Get the outbox path, resolving defaults if not set.
    #[must_use]
    pub fn outbox_path(&self) -> PathBuf {
        self.notify
            .outbox_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(OUTBOX_FILE_NAME))
    }

    /// Build the location catalog, falling back to the built-in one.
    #[must_use]
    pub fn location_catalog(&self) -> LocationCatalog {
        self.locations
            .sub_counties
            .clone()
            .map_or_else(LocationCatalog::default, LocationCatalog::new)
    }
}
