//! Server configuration
//!
//! Loaded from TOML. Every field has a default so an empty file yields a
//! server with `running` and `candidate` datastores.

use std::fs;
use std::path::Path;

use netconf_core::logging_facility::Profile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest panic detail copied into an `operation-failed` reply
pub const DEFAULT_MAX_ERROR_DETAIL_LEN: usize = 512;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Behaviour of one named datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    pub name: String,
    /// Run the post-edit validator after each edit
    #[serde(default = "default_true")]
    pub post_edit_validation: bool,
    /// Edits leave the datastore dirty until committed (candidate semantics)
    #[serde(default)]
    pub track_uncommitted_changes: bool,
    /// Deliver change notifications to the owning subsystems
    #[serde(default = "default_true")]
    pub notify_subsystems: bool,
}

impl DatastoreConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            post_edit_validation: true,
            track_uncommitted_changes: false,
            notify_subsystems: true,
        }
    }

    pub fn running() -> Self {
        Self::new("running")
    }

    pub fn candidate() -> Self {
        Self {
            track_uncommitted_changes: true,
            ..Self::new("candidate")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub logging_profile: Profile,
    #[serde(default = "default_max_error_detail_len")]
    pub max_error_detail_len: usize,
    #[serde(default = "default_datastores", rename = "datastore")]
    pub datastores: Vec<DatastoreConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            logging_profile: Profile::default(),
            max_error_detail_len: DEFAULT_MAX_ERROR_DETAIL_LEN,
            datastores: default_datastores(),
        }
    }
}

impl ServerConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML, `Invalid` for an empty or duplicated
    /// datastore name.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn datastore(&self, name: &str) -> Option<&DatastoreConfig> {
        self.datastores.iter().find(|ds| ds.name == name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (index, datastore) in self.datastores.iter().enumerate() {
            if datastore.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "datastore #{} has an empty name",
                    index
                )));
            }
            if self.datastores[..index]
                .iter()
                .any(|earlier| earlier.name == datastore.name)
            {
                return Err(ConfigError::Invalid(format!(
                    "datastore '{}' is declared twice",
                    datastore.name
                )));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_error_detail_len() -> usize {
    DEFAULT_MAX_ERROR_DETAIL_LEN
}

fn default_datastores() -> Vec<DatastoreConfig> {
    vec![DatastoreConfig::running(), DatastoreConfig::candidate()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(config.datastore("running").is_some());
        assert!(config.datastore("candidate").unwrap().track_uncommitted_changes);
        assert!(!config.datastore("running").unwrap().track_uncommitted_changes);
    }

    #[test]
    fn test_datastore_tables() {
        let config = ServerConfig::from_toml_str(
            r#"
            logging_profile = "production"
            max_error_detail_len = 64

            [[datastore]]
            name = "running"
            notify_subsystems = false

            [[datastore]]
            name = "startup"
            post_edit_validation = false
            "#,
        )
        .unwrap();

        assert_eq!(config.logging_profile, Profile::Production);
        assert_eq!(config.max_error_detail_len, 64);
        assert_eq!(config.datastores.len(), 2);
        assert!(!config.datastore("running").unwrap().notify_subsystems);
        let startup = config.datastore("startup").unwrap();
        assert!(!startup.post_edit_validation);
        assert!(startup.notify_subsystems);
        assert!(config.datastore("candidate").is_none());
    }

    #[test]
    fn test_duplicate_datastore_rejected() {
        let result = ServerConfig::from_toml_str(
            r#"
            [[datastore]]
            name = "running"

            [[datastore]]
            name = "running"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = ServerConfig::from_toml_str("datastore = [");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
