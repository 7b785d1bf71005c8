use serde::Deserialize;
use serde_json::error::Category;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Connection details for the MQTT broker.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConnection {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
}

impl ServerConnection {
    /// Credentials are only applied when both username and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

/// A topic subscription entry. The list order from the configuration file
/// is preserved and duplicates are not deduplicated.
#[derive(Debug, Deserialize, Clone)]
pub struct Topic {
    pub name: String,
    /// MQTT Quality of Service level, must be 0, 1 or 2.
    pub qos: u8,
}

/// Database connection details. The port is a string because it is passed
/// through as an opaque connection parameter. All fields are required
/// whenever the block is present.
#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub host: String,
    pub port: String,
    pub db_name: String,
    pub username: String,
    pub password: String,
}

/// Top-level application configuration, loaded once per process run from a
/// single JSON document and read-only afterwards.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_connection: ServerConnection,
    pub topics: Vec<Topic>,
    pub db: Option<Database>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} was not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read configuration file: {0}")]
    Io(#[source] std::io::Error),
    #[error("configuration file contains invalid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("configuration is invalid: {0}")]
    Invalid(String),
}

impl Config {
    /// Reads and validates the configuration from a JSON file.
    ///
    /// The error distinguishes a missing file, malformed JSON, and a
    /// schema/domain violation, so the caller can log each kind with its
    /// own message. On any error no partial configuration is returned.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(e),
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates a JSON document against the configuration schema.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw).map_err(|e| match e.classify() {
            // A data error means the JSON was well-formed but did not match
            // the schema (missing field, wrong type).
            Category::Data => ConfigError::Invalid(e.to_string()),
            _ => ConfigError::Malformed(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Domain checks that the deserializer cannot express.
    fn validate(&self) -> Result<(), ConfigError> {
        for topic in &self.topics {
            if topic.qos > 2 {
                return Err(ConfigError::Invalid(format!(
                    "topic '{}': qos must be 0, 1 or 2, got {}",
                    topic.name, topic.qos
                )));
            }
        }
        Ok(())
    }
}
