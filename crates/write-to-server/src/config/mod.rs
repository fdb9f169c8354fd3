//! Settings loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Error, Result};
use std::path::Path;

impl Settings {
    /// Load settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Connection string registered under `name`.
    pub fn connection_string(&self, name: &str) -> Result<&str> {
        self.connection_strings
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::Config(format!(
                    "no connection string named '{}' (known: {})",
                    name,
                    self.connection_strings
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    /// Add or replace a connection string.
    pub fn with_connection_string(
        mut self,
        name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        self.connection_strings
            .insert(name.into(), connection_string.into());
        self
    }
}

/// Replace the value of `Password`/`Pwd` keys in an ADO connection string.
pub fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, _))
                if matches!(key.trim().to_lowercase().as_str(), "password" | "pwd") =>
            {
                format!("{}=[REDACTED]", key)
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
