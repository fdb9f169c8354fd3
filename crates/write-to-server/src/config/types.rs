//! Settings type definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::redact_connection_string;

/// Root settings structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// ADO connection strings keyed by context name.
    #[serde(default)]
    pub connection_strings: BTreeMap<String, String>,

    /// Bulk insert defaults.
    #[serde(default)]
    pub bulk: BulkSettings,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: BTreeMap<&str, String> = self
            .connection_strings
            .iter()
            .map(|(name, value)| (name.as_str(), redact_connection_string(value)))
            .collect();
        f.debug_struct("Settings")
            .field("connection_strings", &redacted)
            .field("bulk", &self.bulk)
            .finish()
    }
}

/// Bulk insert defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSettings {
    /// Rows per bulk-load batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    crate::DEFAULT_BATCH_SIZE
}
