//! Registry configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{RegistryError, Result};

/// Registry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Pool used when negotiating type ids with the servers
    pub pool_name: String,
    /// Lifetime of a preserved-field entry after its last refresh, in milliseconds
    pub preserved_data_ttl_ms: u64,
    /// Deserializers yield generic instances instead of domain objects
    pub read_serialized: bool,
    /// Drop unknown fields instead of preserving them
    pub ignore_unread_fields: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pool_name: "default".to_string(),
            preserved_data_ttl_ms: 5000, // 5 seconds
            read_serialized: false,
            ignore_unread_fields: false,
        }
    }
}

impl RegistryConfig {
    /// Parses a configuration from JSON. Missing keys take their default.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RegistryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.pool_name.is_empty() {
            return Err(RegistryError::InvalidConfig(
                "pool_name must not be empty".to_string(),
            ));
        }
        if self.preserved_data_ttl_ms == 0 {
            return Err(RegistryError::InvalidConfig(
                "preserved_data_ttl_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// TTL of preserved-field entries.
    pub fn preserved_data_ttl(&self) -> Duration {
        Duration::from_millis(self.preserved_data_ttl_ms)
    }
}
