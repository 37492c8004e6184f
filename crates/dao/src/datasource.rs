//! Datasource configuration and handle.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connector::Connector;
use crate::memory::MemoryConnector;

/// Declarative datasource configuration.
///
/// `connector` names the backend implementation; `settings` carries
/// connector-specific options and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub name: String,
    pub connector: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl DataSourceConfig {
    pub fn new(name: impl Into<String>, connector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connector: connector.into(),
            settings: Map::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// A named handle to a configured connector instance.
///
/// Repositories are bound to a datasource, not to a connector directly, so
/// that the connector can be swapped per environment through configuration.
#[derive(Clone)]
pub struct DataSource {
    config: DataSourceConfig,
    connector: Arc<dyn Connector>,
}

impl DataSource {
    pub fn new(config: DataSourceConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    /// Datasource backed by a fresh in-memory connector
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(
            DataSourceConfig::new(name, "memory"),
            Arc::new(MemoryConnector::new()),
        )
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("name", &self.config.name)
            .field("connector", &self.config.connector)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_deserializes_with_default_settings() {
        let config: DataSourceConfig =
            serde_json::from_value(json!({"name": "db", "connector": "memory"})).unwrap();
        assert_eq!(config.name, "db");
        assert_eq!(config.connector, "memory");
        assert!(config.settings.is_empty());
    }

    #[test]
    fn in_memory_datasource_uses_memory_connector() {
        let datasource = DataSource::in_memory("db");
        assert_eq!(datasource.name(), "db");
        assert_eq!(datasource.connector().name(), "memory");
    }
}
