use super::file::{coerce_scope, coerce_string, coerce_value, value_to_toml};
use crate::error::ConfigError;
use crate::naming::protect_name;
use crate::scope::Scope;
use crate::value::Value;
use std::collections::HashMap;
use toml::Table;

const STORAGE_TYPE_KEY: &str = "storage_type";
const SCOPE_KEY: &str = "scope";
const DEFAULT_DATA_KEY: &str = "default_data";

pub const DEFAULT_STORAGE_TYPE: &str = "in_memory";
pub const DEFAULT_SCOPE: Scope = Scope::Pipeline;

/// Configuration of one data node kind.
///
/// Immutable once registered; the config registry keeps one instance per
/// normalized name.
#[derive(Debug, Clone)]
pub struct DataNodeConfig {
    name: String,
    pub storage_type: Option<String>,
    pub scope: Option<Scope>,
    pub default_data: Option<Value>,
    pub properties: HashMap<String, Value>,
}

impl DataNodeConfig {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: protect_name(name.as_ref()),
            storage_type: None,
            scope: None,
            default_data: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_storage_type(mut self, storage_type: impl Into<String>) -> Self {
        self.storage_type = Some(storage_type.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_default_data(mut self, data: impl Into<Value>) -> Self {
        self.default_data = Some(data.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_type(&self) -> &str {
        self.storage_type.as_deref().unwrap_or(DEFAULT_STORAGE_TYPE)
    }

    pub fn scope(&self) -> Scope {
        self.scope.unwrap_or(DEFAULT_SCOPE)
    }

    pub fn default_data(&self) -> Option<&Value> {
        self.default_data.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn update_from(&mut self, other: &DataNodeConfig) {
        if let Some(storage_type) = &other.storage_type {
            self.storage_type = Some(storage_type.clone());
        }
        if let Some(scope) = other.scope {
            self.scope = Some(scope);
        }
        if let Some(data) = &other.default_data {
            self.default_data = Some(data.clone());
        }
        self.properties.extend(other.properties.clone());
    }

    pub(crate) fn apply_table(&mut self, table: &Table) -> Result<(), ConfigError> {
        let prefix = format!("data_node.{}", self.name);
        for (key, value) in table {
            match key.as_str() {
                STORAGE_TYPE_KEY => {
                    self.storage_type =
                        Some(coerce_string(&format!("{}.storage_type", prefix), value)?)
                }
                SCOPE_KEY => self.scope = Some(coerce_scope(&format!("{}.scope", prefix), value)?),
                DEFAULT_DATA_KEY => {
                    self.default_data =
                        Some(coerce_value(&format!("{}.default_data", prefix), value)?)
                }
                other => {
                    let coerced = coerce_value(&format!("{}.{}", prefix, other), value)?;
                    self.properties.insert(other.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn to_toml(&self) -> Table {
        let mut table = Table::new();
        table.insert(
            STORAGE_TYPE_KEY.to_string(),
            toml::Value::String(self.storage_type().to_string()),
        );
        table.insert(
            SCOPE_KEY.to_string(),
            toml::Value::String(self.scope().to_string()),
        );
        if let Some(data) = &self.default_data {
            table.insert(DEFAULT_DATA_KEY.to_string(), value_to_toml(data));
        }
        let mut keys: Vec<_> = self.properties.keys().collect();
        keys.sort();
        for key in keys {
            table.insert(key.clone(), value_to_toml(&self.properties[key]));
        }
        table
    }
}
