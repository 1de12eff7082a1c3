use super::file::{coerce_bool, coerce_string, coerce_value, value_to_toml};
use crate::error::ConfigError;
use crate::value::Value;
use std::collections::HashMap;
use toml::Table;

const ROOT_FOLDER_KEY: &str = "root_folder";
const STORAGE_FOLDER_KEY: &str = "storage_folder";
const CLEAN_ENTITIES_KEY: &str = "clean_entities_enabled";

pub const DEFAULT_ROOT_FOLDER: &str = "./weft/";
pub const DEFAULT_STORAGE_FOLDER: &str = ".data/";

/// Configuration fields related to the global application.
///
/// Unset fields are `None` so fragments overlay only the keys they define.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    pub root_folder: Option<String>,
    pub storage_folder: Option<String>,
    pub clean_entities_enabled: Option<bool>,
    pub properties: HashMap<String, Value>,
}

impl GlobalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully-populated hard-coded defaults, the base of every compile.
    pub(crate) fn default_config() -> Self {
        Self {
            root_folder: Some(DEFAULT_ROOT_FOLDER.to_string()),
            storage_folder: Some(DEFAULT_STORAGE_FOLDER.to_string()),
            clean_entities_enabled: Some(false),
            properties: HashMap::new(),
        }
    }

    pub fn with_root_folder(mut self, folder: impl Into<String>) -> Self {
        self.root_folder = Some(folder.into());
        self
    }

    pub fn with_storage_folder(mut self, folder: impl Into<String>) -> Self {
        self.storage_folder = Some(folder.into());
        self
    }

    pub fn with_clean_entities_enabled(mut self, enabled: bool) -> Self {
        self.clean_entities_enabled = Some(enabled);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn root_folder(&self) -> &str {
        self.root_folder.as_deref().unwrap_or(DEFAULT_ROOT_FOLDER)
    }

    pub fn storage_folder(&self) -> &str {
        self.storage_folder.as_deref().unwrap_or(DEFAULT_STORAGE_FOLDER)
    }

    pub fn clean_entities_enabled(&self) -> bool {
        self.clean_entities_enabled.unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Overlays the fields `other` defines on top of `self`.
    pub(crate) fn update_from(&mut self, other: &GlobalConfig) {
        if let Some(folder) = &other.root_folder {
            self.root_folder = Some(folder.clone());
        }
        if let Some(folder) = &other.storage_folder {
            self.storage_folder = Some(folder.clone());
        }
        if let Some(enabled) = other.clean_entities_enabled {
            self.clean_entities_enabled = Some(enabled);
        }
        self.properties.extend(other.properties.clone());
    }

    /// Overlays the keys a file fragment defines, coercing values and
    /// resolving `ENV[VAR]` placeholders.
    pub(crate) fn apply_table(&mut self, table: &Table) -> Result<(), ConfigError> {
        for (key, value) in table {
            match key.as_str() {
                ROOT_FOLDER_KEY => {
                    self.root_folder = Some(coerce_string("global.root_folder", value)?)
                }
                STORAGE_FOLDER_KEY => {
                    self.storage_folder = Some(coerce_string("global.storage_folder", value)?)
                }
                CLEAN_ENTITIES_KEY => {
                    self.clean_entities_enabled =
                        Some(coerce_bool("global.clean_entities_enabled", value)?)
                }
                other => {
                    let coerced = coerce_value(&format!("global.{}", other), value)?;
                    self.properties.insert(other.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn to_toml(&self) -> Table {
        let mut table = Table::new();
        table.insert(
            ROOT_FOLDER_KEY.to_string(),
            toml::Value::String(self.root_folder().to_string()),
        );
        table.insert(
            STORAGE_FOLDER_KEY.to_string(),
            toml::Value::String(self.storage_folder().to_string()),
        );
        table.insert(
            CLEAN_ENTITIES_KEY.to_string(),
            toml::Value::Boolean(self.clean_entities_enabled()),
        );
        let mut keys: Vec<_> = self.properties.keys().collect();
        keys.sort();
        for key in keys {
            table.insert(key.clone(), value_to_toml(&self.properties[key]));
        }
        table
    }
}
