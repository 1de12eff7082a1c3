use super::file::{coerce_frequency, coerce_name_list, coerce_value, value_to_toml};
use super::pipeline_config::PipelineConfig;
use crate::error::ConfigError;
use crate::naming::protect_name;
use crate::scope::Frequency;
use crate::value::{Comparator, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use toml::Table;

const PIPELINES_KEY: &str = "pipelines";
const FREQUENCY_KEY: &str = "frequency";

/// Configuration of one scenario kind: pipelines plus an optional recurrence
/// frequency and per-data-node comparator functions.
///
/// Comparators can only be set from code.
#[derive(Clone)]
pub struct ScenarioConfig {
    name: String,
    pipelines: Vec<PipelineConfig>,
    pub frequency: Option<Frequency>,
    comparators: HashMap<String, Vec<Comparator>>,
    pub properties: HashMap<String, Value>,
}

impl ScenarioConfig {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: protect_name(name.as_ref()),
            pipelines: Vec::new(),
            frequency: None,
            comparators: HashMap::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    pub fn with_pipelines(mut self, pipelines: impl IntoIterator<Item = PipelineConfig>) -> Self {
        self.pipelines.extend(pipelines);
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_comparator(mut self, data_node_name: impl AsRef<str>, comparator: Comparator) -> Self {
        self.comparators
            .entry(protect_name(data_node_name.as_ref()))
            .or_default()
            .push(comparator);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipelines(&self) -> &[PipelineConfig] {
        &self.pipelines
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }

    pub fn comparators(&self) -> &HashMap<String, Vec<Comparator>> {
        &self.comparators
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn update_from(&mut self, other: &ScenarioConfig) {
        if !other.pipelines.is_empty() {
            self.pipelines = other.pipelines.clone();
        }
        if let Some(frequency) = other.frequency {
            self.frequency = Some(frequency);
        }
        for (name, comparators) in &other.comparators {
            self.comparators
                .entry(name.clone())
                .or_default()
                .extend(comparators.iter().cloned());
        }
        self.properties.extend(other.properties.clone());
    }

    pub(crate) fn apply_table(
        &mut self,
        table: &Table,
        pipelines: &BTreeMap<String, PipelineConfig>,
    ) -> Result<(), ConfigError> {
        let prefix = format!("scenario.{}", self.name);
        for (key, value) in table {
            match key.as_str() {
                PIPELINES_KEY => {
                    let names = coerce_name_list(&format!("{}.pipelines", prefix), value)?;
                    self.pipelines = names
                        .into_iter()
                        .map(|name| {
                            pipelines.get(&name).cloned().ok_or_else(|| {
                                ConfigError::UnknownReference {
                                    kind: "pipeline".to_string(),
                                    name,
                                    referenced_by: prefix.clone(),
                                }
                            })
                        })
                        .collect::<Result<_, _>>()?;
                }
                FREQUENCY_KEY => {
                    self.frequency = Some(coerce_frequency(&format!("{}.frequency", prefix), value)?)
                }
                other => {
                    let coerced = coerce_value(&format!("{}.{}", prefix, other), value)?;
                    self.properties.insert(other.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn refresh_pipelines(&mut self, pipelines: &BTreeMap<String, PipelineConfig>) {
        for pipeline in self.pipelines.iter_mut() {
            if let Some(applied) = pipelines.get(pipeline.name()) {
                *pipeline = applied.clone();
            }
        }
    }

    pub(crate) fn to_toml(&self) -> Table {
        let mut table = Table::new();
        table.insert(
            PIPELINES_KEY.to_string(),
            toml::Value::Array(
                self.pipelines
                    .iter()
                    .map(|p| toml::Value::String(p.name().to_string()))
                    .collect(),
            ),
        );
        if let Some(frequency) = self.frequency {
            table.insert(
                FREQUENCY_KEY.to_string(),
                toml::Value::String(frequency.to_string()),
            );
        }
        let mut keys: Vec<_> = self.properties.keys().collect();
        keys.sort();
        for key in keys {
            table.insert(key.clone(), value_to_toml(&self.properties[key]));
        }
        table
    }
}

impl fmt::Debug for ScenarioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioConfig")
            .field("name", &self.name)
            .field("pipelines", &self.pipelines)
            .field("frequency", &self.frequency)
            .field("comparators", &self.comparators.keys())
            .field("properties", &self.properties)
            .finish()
    }
}
