use super::file::{coerce_name_list, coerce_value, value_to_toml};
use super::task_config::TaskConfig;
use crate::error::ConfigError;
use crate::naming::protect_name;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use toml::Table;

const TASKS_KEY: &str = "tasks";

/// Configuration of one pipeline kind: an ordered list of task configs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    name: String,
    tasks: Vec<TaskConfig>,
    pub properties: HashMap<String, Value>,
}

impl PipelineConfig {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: protect_name(name.as_ref()),
            tasks: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskConfig>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered task configs; order is the submission order within a wave.
    pub fn tasks(&self) -> &[TaskConfig] {
        &self.tasks
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn update_from(&mut self, other: &PipelineConfig) {
        if !other.tasks.is_empty() {
            self.tasks = other.tasks.clone();
        }
        self.properties.extend(other.properties.clone());
    }

    pub(crate) fn apply_table(
        &mut self,
        table: &Table,
        tasks: &BTreeMap<String, TaskConfig>,
    ) -> Result<(), ConfigError> {
        let prefix = format!("pipeline.{}", self.name);
        for (key, value) in table {
            match key.as_str() {
                TASKS_KEY => {
                    let names = coerce_name_list(&format!("{}.tasks", prefix), value)?;
                    self.tasks = names
                        .into_iter()
                        .map(|name| {
                            tasks.get(&name).cloned().ok_or_else(|| {
                                ConfigError::UnknownReference {
                                    kind: "task".to_string(),
                                    name,
                                    referenced_by: prefix.clone(),
                                }
                            })
                        })
                        .collect::<Result<_, _>>()?;
                }
                other => {
                    let coerced = coerce_value(&format!("{}.{}", prefix, other), value)?;
                    self.properties.insert(other.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    /// Refreshes task configs from the applied task registry.
    pub(crate) fn refresh_tasks(&mut self, tasks: &BTreeMap<String, TaskConfig>) {
        for task in self.tasks.iter_mut() {
            if let Some(applied) = tasks.get(task.name()) {
                *task = applied.clone();
            }
        }
    }

    pub(crate) fn to_toml(&self) -> Table {
        let mut table = Table::new();
        table.insert(
            TASKS_KEY.to_string(),
            toml::Value::Array(
                self.tasks
                    .iter()
                    .map(|t| toml::Value::String(t.name().to_string()))
                    .collect(),
            ),
        );
        let mut keys: Vec<_> = self.properties.keys().collect();
        keys.sort();
        for key in keys {
            table.insert(key.clone(), value_to_toml(&self.properties[key]));
        }
        table
    }
}
