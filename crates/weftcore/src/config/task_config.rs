use super::data_node_config::DataNodeConfig;
use super::file::{coerce_name_list, coerce_value, value_to_toml};
use crate::error::ConfigError;
use crate::naming::protect_name;
use crate::value::{TaskFunction, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use toml::Table;

const INPUTS_KEY: &str = "inputs";
const OUTPUTS_KEY: &str = "outputs";

/// Configuration of one task kind: a function bound to ordered input and
/// output data node configs.
///
/// The function can only be set from code; file fragments overlay inputs,
/// outputs and properties.
#[derive(Clone)]
pub struct TaskConfig {
    name: String,
    function: Option<TaskFunction>,
    inputs: Vec<DataNodeConfig>,
    outputs: Vec<DataNodeConfig>,
    pub properties: HashMap<String, Value>,
}

impl TaskConfig {
    pub fn new(name: impl AsRef<str>, function: TaskFunction) -> Self {
        Self {
            name: protect_name(name.as_ref()),
            function: Some(function),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// A task config without a function; the checker reports an error if it
    /// is still function-less after all layers are merged.
    pub(crate) fn unbound(name: impl AsRef<str>) -> Self {
        Self {
            name: protect_name(name.as_ref()),
            function: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_input(mut self, input: DataNodeConfig) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = DataNodeConfig>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_output(mut self, output: DataNodeConfig) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = DataNodeConfig>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> Option<&TaskFunction> {
        self.function.as_ref()
    }

    /// Ordered input configs; order defines the positional mapping of input
    /// values passed to the function.
    pub fn inputs(&self) -> &[DataNodeConfig] {
        &self.inputs
    }

    /// Ordered output configs; order defines the positional mapping of the
    /// function's return value(s).
    pub fn outputs(&self) -> &[DataNodeConfig] {
        &self.outputs
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn update_from(&mut self, other: &TaskConfig) {
        if let Some(function) = &other.function {
            self.function = Some(function.clone());
        }
        if !other.inputs.is_empty() {
            self.inputs = other.inputs.clone();
        }
        if !other.outputs.is_empty() {
            self.outputs = other.outputs.clone();
        }
        self.properties.extend(other.properties.clone());
    }

    pub(crate) fn apply_table(
        &mut self,
        table: &Table,
        data_nodes: &BTreeMap<String, DataNodeConfig>,
    ) -> Result<(), ConfigError> {
        let prefix = format!("task.{}", self.name);
        for (key, value) in table {
            match key.as_str() {
                INPUTS_KEY => {
                    let names = coerce_name_list(&format!("{}.inputs", prefix), value)?;
                    self.inputs = resolve_nodes(&self.name, names, data_nodes)?;
                }
                OUTPUTS_KEY => {
                    let names = coerce_name_list(&format!("{}.outputs", prefix), value)?;
                    self.outputs = resolve_nodes(&self.name, names, data_nodes)?;
                }
                other => {
                    let coerced = coerce_value(&format!("{}.{}", prefix, other), value)?;
                    self.properties.insert(other.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    /// Refreshes input/output configs from the applied data-node registry so
    /// later layers' data-node overrides flow into tasks.
    pub(crate) fn refresh_nodes(&mut self, data_nodes: &BTreeMap<String, DataNodeConfig>) {
        for node in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            if let Some(applied) = data_nodes.get(node.name()) {
                *node = applied.clone();
            }
        }
    }

    pub(crate) fn to_toml(&self) -> Table {
        let mut table = Table::new();
        table.insert(
            INPUTS_KEY.to_string(),
            toml::Value::Array(
                self.inputs
                    .iter()
                    .map(|n| toml::Value::String(n.name().to_string()))
                    .collect(),
            ),
        );
        table.insert(
            OUTPUTS_KEY.to_string(),
            toml::Value::Array(
                self.outputs
                    .iter()
                    .map(|n| toml::Value::String(n.name().to_string()))
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

fn resolve_nodes(
    task_name: &str,
    names: Vec<String>,
    data_nodes: &BTreeMap<String, DataNodeConfig>,
) -> Result<Vec<DataNodeConfig>, ConfigError> {
    names
        .into_iter()
        .map(|name| {
            data_nodes
                .get(&name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownReference {
                    kind: "data node".to_string(),
                    name,
                    referenced_by: format!("task.{}", task_name),
                })
        })
        .collect()
}

impl fmt::Debug for TaskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskConfig")
            .field("name", &self.name)
            .field("function", &self.function.as_ref().map(|_| "<function>"))
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("properties", &self.properties)
            .finish()
    }
}
