use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Dynamic value carried by data nodes and exchanged with task functions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Json(serde_json::Value),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<&toml::Value> for Value {
    fn from(v: &toml::Value) -> Self {
        match v {
            toml::Value::String(s) => Value::String(s.clone()),
            toml::Value::Integer(n) => Value::Int(*n),
            toml::Value::Float(n) => Value::Float(*n),
            toml::Value::Boolean(b) => Value::Bool(*b),
            toml::Value::Datetime(d) => Value::String(d.to_string()),
            toml::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Map(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Return value of a task function, mapped positionally onto the task's
/// output data nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// One object, written to the sole declared output.
    Single(Value),
    /// One object per declared output, in declaration order.
    Many(Vec<Value>),
}

impl TaskOutput {
    /// Number of values this output carries.
    pub fn arity(&self) -> usize {
        match self {
            TaskOutput::Single(_) => 1,
            TaskOutput::Many(values) => values.len(),
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            TaskOutput::Single(value) => vec![value],
            TaskOutput::Many(values) => values,
        }
    }
}

/// User function bound to a task: input values in, output value(s) out.
///
/// Errors are plain strings; the dispatcher records them on the job rather
/// than propagating them.
pub type TaskFunction = Arc<dyn Fn(Vec<Value>) -> Result<TaskOutput, String> + Send + Sync>;

/// Comparator attached to a scenario for one data node config name.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;
