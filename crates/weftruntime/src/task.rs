use crate::data_node::DataNode;
use crate::repository::Entity;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use weftcore::{Scope, TaskFunction, Value};

pub type TaskId = Uuid;

/// Immutable binding of a function to ordered input and output data nodes.
///
/// Input order defines the positional argument list passed to the function;
/// output order defines where the function's return value(s) are written.
/// Cloning is cheap and shares the same instance.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    config_name: String,
    inputs: Vec<DataNode>,
    outputs: Vec<DataNode>,
    function: TaskFunction,
    parent_id: Option<String>,
    properties: HashMap<String, Value>,
}

impl Task {
    pub fn new(
        config_name: impl Into<String>,
        inputs: Vec<DataNode>,
        function: TaskFunction,
        outputs: Vec<DataNode>,
        parent_id: Option<String>,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: Uuid::new_v4(),
                config_name: config_name.into(),
                inputs,
                outputs,
                function,
                parent_id,
                properties,
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn config_name(&self) -> &str {
        &self.inner.config_name
    }

    pub fn inputs(&self) -> &[DataNode] {
        &self.inner.inputs
    }

    pub fn outputs(&self) -> &[DataNode] {
        &self.inner.outputs
    }

    pub fn function(&self) -> &TaskFunction {
        &self.inner.function
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent_id.as_deref()
    }

    pub fn input(&self, config_name: &str) -> Option<&DataNode> {
        self.inner
            .inputs
            .iter()
            .find(|node| node.config_name() == config_name)
    }

    pub fn output(&self, config_name: &str) -> Option<&DataNode> {
        self.inner
            .outputs
            .iter()
            .find(|node| node.config_name() == config_name)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.properties.get(key)
    }

    /// The narrowest scope among this task's data nodes; global when it has
    /// none.
    pub fn scope(&self) -> Scope {
        self.inner
            .inputs
            .iter()
            .chain(&self.inner.outputs)
            .map(DataNode::scope)
            .max()
            .unwrap_or(Scope::Global)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("config_name", &self.inner.config_name)
            .field("inputs", &self.inner.inputs)
            .field("outputs", &self.inner.outputs)
            .field("parent_id", &self.inner.parent_id)
            .finish()
    }
}

impl Entity for Task {
    fn id(&self) -> String {
        self.inner.id.to_string()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "config_name" => Some(self.inner.config_name.clone()),
            "parent_id" => self.inner.parent_id.clone(),
            _ => None,
        }
    }
}
