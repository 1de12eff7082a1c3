use crate::data_node::DataNode;
use crate::graph;
use crate::repository::Entity;
use crate::task::Task;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use weftcore::Value;

pub type PipelineId = String;

/// Runtime instance of a pipeline: an ordered set of tasks executed as a
/// dependency graph. Cloning is cheap and shares the same instance.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    id: PipelineId,
    config_name: String,
    parent_id: Option<String>,
    tasks: Vec<Task>,
    properties: HashMap<String, Value>,
}

impl Pipeline {
    pub(crate) fn new(
        id: PipelineId,
        config_name: impl Into<String>,
        parent_id: Option<String>,
        tasks: Vec<Task>,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                id,
                config_name: config_name.into(),
                parent_id,
                tasks,
                properties,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config_name(&self) -> &str {
        &self.inner.config_name
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent_id.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.inner.tasks
    }

    pub fn task(&self, config_name: &str) -> Option<&Task> {
        self.inner
            .tasks
            .iter()
            .find(|task| task.config_name() == config_name)
    }

    /// Every data node referenced by this pipeline's tasks, deduplicated by
    /// identity, in first-seen order.
    pub fn data_nodes(&self) -> Vec<DataNode> {
        let mut nodes: Vec<DataNode> = Vec::new();
        for task in &self.inner.tasks {
            for node in task.inputs().iter().chain(task.outputs()) {
                if !nodes.contains(node) {
                    nodes.push(node.clone());
                }
            }
        }
        nodes
    }

    /// True when the task graph has no dependency cycle.
    pub fn is_consistent(&self) -> bool {
        graph::is_acyclic(&self.inner.tasks)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.properties.get(key)
    }
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Pipeline {}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.inner.id)
            .field("config_name", &self.inner.config_name)
            .field("parent_id", &self.inner.parent_id)
            .field("tasks", &self.inner.tasks.len())
            .finish()
    }
}

impl Entity for Pipeline {
    fn id(&self) -> String {
        self.inner.id.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "config_name" => Some(self.inner.config_name.clone()),
            "parent_id" => self.inner.parent_id.clone(),
            _ => None,
        }
    }
}
