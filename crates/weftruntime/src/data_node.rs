use crate::job::JobId;
use crate::repository::Entity;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use weftcore::{DataNodeConfig, Scope, Value};

pub type DataNodeId = Uuid;

/// Runtime instance of a data node: a named, scoped handle to one piece of
/// data with readiness tracking.
///
/// Cloning is cheap and yields another handle to the same instance; identity
/// is the `id`, assigned once at creation. New instances are only ever
/// created by the data manager's scope resolution.
#[derive(Clone)]
pub struct DataNode {
    id: DataNodeId,
    config_name: String,
    scope: Scope,
    parent_id: Option<String>,
    state: Arc<RwLock<DataNodeState>>,
}

#[derive(Debug, Default)]
struct DataNodeState {
    data: Option<Value>,
    last_edition_date: Option<DateTime<Utc>>,
    job_ids: Vec<JobId>,
    ready: bool,
    properties: HashMap<String, Value>,
}

impl DataNode {
    /// Builds a new instance from its config. If the config carries
    /// `default_data` the node is seeded with it and immediately ready for
    /// reading.
    pub(crate) fn new(config: &DataNodeConfig, parent_id: Option<String>) -> Self {
        let state = DataNodeState {
            data: config.default_data().cloned(),
            last_edition_date: None,
            job_ids: Vec::new(),
            ready: config.default_data().is_some(),
            properties: config.properties.clone(),
        };
        Self {
            id: Uuid::new_v4(),
            config_name: config.name().to_string(),
            scope: config.scope(),
            parent_id,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn id(&self) -> DataNodeId {
        self.id
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Current data, if any write (or a default) has happened.
    pub fn read(&self) -> Option<Value> {
        self.state.read().data.clone()
    }

    /// Writes directly from calling code.
    pub fn write(&self, value: impl Into<Value>) {
        self.apply_write(value.into(), None);
    }

    /// Writes on behalf of a job; the job id is appended to the node's
    /// write history.
    pub(crate) fn write_with_job(&self, value: Value, job_id: JobId) {
        self.apply_write(value, Some(job_id));
    }

    fn apply_write(&self, value: Value, job_id: Option<JobId>) {
        let mut state = self.state.write();
        state.data = Some(value);
        state.last_edition_date = Some(Utc::now());
        if let Some(job_id) = job_id {
            state.job_ids.push(job_id);
        }
        state.ready = true;
    }

    /// True once at least one write has happened, or when the node was
    /// created with default data.
    pub fn is_ready_for_reading(&self) -> bool {
        self.state.read().ready
    }

    pub fn last_edition_date(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_edition_date
    }

    /// Jobs that wrote this node, in write order.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.state.read().job_ids.clone()
    }

    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.state.read().properties.get(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.write().properties.insert(key.into(), value.into());
    }
}

impl PartialEq for DataNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataNode {}

impl std::hash::Hash for DataNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataNode")
            .field("id", &self.id)
            .field("config_name", &self.config_name)
            .field("scope", &self.scope)
            .field("parent_id", &self.parent_id)
            .field("ready", &self.is_ready_for_reading())
            .finish()
    }
}

impl Entity for DataNode {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "config_name" => Some(self.config_name.clone()),
            "parent_id" => self.parent_id.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_node_is_not_ready() {
        let config = DataNodeConfig::new("raw");
        let node = DataNode::new(&config, None);
        assert!(!node.is_ready_for_reading());
        assert!(node.read().is_none());
        assert!(node.last_edition_date().is_none());
    }

    #[test]
    fn default_data_makes_node_immediately_ready() {
        let config = DataNodeConfig::new("raw").with_default_data(42i64);
        let node = DataNode::new(&config, None);
        assert!(node.is_ready_for_reading());
        assert_eq!(node.read(), Some(Value::Int(42)));
    }

    #[test]
    fn write_updates_edition_date_and_history() {
        let config = DataNodeConfig::new("raw");
        let node = DataNode::new(&config, None);
        let job_id = Uuid::new_v4();
        node.write_with_job(Value::from("out"), job_id);
        assert!(node.is_ready_for_reading());
        assert!(node.last_edition_date().is_some());
        assert_eq!(node.job_ids(), vec![job_id]);
    }

    #[test]
    fn clones_share_state() {
        let config = DataNodeConfig::new("raw");
        let node = DataNode::new(&config, None);
        let other = node.clone();
        node.write("x");
        assert!(other.is_ready_for_reading());
        assert_eq!(node, other);
    }
}
