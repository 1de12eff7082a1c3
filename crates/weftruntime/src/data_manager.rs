use crate::data_node::{DataNode, DataNodeId};
use crate::error::DataError;
use crate::repository::{Entity, InMemoryRepository, Repository};
use parking_lot::Mutex;
use std::sync::Arc;
use weftcore::{DataNodeConfig, Scope};

/// Identifiers of the entities that can own a scoped data node.
#[derive(Debug, Clone, Default)]
pub struct ParentIds {
    pub cycle_id: Option<String>,
    pub scenario_id: Option<String>,
    pub pipeline_id: Option<String>,
}

impl ParentIds {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_cycle(mut self, id: impl Into<String>) -> Self {
        self.cycle_id = Some(id.into());
        self
    }

    pub fn with_scenario(mut self, id: impl Into<String>) -> Self {
        self.scenario_id = Some(id.into());
        self
    }

    pub fn with_pipeline(mut self, id: impl Into<String>) -> Self {
        self.pipeline_id = Some(id.into());
        self
    }
}

/// Saves, retrieves and scope-resolves data nodes.
///
/// `get_or_create` is the sole creator of data node identities: the same
/// `(config name, effective parent)` pair always resolves to the same
/// instance.
#[derive(Clone)]
pub struct DataManager {
    repository: Arc<dyn Repository<DataNode>>,
    creation_guard: Arc<Mutex<()>>,
}

impl Default for DataManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DataManager {
    pub fn new() -> Self {
        Self::with_repository(InMemoryRepository::new())
    }

    pub fn with_repository(repository: Arc<dyn Repository<DataNode>>) -> Self {
        Self {
            repository,
            creation_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Resolves a config plus parent ids to a concrete data node, reusing
    /// the existing instance when the `(config name, effective parent)` pair
    /// was already resolved.
    ///
    /// The effective parent is `None` for global scope regardless of the
    /// caller's parents; for narrower scopes the matching parent id is
    /// required.
    pub fn get_or_create(
        &self,
        config: &DataNodeConfig,
        parents: &ParentIds,
    ) -> Result<DataNode, DataError> {
        let parent_id = effective_parent_id(config, parents)?;
        let _guard = self.creation_guard.lock();
        let existing = self
            .repository
            .search_all("config_name", config.name())
            .into_iter()
            .find(|node| node.parent_id() == parent_id.as_deref());
        if let Some(node) = existing {
            return Ok(node);
        }
        let node = DataNode::new(config, parent_id);
        tracing::info!(
            data_node_id = %node.id(),
            config_name = config.name(),
            scope = %node.scope(),
            "data node created"
        );
        self.repository.save(node.clone());
        Ok(node)
    }

    pub fn get(&self, id: DataNodeId) -> Result<DataNode, DataError> {
        self.repository
            .load(&id.to_string())
            .ok_or_else(|| DataError::NotFound(id.to_string()))
    }

    pub fn get_all(&self) -> Vec<DataNode> {
        self.repository.load_all()
    }

    pub fn set(&self, node: DataNode) {
        self.repository.save(node);
    }

    pub fn delete(&self, id: DataNodeId) -> Result<(), DataError> {
        if self.repository.delete(&id.to_string()) {
            Ok(())
        } else {
            Err(DataError::NotFound(id.to_string()))
        }
    }

    pub fn delete_all(&self) {
        self.repository.delete_all();
    }

    /// Deletes every given node whose parent is `parent_id`. Used by
    /// pipeline/scenario hard deletion: nodes owned by a broader entity are
    /// left alone.
    pub(crate) fn remove_if_parent(&self, nodes: &[DataNode], parent_id: &str) {
        for node in nodes {
            if node.parent_id() == Some(parent_id) {
                self.repository.delete(&Entity::id(node));
            }
        }
    }
}

fn effective_parent_id(
    config: &DataNodeConfig,
    parents: &ParentIds,
) -> Result<Option<String>, DataError> {
    let scope = config.scope();
    let candidate = match scope {
        Scope::Global => return Ok(None),
        Scope::Cycle => &parents.cycle_id,
        Scope::Scenario => &parents.scenario_id,
        Scope::Pipeline => &parents.pipeline_id,
    };
    match candidate {
        Some(id) => Ok(Some(id.clone())),
        None => Err(DataError::MissingParent {
            config_name: config.name().to_string(),
            scope,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_twice_returns_the_same_identity() {
        let manager = DataManager::new();
        let config = DataNodeConfig::new("sales").with_scope(Scope::Pipeline);
        let parents = ParentIds::none().with_pipeline("p1");
        let first = manager.get_or_create(&config, &parents).unwrap();
        let second = manager.get_or_create(&config, &parents).unwrap();
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn different_parents_resolve_to_different_instances() {
        let manager = DataManager::new();
        let config = DataNodeConfig::new("sales").with_scope(Scope::Pipeline);
        let first = manager
            .get_or_create(&config, &ParentIds::none().with_pipeline("p1"))
            .unwrap();
        let second = manager
            .get_or_create(&config, &ParentIds::none().with_pipeline("p2"))
            .unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn global_scope_ignores_the_caller_parent() {
        let manager = DataManager::new();
        let config = DataNodeConfig::new("model").with_scope(Scope::Global);
        let first = manager
            .get_or_create(&config, &ParentIds::none().with_pipeline("p1"))
            .unwrap();
        let second = manager
            .get_or_create(&config, &ParentIds::none().with_pipeline("p2"))
            .unwrap();
        assert_eq!(first.id(), second.id());
        assert!(first.parent_id().is_none());
    }

    #[test]
    fn narrow_scope_without_parent_is_a_usage_error() {
        let manager = DataManager::new();
        let config = DataNodeConfig::new("sales").with_scope(Scope::Scenario);
        let err = manager
            .get_or_create(&config, &ParentIds::none())
            .unwrap_err();
        assert!(matches!(err, DataError::MissingParent { scope, .. } if scope == Scope::Scenario));
    }

    #[test]
    fn created_node_is_persisted() {
        let manager = DataManager::new();
        let config = DataNodeConfig::new("sales").with_scope(Scope::Global);
        let node = manager.get_or_create(&config, &ParentIds::none()).unwrap();
        let loaded = manager.get(node.id()).unwrap();
        assert_eq!(loaded.id(), node.id());
    }
}
