use crate::data_manager::{DataManager, ParentIds};
use crate::data_node::DataNode;
use crate::error::TaskError;
use crate::repository::{InMemoryRepository, Repository};
use crate::task::{Task, TaskId};
use parking_lot::Mutex;
use std::sync::Arc;
use weftcore::{Scope, TaskConfig};

/// Saves, retrieves and materializes tasks from task configs.
#[derive(Clone)]
pub struct TaskManager {
    repository: Arc<dyn Repository<Task>>,
    data_manager: DataManager,
    creation_guard: Arc<Mutex<()>>,
}

impl TaskManager {
    pub fn new(data_manager: DataManager) -> Self {
        Self::with_repository(InMemoryRepository::new(), data_manager)
    }

    pub fn with_repository(repository: Arc<dyn Repository<Task>>, data_manager: DataManager) -> Self {
        Self {
            repository,
            data_manager,
            creation_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data_manager
    }

    /// Returns the task materialized from `config` under the given parents,
    /// creating it if needed.
    ///
    /// Every referenced data node config is resolved through the data
    /// manager first; the task's overall scope is the narrowest scope among
    /// its nodes, and that scope decides whether `scenario_id` or
    /// `pipeline_id` is the task's parent. Exactly one existing task with
    /// the same `(config name, parent)` is reused; more than one is a
    /// data-integrity error.
    pub fn get_or_create(
        &self,
        config: &TaskConfig,
        scenario_id: Option<&str>,
        pipeline_id: Option<&str>,
    ) -> Result<Task, TaskError> {
        let parents = ParentIds {
            cycle_id: None,
            scenario_id: scenario_id.map(str::to_string),
            pipeline_id: pipeline_id.map(str::to_string),
        };
        // Resolve each distinct node config once, in first-seen order.
        let mut resolved: Vec<(String, DataNode)> = Vec::new();
        for node_config in config.inputs().iter().chain(config.outputs()) {
            if resolved.iter().any(|(name, _)| name == node_config.name()) {
                continue;
            }
            let node = self.data_manager.get_or_create(node_config, &parents)?;
            resolved.push((node_config.name().to_string(), node));
        }
        let scope = resolved
            .iter()
            .map(|(_, node)| node.scope())
            .max()
            .unwrap_or(Scope::Global);
        let parent_id = match scope {
            Scope::Pipeline => pipeline_id,
            Scope::Scenario => scenario_id,
            _ => None,
        }
        .map(str::to_string);

        let _guard = self.creation_guard.lock();
        let candidates: Vec<Task> = self
            .repository
            .search_all("config_name", config.name())
            .into_iter()
            .filter(|task| task.parent_id() == parent_id.as_deref())
            .collect();
        match candidates.as_slice() {
            [task] => Ok(task.clone()),
            [] => {
                let pick = |configs: &[weftcore::DataNodeConfig]| {
                    configs
                        .iter()
                        .filter_map(|c| {
                            resolved
                                .iter()
                                .find(|(name, _)| name == c.name())
                                .map(|(_, node)| node.clone())
                        })
                        .collect::<Vec<_>>()
                };
                let task = Task::new(
                    config.name(),
                    pick(config.inputs()),
                    config
                        .function()
                        .cloned()
                        .unwrap_or_else(|| Arc::new(|_| Err("task has no function".to_string()))),
                    pick(config.outputs()),
                    parent_id,
                    config.properties.clone(),
                );
                self.set(&task);
                Ok(task)
            }
            _ => {
                tracing::error!(
                    config_name = config.name(),
                    parent_id = ?parent_id,
                    "multiple tasks exist for the same config and parent"
                );
                Err(TaskError::Ambiguous {
                    config_name: config.name().to_string(),
                    parent_id,
                })
            }
        }
    }

    /// Saves or updates a task, persisting its data nodes first.
    pub fn set(&self, task: &Task) {
        for node in task.inputs().iter().chain(task.outputs()) {
            self.data_manager.set(node.clone());
        }
        tracing::info!(task_id = %task.id(), config_name = task.config_name(), "task created or updated");
        self.repository.save(task.clone());
    }

    pub fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        self.repository
            .load(&id.to_string())
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub fn get_all(&self) -> Vec<Task> {
        self.repository.load_all()
    }

    pub fn delete(&self, id: TaskId) -> Result<(), TaskError> {
        if self.repository.delete(&id.to_string()) {
            Ok(())
        } else {
            Err(TaskError::NotFound(id.to_string()))
        }
    }

    pub fn delete_all(&self) {
        self.repository.delete_all();
    }

    /// Deletes the task and the nested data nodes owned by the given
    /// parents. Nodes shared with a broader scope survive.
    pub fn hard_delete(
        &self,
        id: TaskId,
        scenario_id: Option<&str>,
        pipeline_id: Option<&str>,
    ) -> Result<(), TaskError> {
        let task = self.get(id)?;
        let nodes: Vec<DataNode> = task
            .inputs()
            .iter()
            .chain(task.outputs())
            .cloned()
            .collect();
        if let Some(scenario_id) = scenario_id {
            self.data_manager.remove_if_parent(&nodes, scenario_id);
        }
        if let Some(pipeline_id) = pipeline_id {
            self.data_manager.remove_if_parent(&nodes, pipeline_id);
        }
        self.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weftcore::{DataNodeConfig, TaskOutput, Value};

    fn noop() -> weftcore::TaskFunction {
        Arc::new(|_| Ok(TaskOutput::Single(Value::Null)))
    }

    fn manager() -> TaskManager {
        TaskManager::new(DataManager::new())
    }

    #[test]
    fn creates_then_reuses_the_same_task() {
        let manager = manager();
        let config = TaskConfig::new("train", noop())
            .with_input(DataNodeConfig::new("raw").with_scope(Scope::Pipeline))
            .with_output(DataNodeConfig::new("model").with_scope(Scope::Pipeline));
        let first = manager
            .get_or_create(&config, Some("s1"), Some("p1"))
            .unwrap();
        let second = manager
            .get_or_create(&config, Some("s1"), Some("p1"))
            .unwrap();
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn task_scope_is_the_narrowest_node_scope() {
        let manager = manager();
        let config = TaskConfig::new("train", noop())
            .with_input(DataNodeConfig::new("raw").with_scope(Scope::Global))
            .with_output(DataNodeConfig::new("model").with_scope(Scope::Scenario));
        let task = manager.get_or_create(&config, Some("s1"), None).unwrap();
        assert_eq!(task.scope(), Scope::Scenario);
        assert_eq!(task.parent_id(), Some("s1"));
    }

    #[test]
    fn scenario_scoped_task_is_shared_between_pipelines() {
        let manager = manager();
        let config = TaskConfig::new("train", noop())
            .with_input(DataNodeConfig::new("raw").with_scope(Scope::Scenario))
            .with_output(DataNodeConfig::new("model").with_scope(Scope::Scenario));
        let first = manager
            .get_or_create(&config, Some("s1"), Some("p1"))
            .unwrap();
        let second = manager
            .get_or_create(&config, Some("s1"), Some("p2"))
            .unwrap();
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn shared_input_config_resolves_to_one_node() {
        let manager = manager();
        let shared = DataNodeConfig::new("raw").with_scope(Scope::Scenario);
        let t1 = TaskConfig::new("clean", noop())
            .with_input(shared.clone())
            .with_output(DataNodeConfig::new("clean_data").with_scope(Scope::Scenario));
        let t2 = TaskConfig::new("audit", noop())
            .with_input(shared)
            .with_output(DataNodeConfig::new("report").with_scope(Scope::Scenario));
        let first = manager.get_or_create(&t1, Some("s1"), None).unwrap();
        let second = manager.get_or_create(&t2, Some("s1"), None).unwrap();
        assert_eq!(first.inputs()[0].id(), second.inputs()[0].id());
    }

    #[test]
    fn ambiguous_parent_binding_is_an_error() {
        let manager = manager();
        let config = TaskConfig::new("train", noop())
            .with_output(DataNodeConfig::new("model").with_scope(Scope::Global));
        // Two persisted tasks with the same config name and parent simulate
        // a corrupted repository.
        let duplicate = || {
            Task::new(
                "train",
                vec![],
                noop(),
                vec![],
                None,
                Default::default(),
            )
        };
        manager.repository.save(duplicate());
        manager.repository.save(duplicate());
        let err = manager.get_or_create(&config, None, None).unwrap_err();
        assert!(matches!(err, TaskError::Ambiguous { config_name, .. } if config_name == "train"));
    }

    #[test]
    fn missing_parent_for_narrow_scope_bubbles_up() {
        let manager = manager();
        let config = TaskConfig::new("train", noop())
            .with_input(DataNodeConfig::new("raw").with_scope(Scope::Pipeline));
        let err = manager.get_or_create(&config, Some("s1"), None).unwrap_err();
        assert!(matches!(err, TaskError::Data(_)));
    }
}
