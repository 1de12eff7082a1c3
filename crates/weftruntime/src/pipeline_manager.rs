use crate::error::PipelineError;
use crate::pipeline::{Pipeline, PipelineId};
use crate::repository::{InMemoryRepository, Repository};
use crate::task::Task;
use crate::task_manager::TaskManager;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;
use weftcore::PipelineConfig;

/// Saves, retrieves and materializes pipelines from pipeline configs.
#[derive(Clone)]
pub struct PipelineManager {
    repository: Arc<dyn Repository<Pipeline>>,
    task_manager: TaskManager,
    creation_guard: Arc<Mutex<()>>,
}

impl PipelineManager {
    pub fn new(task_manager: TaskManager) -> Self {
        Self::with_repository(InMemoryRepository::new(), task_manager)
    }

    pub fn with_repository(
        repository: Arc<dyn Repository<Pipeline>>,
        task_manager: TaskManager,
    ) -> Self {
        Self {
            repository,
            task_manager,
            creation_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.task_manager
    }

    /// Returns the pipeline materialized from `config` under `scenario_id`,
    /// creating it (and its tasks and data nodes) if needed.
    ///
    /// The new pipeline's id is generated before task resolution so
    /// pipeline-scoped nodes get the right parent. A pipeline whose task
    /// graph is cyclic is refused before anything is persisted.
    pub fn get_or_create(
        &self,
        config: &PipelineConfig,
        scenario_id: Option<&str>,
    ) -> Result<Pipeline, PipelineError> {
        let _guard = self.creation_guard.lock();
        let candidates: Vec<Pipeline> = self
            .repository
            .search_all("config_name", config.name())
            .into_iter()
            .filter(|pipeline| pipeline.parent_id() == scenario_id)
            .collect();
        match candidates.as_slice() {
            [pipeline] => return Ok(pipeline.clone()),
            [] => {}
            _ => {
                tracing::error!(
                    config_name = config.name(),
                    parent_id = ?scenario_id,
                    "multiple pipelines exist for the same config and parent"
                );
                return Err(PipelineError::Ambiguous {
                    config_name: config.name().to_string(),
                    parent_id: scenario_id.map(str::to_string),
                });
            }
        }

        let pipeline_id: PipelineId = format!("pipeline_{}_{}", config.name(), Uuid::new_v4());
        let mut tasks: Vec<Task> = Vec::with_capacity(config.tasks().len());
        for task_config in config.tasks() {
            let task = self
                .task_manager
                .get_or_create(task_config, scenario_id, Some(&pipeline_id))?;
            tasks.push(task);
        }
        let pipeline = Pipeline::new(
            pipeline_id,
            config.name(),
            scenario_id.map(str::to_string),
            tasks,
            config.properties.clone(),
        );
        if !pipeline.is_consistent() {
            return Err(PipelineError::Inconsistent(config.name().to_string()));
        }
        tracing::info!(
            pipeline_id = pipeline.id(),
            config_name = config.name(),
            "pipeline created"
        );
        self.repository.save(pipeline.clone());
        Ok(pipeline)
    }

    pub fn get(&self, id: &str) -> Result<Pipeline, PipelineError> {
        self.repository
            .load(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    pub fn get_all(&self) -> Vec<Pipeline> {
        self.repository.load_all()
    }

    pub fn set(&self, pipeline: Pipeline) {
        self.repository.save(pipeline);
    }

    pub fn delete(&self, id: &str) -> Result<(), PipelineError> {
        if self.repository.delete(id) {
            Ok(())
        } else {
            Err(PipelineError::NotFound(id.to_string()))
        }
    }

    pub fn delete_all(&self) {
        self.repository.delete_all();
    }

    /// Deletes the pipeline together with its pipeline-scoped tasks and data
    /// nodes. Entities shared with a broader scope survive.
    pub fn hard_delete(&self, id: &str) -> Result<(), PipelineError> {
        let pipeline = self.get(id)?;
        for task in pipeline.tasks() {
            if task.parent_id() == Some(pipeline.id()) {
                self.task_manager
                    .hard_delete(task.id(), None, Some(pipeline.id()))?;
            }
        }
        self.delete(pipeline.id())
    }
}
