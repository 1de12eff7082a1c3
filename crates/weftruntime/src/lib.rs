//! Runtime entities and orchestration for weft.
//!
//! This crate turns the declarative configs of `weftcore` into runtime
//! instances (data nodes, tasks, pipelines, scenarios, cycles) and runs
//! them: the scheduler dispatches jobs over the task dependency graph,
//! blocking on unready inputs and resuming automatically.
//!
//! Every manager holds explicit repository instances; building two
//! independent [`Runtime`] values in one process gives two fully isolated
//! orchestrators.

pub mod cycle;
pub mod data_manager;
pub mod data_node;
pub mod error;
pub mod graph;
pub mod job;
pub mod pipeline;
pub mod pipeline_manager;
pub mod repository;
pub mod scenario;
pub mod scheduler;
pub mod task;
pub mod task_manager;

pub use cycle::{Cycle, CycleId, CycleManager};
pub use data_manager::{DataManager, ParentIds};
pub use data_node::{DataNode, DataNodeId};
pub use error::{
    DataError, ExecutionError, PipelineError, ScenarioError, SchedulingError, TaskError, WeftError,
};
pub use graph::sort_into_waves;
pub use job::{Job, JobCallback, JobId, Status};
pub use pipeline::{Pipeline, PipelineId};
pub use pipeline_manager::PipelineManager;
pub use repository::{Entity, InMemoryRepository, Repository};
pub use scenario::{Scenario, ScenarioId, ScenarioManager};
pub use scheduler::{Orchestrator, Scheduler};
pub use task::{Task, TaskId};
pub use task_manager::TaskManager;

use weftcore::AppliedConfig;

/// One coherent set of managers plus a scheduler, built from an applied
/// configuration.
#[derive(Clone)]
pub struct Runtime {
    scenario_manager: ScenarioManager,
    scheduler: Scheduler,
}

impl Runtime {
    pub fn new(config: &AppliedConfig) -> Self {
        let data_manager = DataManager::new();
        let task_manager = TaskManager::new(data_manager);
        let pipeline_manager = PipelineManager::new(task_manager);
        let scenario_manager = ScenarioManager::new(pipeline_manager);
        let scheduler = Scheduler::new(config.job_config());
        Self {
            scenario_manager,
            scheduler,
        }
    }

    pub fn data_manager(&self) -> &DataManager {
        self.task_manager().data_manager()
    }

    pub fn task_manager(&self) -> &TaskManager {
        self.pipeline_manager().task_manager()
    }

    pub fn pipeline_manager(&self) -> &PipelineManager {
        self.scenario_manager.pipeline_manager()
    }

    pub fn scenario_manager(&self) -> &ScenarioManager {
        &self.scenario_manager
    }

    pub fn cycle_manager(&self) -> &CycleManager {
        self.scenario_manager.cycle_manager()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
