use thiserror::Error;
use weftcore::Scope;

#[derive(Error, Debug)]
pub enum WeftError {
    #[error("Configuration error: {0}")]
    Config(#[from] weftcore::ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data node not found: {0}")]
    NotFound(String),

    #[error("data node config '{config_name}' has {scope} scope and needs a parent id")]
    MissingParent { config_name: String, scope: Scope },
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("multiple tasks exist for config '{config_name}' with parent {parent_id:?}")]
    Ambiguous {
        config_name: String,
        parent_id: Option<String>,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline not found: {0}")]
    NotFound(String),

    #[error("pipeline '{0}' is not consistent: its task graph contains a cycle")]
    Inconsistent(String),

    #[error("Cyclic dependency detected")]
    CyclicDependency,

    #[error("multiple pipelines exist for config '{config_name}' with parent {parent_id:?}")]
    Ambiguous {
        config_name: String,
        parent_id: Option<String>,
    },

    #[error(transparent)]
    Task(#[from] TaskError),
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("job {0} is not finished and cannot be deleted")]
    JobNotFinished(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Failure recorded on a job during execution. These never propagate out of
/// the dispatcher; they are observed through the job's status and exception
/// list.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("task function failed: {0}")]
    FunctionFailed(String),

    #[error("task function panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Scenario not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
