//! Configuration checker.
//!
//! Runs a fixed set of validators over a compiled [`AppliedConfig`] and
//! collects issues instead of failing on the first problem. Error-level
//! issues abort compilation after the whole list has been logged.

use super::job_config::JobMode;
use super::AppliedConfig;
use std::fmt;

pub const KNOWN_STORAGE_TYPES: &[&str] = &["in_memory"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLevel::Info => write!(f, "info"),
            IssueLevel::Warning => write!(f, "warning"),
            IssueLevel::Error => write!(f, "error"),
        }
    }
}

/// One finding reported by a checker.
#[derive(Debug, Clone)]
pub struct Issue {
    pub level: IssueLevel,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (field: {}, value: {})",
            self.level, self.message, self.field, self.value
        )
    }
}

/// Accumulates checker findings, grouped by severity.
#[derive(Debug, Clone, Default)]
pub struct IssueCollector {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub infos: Vec<Issue>,
}

impl IssueCollector {
    pub fn add_error(&mut self, field: impl Into<String>, value: impl Into<String>, message: impl Into<String>) {
        self.errors.push(Issue {
            level: IssueLevel::Error,
            field: field.into(),
            value: value.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, value: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(Issue {
            level: IssueLevel::Warning,
            field: field.into(),
            value: value.into(),
            message: message.into(),
        });
    }

    pub fn add_info(&mut self, field: impl Into<String>, value: impl Into<String>, message: impl Into<String>) {
        self.infos.push(Issue {
            level: IssueLevel::Info,
            field: field.into(),
            value: value.into(),
            message: message.into(),
        });
    }

    /// Logs every collected issue at its own severity.
    pub fn log(&self) {
        for issue in &self.warnings {
            tracing::warn!("{}", issue);
        }
        for issue in &self.infos {
            tracing::info!("{}", issue);
        }
        for issue in &self.errors {
            tracing::error!("{}", issue);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.infos.is_empty()
    }
}

/// Runs every checker against the applied configuration.
pub fn check(config: &AppliedConfig) -> IssueCollector {
    let mut collector = IssueCollector::default();
    check_global_config(config, &mut collector);
    check_job_config(config, &mut collector);
    check_data_node_configs(config, &mut collector);
    check_task_configs(config, &mut collector);
    check_pipeline_configs(config, &mut collector);
    check_scenario_configs(config, &mut collector);
    collector
}

fn check_global_config(config: &AppliedConfig, collector: &mut IssueCollector) {
    let global = config.global_config();
    if global.root_folder().is_empty() {
        collector.add_error("global.root_folder", "", "root folder must not be empty");
    }
    if global.storage_folder().is_empty() {
        collector.add_error("global.storage_folder", "", "storage folder must not be empty");
    }
}

fn check_job_config(config: &AppliedConfig, collector: &mut IssueCollector) {
    let job = config.job_config();
    if job.nb_of_workers() == 0 {
        collector.add_error(
            "job.nb_of_workers",
            "0",
            "number of workers must be at least 1",
        );
    }
    if job.mode() == JobMode::Parallel && job.nb_of_workers() == 1 {
        collector.add_info(
            "job.nb_of_workers",
            "1",
            "parallel mode with a single worker executes jobs one at a time",
        );
    }
}

fn check_data_node_configs(config: &AppliedConfig, collector: &mut IssueCollector) {
    for (name, node) in config.data_nodes() {
        if name.is_empty() {
            collector.add_error("data_node.name", "", "data node config name must not be empty");
        }
        let storage_type = node.storage_type();
        if !KNOWN_STORAGE_TYPES.contains(&storage_type) {
            collector.add_warning(
                format!("data_node.{}.storage_type", name),
                storage_type,
                "unknown storage type, in-memory storage will be used",
            );
        }
    }
}

fn check_task_configs(config: &AppliedConfig, collector: &mut IssueCollector) {
    for (name, task) in config.tasks() {
        if task.function().is_none() {
            collector.add_error(
                format!("task.{}.function", name),
                "",
                "task config has no function; functions can only be set from code",
            );
        }
        if task.inputs().is_empty() && task.outputs().is_empty() {
            collector.add_warning(
                format!("task.{}", name),
                "",
                "task config has neither inputs nor outputs",
            );
        }
    }
}

fn check_pipeline_configs(config: &AppliedConfig, collector: &mut IssueCollector) {
    for (name, pipeline) in config.pipelines() {
        if pipeline.tasks().is_empty() {
            collector.add_warning(
                format!("pipeline.{}", name),
                "",
                "pipeline config has no tasks",
            );
        }
    }
}

fn check_scenario_configs(config: &AppliedConfig, collector: &mut IssueCollector) {
    for (name, scenario) in config.scenarios() {
        if scenario.pipelines().is_empty() {
            collector.add_warning(
                format!("scenario.{}", name),
                "",
                "scenario config has no pipelines",
            );
        }
    }
}
