use super::file::{coerce_string, coerce_usize, coerce_value, value_to_toml};
use crate::error::ConfigError;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use toml::Table;

const MODE_KEY: &str = "mode";
const NB_OF_WORKERS_KEY: &str = "nb_of_workers";

pub const DEFAULT_NB_OF_WORKERS: usize = 1;

/// Execution mode of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobMode {
    /// Run each job in the submitting thread; `submit_task` returns once the
    /// job has finished.
    #[default]
    Synchronous,
    /// Run jobs on a fixed-size worker pool.
    Parallel,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Synchronous => write!(f, "synchronous"),
            JobMode::Parallel => write!(f, "parallel"),
        }
    }
}

impl FromStr for JobMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synchronous" => Ok(JobMode::Synchronous),
            "parallel" => Ok(JobMode::Parallel),
            other => Err(format!("unknown job mode: {}", other)),
        }
    }
}

/// Configuration fields related to job execution.
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    pub mode: Option<JobMode>,
    pub nb_of_workers: Option<usize>,
    pub properties: HashMap<String, Value>,
}

impl JobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn default_config() -> Self {
        Self {
            mode: Some(JobMode::Synchronous),
            nb_of_workers: Some(DEFAULT_NB_OF_WORKERS),
            properties: HashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: JobMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_nb_of_workers(mut self, workers: usize) -> Self {
        self.nb_of_workers = Some(workers);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn mode(&self) -> JobMode {
        self.mode.unwrap_or_default()
    }

    pub fn nb_of_workers(&self) -> usize {
        self.nb_of_workers.unwrap_or(DEFAULT_NB_OF_WORKERS)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub(crate) fn update_from(&mut self, other: &JobConfig) {
        if let Some(mode) = other.mode {
            self.mode = Some(mode);
        }
        if let Some(workers) = other.nb_of_workers {
            self.nb_of_workers = Some(workers);
        }
        self.properties.extend(other.properties.clone());
    }

    pub(crate) fn apply_table(&mut self, table: &Table) -> Result<(), ConfigError> {
        for (key, value) in table {
            match key.as_str() {
                MODE_KEY => {
                    let raw = coerce_string("job.mode", value)?;
                    let mode = JobMode::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                        field: "job.mode".to_string(),
                        expected: "synchronous or parallel".to_string(),
                        value: raw,
                    })?;
                    self.mode = Some(mode);
                }
                NB_OF_WORKERS_KEY => {
                    self.nb_of_workers = Some(coerce_usize("job.nb_of_workers", value)?)
                }
                other => {
                    let coerced = coerce_value(&format!("job.{}", other), value)?;
                    self.properties.insert(other.to_string(), coerced);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn to_toml(&self) -> Table {
        let mut table = Table::new();
        table.insert(
            MODE_KEY.to_string(),
            toml::Value::String(self.mode().to_string()),
        );
        table.insert(
            NB_OF_WORKERS_KEY.to_string(),
            toml::Value::Integer(self.nb_of_workers() as i64),
        );
        let mut keys: Vec<_> = self.properties.keys().collect();
        keys.sort();
        for key in keys {
            table.insert(key.clone(), value_to_toml(&self.properties[key]));
        }
        table
    }
}
